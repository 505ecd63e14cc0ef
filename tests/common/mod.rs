use std::fs;
use std::path::Path;
use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

use assetpipe::config::{ConfigFile, RawConfigFile};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Uses `with_test_writer()`, so logs are captured per-test and only printed
/// for failing tests (unless run with `-- --nocapture`).
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// A validated config rooted in a test directory, with optional extra TOML
/// (category overrides etc.) appended.
pub fn config_in(dir: &Path, extra_toml: &str) -> ConfigFile {
    let toml = format!(
        "[paths]\nsource_root = {:?}\noutput_root = {:?}\n\n{extra_toml}",
        dir.join("src"),
        dir.join("dist"),
    );
    let raw: RawConfigFile = toml::from_str(&toml).expect("test config parses");
    ConfigFile::try_from(raw).expect("test config validates")
}

/// Write a file under `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(&path, contents).expect("write test file");
}
