// tests/build_phase.rs

mod common;
use crate::common::{config_in, init_tracing, write_file};

use std::error::Error;
use std::sync::Arc;

use assetpipe::graph::{run_build_phase, TaskGraph, TaskStatus};
use assetpipe::pipeline::{AssetKind, TaskSet};
use assetpipe::serve::{NoopNotifier, ReloadNotifier};
use assetpipe::workspace;

type TestResult = Result<(), Box<dyn Error>>;

/// Counts `notify_clients` calls so tests can assert when reload fires.
#[derive(Default)]
struct CountingNotifier {
    notified: std::sync::atomic::AtomicUsize,
}

impl CountingNotifier {
    fn count(&self) -> usize {
        self.notified.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl ReloadNotifier for CountingNotifier {
    fn notify_clients(&self) {
        self.notified
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// A 2x2 PNG built via the image crate.
fn tiny_png() -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 128, 255, 255]));
    let mut buf = Vec::new();
    img.write_with_encoder(image::codecs::png::PngEncoder::new(Cursor::new(&mut buf)))
        .expect("encode test png");
    buf
}

fn populate_sources(src: &std::path::Path) {
    write_file(
        src,
        "index.html",
        "<header>@@include(\"parts/header.html\")</header>\n<img src=\"img/logo.png\" alt=\"\">\n",
    );
    write_file(src, "parts/header.html", "<h1>Site</h1>");
    write_file(
        src,
        "scss/style.scss",
        ".hero {\n  color: red;\n  .title { color: blue; }\n}\n",
    );
    write_file(src, "js/app.js", "// entry\nconsole.log('hi');\n");
    write_file(src, "img/logo.png", tiny_png());
}

#[tokio::test]
async fn full_build_writes_every_category() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = config_in(dir.path(), "");
    populate_sources(cfg.source_root());
    workspace::initialize(&cfg)?;

    let tasks = Arc::new(TaskSet::from_config(&cfg)?);
    let graph = TaskGraph::from_config(&cfg);
    let report = run_build_phase(tasks, &graph, Arc::new(NoopNotifier)).await?;

    assert!(report.is_clean(), "report: {report:?}");

    let dist = cfg.output_root();

    // html: include resolved, img wrapped in <picture>.
    let html = std::fs::read_to_string(dist.join("index.html"))?;
    assert!(html.contains("<h1>Site</h1>"));
    assert!(!html.contains("@@include"));
    assert!(html.contains("img/logo.webp"));

    // css: compiled out of scss/, minified, nesting flattened.
    let css = std::fs::read_to_string(dist.join("css/style.css"))?;
    assert!(css.contains(".hero .title"));
    assert!(!css.contains('\n'));

    // js: comments stripped.
    let js = std::fs::read_to_string(dist.join("js/app.js"))?;
    assert!(js.contains("console.log"));
    assert!(!js.contains("// entry"));

    // img: both the WebP copy and the optimized original.
    assert!(dist.join("img/logo.webp").is_file());
    assert!(dist.join("img/logo.png").is_file());

    Ok(())
}

#[tokio::test]
async fn fresh_workspace_is_scaffolded_and_builds_clean() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = config_in(dir.path(), "");
    // No sources at all: initialization must scaffold them.
    workspace::initialize(&cfg)?;

    let tasks = Arc::new(TaskSet::from_config(&cfg)?);
    let graph = TaskGraph::from_config(&cfg);
    let report = run_build_phase(tasks, &graph, Arc::new(NoopNotifier)).await?;

    assert!(report.is_clean(), "report: {report:?}");
    assert!(cfg.output_root().join("index.html").is_file());

    Ok(())
}

#[tokio::test]
async fn failed_dependency_skips_its_dependents() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = config_in(dir.path(), "[category.html]\nafter = [\"css\"]\n");
    populate_sources(cfg.source_root());
    // Broken Sass makes the css task fail.
    write_file(cfg.source_root(), "scss/style.scss", ".broken { color: ");
    workspace::initialize(&cfg)?;

    let tasks = Arc::new(TaskSet::from_config(&cfg)?);
    let graph = TaskGraph::from_config(&cfg);
    let report = run_build_phase(tasks, &graph, Arc::new(NoopNotifier)).await?;

    assert!(!report.is_clean());
    assert!(matches!(
        report.status(AssetKind::Css),
        Some(TaskStatus::Failed(_))
    ));
    assert!(matches!(
        report.status(AssetKind::Html),
        Some(TaskStatus::Skipped(AssetKind::Css))
    ));
    // Unrelated tasks still ran.
    assert!(matches!(
        report.status(AssetKind::Js),
        Some(TaskStatus::Succeeded { .. })
    ));
    assert!(!cfg.output_root().join("index.html").exists());

    Ok(())
}

#[tokio::test]
async fn one_bad_file_does_not_stop_the_rest_of_the_task() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = config_in(dir.path(), "");
    populate_sources(cfg.source_root());
    write_file(cfg.source_root(), "img/broken.png", "not a png");
    workspace::initialize(&cfg)?;

    let tasks = Arc::new(TaskSet::from_config(&cfg)?);
    let graph = TaskGraph::from_config(&cfg);
    let report = run_build_phase(tasks, &graph, Arc::new(NoopNotifier)).await?;

    // The img task is reported failed, but the good file was still written.
    assert!(matches!(
        report.status(AssetKind::Img),
        Some(TaskStatus::Failed(_))
    ));
    assert!(cfg.output_root().join("img/logo.webp").is_file());
    assert!(!cfg.output_root().join("img/broken.webp").exists());

    Ok(())
}

#[tokio::test]
async fn reload_fires_on_clean_runs_and_stays_quiet_on_failures() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = config_in(dir.path(), "");
    populate_sources(cfg.source_root());
    workspace::initialize(&cfg)?;

    let tasks = TaskSet::from_config(&cfg)?;
    let notifier = CountingNotifier::default();

    // Clean run: exactly one notification.
    let manifest = tasks.run(AssetKind::Css, &notifier)?;
    assert!(manifest.is_clean());
    assert_eq!(notifier.count(), 1);

    // Broken Sass: the run reports the failure and reload is suppressed.
    write_file(cfg.source_root(), "scss/style.scss", ".broken { color: ");
    let manifest = tasks.run(AssetKind::Css, &notifier)?;
    assert!(!manifest.is_clean());
    assert_eq!(notifier.count(), 1);

    Ok(())
}

#[tokio::test]
async fn rebuilding_clears_stale_outputs() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let cfg = config_in(dir.path(), "");
    populate_sources(cfg.source_root());
    workspace::initialize(&cfg)?;

    let tasks = Arc::new(TaskSet::from_config(&cfg)?);
    let graph = TaskGraph::from_config(&cfg);
    run_build_phase(Arc::clone(&tasks), &graph, Arc::new(NoopNotifier)).await?;

    // Rename the stylesheet; the old output must disappear on rebuild.
    std::fs::rename(
        cfg.source_root().join("scss/style.scss"),
        cfg.source_root().join("scss/site.scss"),
    )?;

    run_build_phase(tasks, &graph, Arc::new(NoopNotifier)).await?;

    assert!(cfg.output_root().join("css/site.css").is_file());
    assert!(!cfg.output_root().join("css/style.css").exists());

    Ok(())
}
