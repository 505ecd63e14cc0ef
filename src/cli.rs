// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::pipeline::AssetKind;

/// Command-line arguments for `assetpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetpipe",
    version,
    about = "Build front-end assets, watch the sources and live-reload on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Run a single task by name instead of the full pipeline.
    ///
    /// `clean` resets the workspace; the build tasks (`html`, `css`, `js`,
    /// `img`, `fonts`) each run their own pipeline once and exit.
    #[arg(value_enum, value_name = "TASK")]
    pub task: Option<TaskArg>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Assetpipe.toml` in the current working directory. A missing
    /// file is not an error; the built-in source/output layout applies.
    #[arg(long, value_name = "PATH", default_value = "Assetpipe.toml")]
    pub config: String,

    /// Initialize and build once, then exit without serving or watching.
    #[arg(long)]
    pub once: bool,

    /// Parse + validate, print the resolved task graph, but don't build.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Individually invocable tasks on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum TaskArg {
    Html,
    Css,
    Js,
    Img,
    Fonts,
    Clean,
}

impl TaskArg {
    /// The asset category this argument names, or `None` for `clean`.
    pub fn asset_kind(self) -> Option<AssetKind> {
        match self {
            TaskArg::Html => Some(AssetKind::Html),
            TaskArg::Css => Some(AssetKind::Css),
            TaskArg::Js => Some(AssetKind::Js),
            TaskArg::Img => Some(AssetKind::Img),
            TaskArg::Fonts => Some(AssetKind::Fonts),
            TaskArg::Clean => None,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
