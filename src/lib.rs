// src/lib.rs

//! assetpipe: a front-end asset build orchestrator.
//!
//! One full run goes through three phases:
//!
//! 1. workspace initialization ([`workspace`]): output root reset, source
//!    scaffolding for fresh projects,
//! 2. the build phase ([`graph`]): every category's transform task once, in
//!    dependency waves,
//! 3. watch mode ([`engine`] + [`watch`] + [`serve`]): file changes trigger
//!    targeted rebuilds, clean rebuilds broadcast a reload signal.
//!
//! Individual tasks (`assetpipe css`, `assetpipe clean`, ...) run phase 2
//! for a single category and exit.

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod serve;
pub mod watch;
pub mod workspace;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::engine::{CoreRuntime, PipelineExecutor, Runtime, RuntimeEvent};
use crate::errors::{PipelineError, Result};
use crate::graph::{run_build_phase, TaskGraph};
use crate::pipeline::{AssetKind, TaskSet};
use crate::serve::{spawn_reload_service, NoopNotifier, ReloadHub, ReloadNotifier};
use crate::watch::{build_watch_profiles, spawn_watcher};

/// Capacity of the runtime event channel in watch mode.
const RUNTIME_CHANNEL_CAPACITY: usize = 64;

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(Path::new(&args.config))?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    if let Some(task) = args.task {
        return match task.asset_kind() {
            // `clean` is the only task without an asset category.
            None => workspace::clean_output(&cfg),
            Some(kind) => run_single_task(&cfg, kind).await,
        };
    }

    run_pipeline(cfg, args.once).await
}

/// Parse + validate only: print the resolved layout and the wave structure.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    println!("source root: {}", cfg.source_root().display());
    println!("output root: {}", cfg.output_root().display());
    println!();

    for cat in cfg.categories() {
        println!(
            "task {:<5} src={:?} out={:?} after={:?}",
            cat.kind.name(),
            cat.src,
            cfg.output_dir(cat.kind),
            cat.after.iter().map(|k| k.name()).collect::<Vec<_>>(),
        );
    }

    println!();
    print!("{}", TaskGraph::from_config(cfg).describe()?);
    Ok(())
}

/// Run one category's task once; non-clean runs are an error.
async fn run_single_task(cfg: &ConfigFile, kind: AssetKind) -> Result<()> {
    let tasks = Arc::new(TaskSet::from_config(cfg)?);

    let run_tasks = Arc::clone(&tasks);
    let manifest =
        tokio::task::spawn_blocking(move || run_tasks.run(kind, &NoopNotifier))
            .await
            .map_err(|e| PipelineError::Build(format!("build worker panicked: {e}")))??;

    if manifest.is_clean() {
        info!(task = %kind, written = manifest.written.len(), "task finished");
        Ok(())
    } else {
        let reasons: Vec<_> = manifest
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.path.display(), f.reason))
            .collect();
        Err(PipelineError::Build(format!(
            "task {kind} failed for {} file(s): {}",
            manifest.failures.len(),
            reasons.join("; ")
        )))
    }
}

/// The full three-phase run.
async fn run_pipeline(cfg: ConfigFile, once: bool) -> Result<()> {
    // Phase 1: failure here is fatal.
    workspace::initialize(&cfg)?;

    let tasks = Arc::new(TaskSet::from_config(&cfg)?);
    let graph = TaskGraph::from_config(&cfg);

    let hub = ReloadHub::new();
    let notifier: Arc<dyn ReloadNotifier> = if once {
        Arc::new(NoopNotifier)
    } else {
        Arc::new(hub.clone())
    };

    // Phase 2.
    let report = run_build_phase(Arc::clone(&tasks), &graph, Arc::clone(&notifier)).await?;

    if once {
        let failed = report.failed();
        return if report.is_clean() {
            Ok(())
        } else {
            Err(PipelineError::Build(format!(
                "build finished with failed tasks: {}",
                failed
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        };
    }

    // Phase 3: reload service, watcher, runtime loop. A dirty initial build
    // is reported but does not stop watch mode; the next save can fix it.
    if !report.is_clean() {
        info!("initial build had failures; watching for fixes");
    }

    spawn_reload_service(&hub);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(RUNTIME_CHANNEL_CAPACITY);

    let profiles = build_watch_profiles(&cfg);
    let _watcher_handle = spawn_watcher(
        cfg.source_root(),
        profiles,
        rt_tx.clone(),
        cfg.watch_section().skip_unchanged,
    )?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("assetpipe: failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let executor = PipelineExecutor::new(tasks, notifier, rt_tx);
    let runtime = Runtime::new(CoreRuntime::new(), rt_rx, executor);
    runtime.run().await
}
