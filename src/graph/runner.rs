// src/graph/runner.rs

//! Wave-based execution of the build phase.
//!
//! Tasks within a wave run in parallel on the blocking thread pool; a wave
//! only starts once the previous one finished. A failed task does not abort
//! the wave, but its transitive dependents are skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::errors::{PipelineError, Result};
use crate::graph::TaskGraph;
use crate::pipeline::{AssetKind, TaskSet};
use crate::serve::ReloadNotifier;

/// Terminal state of one task in a build run.
#[derive(Debug, Clone)]
pub enum TaskStatus {
    Succeeded { written: usize },
    Failed(String),
    /// Not run because the named dependency did not succeed.
    Skipped(AssetKind),
}

/// Aggregate outcome of one build phase.
#[derive(Debug, Default)]
pub struct BuildReport {
    statuses: BTreeMap<AssetKind, TaskStatus>,
}

impl BuildReport {
    pub fn status(&self, kind: AssetKind) -> Option<&TaskStatus> {
        self.statuses.get(&kind)
    }

    pub fn is_clean(&self) -> bool {
        self.statuses
            .values()
            .all(|s| matches!(s, TaskStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> Vec<AssetKind> {
        self.statuses
            .iter()
            .filter(|(_, s)| matches!(s, TaskStatus::Failed(_)))
            .map(|(k, _)| *k)
            .collect()
    }

    /// Log one summary line per task.
    pub fn log_summary(&self) {
        for (kind, status) in &self.statuses {
            match status {
                TaskStatus::Succeeded { written } => {
                    info!(task = %kind, written, "build task succeeded");
                }
                TaskStatus::Failed(reason) => {
                    error!(task = %kind, %reason, "build task failed");
                }
                TaskStatus::Skipped(dep) => {
                    warn!(task = %kind, dependency = %dep, "build task skipped");
                }
            }
        }
    }
}

/// Run every build task once, in dependency waves.
///
/// IO-level errors inside a task are recorded as that task's failure rather
/// than aborting the phase; only runner-level faults (a panicked worker)
/// propagate as errors.
pub async fn run_build_phase(
    tasks: Arc<TaskSet>,
    graph: &TaskGraph,
    notifier: Arc<dyn ReloadNotifier>,
) -> Result<BuildReport> {
    let waves = graph.waves()?;
    let mut report = BuildReport::default();

    for wave in waves {
        let mut join_set = JoinSet::new();

        for kind in wave {
            // A task whose dependency failed or was skipped is skipped too.
            let broken_dep = graph.dependencies(kind).into_iter().find(|dep| {
                !matches!(report.status(*dep), Some(TaskStatus::Succeeded { .. }))
            });
            if let Some(dep) = broken_dep {
                report.statuses.insert(kind, TaskStatus::Skipped(dep));
                continue;
            }

            let tasks = Arc::clone(&tasks);
            let notifier = Arc::clone(&notifier);
            join_set.spawn_blocking(move || (kind, tasks.run(kind, notifier.as_ref())));
        }

        while let Some(joined) = join_set.join_next().await {
            let (kind, outcome) = joined
                .map_err(|e| PipelineError::Build(format!("build worker panicked: {e}")))?;

            let status = match outcome {
                Ok(manifest) if manifest.is_clean() => TaskStatus::Succeeded {
                    written: manifest.written.len(),
                },
                Ok(manifest) => {
                    let reasons: Vec<_> = manifest
                        .failures
                        .iter()
                        .map(|f| format!("{}: {}", f.path.display(), f.reason))
                        .collect();
                    TaskStatus::Failed(reasons.join("; "))
                }
                Err(e) => TaskStatus::Failed(e.to_string()),
            };
            report.statuses.insert(kind, status);
        }
    }

    report.log_summary();
    Ok(report)
}
