// src/engine/exec.rs

//! Pluggable task executor.
//!
//! The runtime talks to a [`TaskExecutor`] instead of running tasks
//! directly, so tests can swap in a fake that records dispatches and emits
//! completions without touching the filesystem. The production
//! [`PipelineExecutor`] runs build tasks on the blocking thread pool and
//! reports `TaskCompleted` back into the runtime channel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::Result;
use crate::pipeline::{AssetKind, TaskSet};
use crate::serve::ReloadNotifier;

/// Trait abstracting how dispatched tasks are executed.
pub trait TaskExecutor: Send {
    /// Start one run of the given task. Must not block the event loop.
    fn dispatch(
        &mut self,
        task: AssetKind,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Wait for all in-flight runs to finish.
    fn drain(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production executor: each dispatch becomes a `spawn_blocking` run of the
/// task's pipeline, with the outcome fed back as a `TaskCompleted` event.
pub struct PipelineExecutor {
    tasks: Arc<TaskSet>,
    notifier: Arc<dyn ReloadNotifier>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    in_flight: JoinSet<()>,
}

impl PipelineExecutor {
    pub fn new(
        tasks: Arc<TaskSet>,
        notifier: Arc<dyn ReloadNotifier>,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            tasks,
            notifier,
            runtime_tx,
            in_flight: JoinSet::new(),
        }
    }
}

impl TaskExecutor for PipelineExecutor {
    fn dispatch(
        &mut self,
        task: AssetKind,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tasks = Arc::clone(&self.tasks);
        let notifier = Arc::clone(&self.notifier);
        let tx = self.runtime_tx.clone();

        self.in_flight.spawn(async move {
            let run_tasks = Arc::clone(&tasks);
            let run_notifier = Arc::clone(&notifier);
            let outcome = tokio::task::spawn_blocking(move || {
                run_tasks.run(task, run_notifier.as_ref())
            })
            .await;

            let outcome = match outcome {
                Ok(Ok(manifest)) if manifest.is_clean() => TaskOutcome::Success,
                Ok(Ok(manifest)) => {
                    warn!(
                        %task,
                        failed = manifest.failures.len(),
                        "rebuild finished with per-file failures"
                    );
                    TaskOutcome::Failed
                }
                Ok(Err(e)) => {
                    warn!(%task, error = %e, "rebuild failed");
                    TaskOutcome::Failed
                }
                Err(join_err) => {
                    warn!(%task, error = %join_err, "rebuild worker panicked");
                    TaskOutcome::Failed
                }
            };

            if tx
                .send(RuntimeEvent::TaskCompleted { task, outcome })
                .await
                .is_err()
            {
                debug!(%task, "runtime channel closed before completion event");
            }
        });

        Box::pin(async { Ok(()) })
    }

    fn drain(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            while self.in_flight.join_next().await.is_some() {}
            Ok(())
        })
    }
}
