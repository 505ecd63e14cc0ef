// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::core::{CoreCommand, CoreRuntime};
use crate::engine::{RuntimeEvent, TaskExecutor};
use crate::errors::Result;

/// Async IO shell around [`CoreRuntime`].
///
/// Reads events from the channel, feeds them to the core and executes the
/// returned commands through the executor. All rebuild semantics live in
/// the core; this loop only moves data.
pub struct Runtime<E: TaskExecutor> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: TaskExecutor> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: TaskExecutor> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Main event loop; returns after a shutdown event once in-flight runs
    /// have drained.
    pub async fn run(mut self) -> Result<()> {
        info!("watch runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");
            let step = self.core.step(event);

            for command in step.commands {
                match command {
                    CoreCommand::DispatchTask(task) => {
                        debug!(%task, "dispatching task run");
                        self.executor.dispatch(task).await?;
                    }
                }
            }

            if !step.keep_running {
                info!("shutdown requested; stopping runtime");
                break;
            }
        }

        // Let in-flight rebuilds finish so output trees are not left half
        // written.
        self.executor.drain().await?;
        info!("runtime exited");
        Ok(())
    }
}
