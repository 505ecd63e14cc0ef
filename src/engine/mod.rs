// src/engine/mod.rs

//! Watch-mode orchestration engine.
//!
//! The engine reacts to file-watch triggers and task completions:
//!
//! - the pure core state machine lives in [`core`]: it consumes
//!   [`RuntimeEvent`]s, tracks one [`RunState`] per task and emits commands
//!   for the IO shell,
//! - the async shell in [`runtime`] reads events from a channel and hands
//!   the commands to a [`TaskExecutor`](exec::TaskExecutor),
//! - the production executor in [`exec`] runs build tasks on the blocking
//!   thread pool and reports completions back into the loop.
//!
//! The core has no channels, Tokio types or IO, so the burst-collapse
//! semantics are unit tested without any async machinery.

use crate::pipeline::AssetKind;

/// Outcome of a finished task run, as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
}

/// Why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Seeded programmatically (e.g. a rebuild requested at startup).
    Manual,
    /// A watched file changed.
    FileWatch,
}

/// Per-task run state.
///
/// A burst of triggers collapses into at most one queued re-run: the first
/// trigger dispatches, later ones while the run is in flight merge into a
/// single pending marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    RunningWithPending,
}

/// Events flowing into the runtime from the watcher and the executor.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task should be (logically) triggered.
    TaskTriggered {
        task: AssetKind,
        reason: TriggerReason,
    },
    /// A task run finished with a concrete outcome.
    TaskCompleted {
        task: AssetKind,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod exec;
pub mod runtime;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use exec::{PipelineExecutor, TaskExecutor};
pub use runtime::Runtime;
