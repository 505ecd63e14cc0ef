// src/engine/core.rs

//! Pure core of the watch-mode runtime.
//!
//! A synchronous, deterministic state machine that consumes
//! [`RuntimeEvent`]s and produces:
//! - an updated per-task [`RunState`]
//! - a list of commands for the IO shell to execute
//!
//! The async shell (`engine::runtime::Runtime`) owns channels, signals and
//! the executor; everything about *when a task runs again* is decided here,
//! so it can be unit tested without Tokio.

use std::collections::HashMap;

use tracing::debug;

use crate::engine::{RunState, RuntimeEvent, TaskOutcome, TriggerReason};
use crate::pipeline::AssetKind;

/// Commands the IO shell executes after a core step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    DispatchTask(AssetKind),
}

/// Result of feeding one event into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn dispatch(task: AssetKind) -> Self {
        Self {
            commands: vec![CoreCommand::DispatchTask(task)],
            keep_running: true,
        }
    }

    fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }

    fn stop() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }
}

/// Per-task run states plus the trigger-collapsing transitions.
#[derive(Debug, Default)]
pub struct CoreRuntime {
    states: HashMap<AssetKind, RunState>,
}

impl CoreRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, task: AssetKind) -> RunState {
        self.states.get(&task).copied().unwrap_or_default()
    }

    /// True once every task is back to `Idle`.
    pub fn is_idle(&self) -> bool {
        self.states.values().all(|s| *s == RunState::Idle)
    }

    /// Handle a single runtime event, returning the commands for the shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => self.on_trigger(task, reason),
            RuntimeEvent::TaskCompleted { task, outcome } => self.on_completion(task, outcome),
            RuntimeEvent::ShutdownRequested => CoreStep::stop(),
        }
    }

    fn on_trigger(&mut self, task: AssetKind, reason: TriggerReason) -> CoreStep {
        match self.state(task) {
            RunState::Idle => {
                debug!(%task, ?reason, "trigger dispatches immediately");
                self.states.insert(task, RunState::Running);
                CoreStep::dispatch(task)
            }
            RunState::Running => {
                debug!(%task, ?reason, "trigger queued behind running task");
                self.states.insert(task, RunState::RunningWithPending);
                CoreStep::idle()
            }
            RunState::RunningWithPending => {
                // Burst collapse: further triggers merge into the one
                // already pending.
                debug!(%task, ?reason, "trigger collapsed into pending re-run");
                CoreStep::idle()
            }
        }
    }

    fn on_completion(&mut self, task: AssetKind, outcome: TaskOutcome) -> CoreStep {
        match self.state(task) {
            RunState::RunningWithPending => {
                debug!(%task, ?outcome, "run finished; dispatching pending re-run");
                self.states.insert(task, RunState::Running);
                CoreStep::dispatch(task)
            }
            RunState::Running => {
                self.states.insert(task, RunState::Idle);
                CoreStep::idle()
            }
            RunState::Idle => {
                // A completion for an idle task means the shell and core
                // disagree; log and carry on.
                debug!(%task, ?outcome, "completion for idle task ignored");
                CoreStep::idle()
            }
        }
    }
}
