// tests/runtime_fake_executor.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use assetpipe::engine::{
    CoreRuntime, Runtime, RuntimeEvent, TaskExecutor, TaskOutcome, TriggerReason,
};
use assetpipe::pipeline::AssetKind;

type TestResult = Result<(), Box<dyn Error>>;

/// A fake executor that records dispatches and immediately reports
/// `TaskCompleted(Success)`. Once `shutdown_after` dispatches have happened
/// it also requests shutdown, so tests terminate deterministically.
struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<AssetKind>>>,
    shutdown_after: usize,
}

impl TaskExecutor for FakeExecutor {
    fn dispatch(
        &mut self,
        task: AssetKind,
    ) -> Pin<Box<dyn Future<Output = assetpipe::errors::Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let shutdown_after = self.shutdown_after;

        Box::pin(async move {
            let count = {
                let mut guard = executed.lock().unwrap();
                guard.push(task);
                guard.len()
            };

            tx.send(RuntimeEvent::TaskCompleted {
                task,
                outcome: TaskOutcome::Success,
            })
            .await
            .map_err(|e| assetpipe::errors::PipelineError::Build(e.to_string()))?;

            if count >= shutdown_after {
                tx.send(RuntimeEvent::ShutdownRequested)
                    .await
                    .map_err(|e| assetpipe::errors::PipelineError::Build(e.to_string()))?;
            }
            Ok(())
        })
    }

    fn drain(&mut self) -> Pin<Box<dyn Future<Output = assetpipe::errors::Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

async fn run_with_seed(
    seed: Vec<RuntimeEvent>,
    shutdown_after: usize,
) -> Result<Vec<AssetKind>, Box<dyn Error>> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor {
        runtime_tx: rt_tx.clone(),
        executed: Arc::clone(&executed),
        shutdown_after,
    };

    for event in seed {
        rt_tx.send(event).await?;
    }

    let runtime = Runtime::new(CoreRuntime::new(), rt_rx, executor);
    timeout(Duration::from_secs(3), runtime.run()).await??;

    let executed = executed.lock().unwrap().clone();
    Ok(executed)
}

fn trigger(task: AssetKind) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task,
        reason: TriggerReason::FileWatch,
    }
}

#[tokio::test]
async fn burst_of_triggers_runs_the_task_exactly_twice() -> TestResult {
    init_tracing();

    // Five triggers while the first run is in flight: one immediate run,
    // one collapsed re-run, nothing else.
    let seed = vec![
        trigger(AssetKind::Css),
        trigger(AssetKind::Css),
        trigger(AssetKind::Css),
        trigger(AssetKind::Css),
        trigger(AssetKind::Css),
    ];

    let executed = run_with_seed(seed, 2).await?;
    assert_eq!(executed, vec![AssetKind::Css, AssetKind::Css]);
    Ok(())
}

#[tokio::test]
async fn independent_tasks_dispatch_independently() -> TestResult {
    init_tracing();

    let seed = vec![trigger(AssetKind::Css), trigger(AssetKind::Js)];

    let executed = run_with_seed(seed, 2).await?;
    assert_eq!(executed, vec![AssetKind::Css, AssetKind::Js]);
    Ok(())
}

#[tokio::test]
async fn shutdown_without_triggers_exits_cleanly() -> TestResult {
    init_tracing();

    let executed = run_with_seed(vec![RuntimeEvent::ShutdownRequested], 99).await?;
    assert!(executed.is_empty());
    Ok(())
}
