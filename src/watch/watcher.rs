// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::errors::{PipelineError, Result};
use crate::watch::cache::FileCache;
use crate::watch::patterns::{relative_str, WatchProfile};

/// Keeps the underlying `RecommendedWatcher` alive; dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send `RuntimeEvent::TaskTriggered` for every
/// category whose patterns match a changed path.
///
/// With `skip_unchanged`, a path only triggers when its content hash differs
/// from the last one seen.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<WatchProfile>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    skip_unchanged: bool,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so event paths strip cleanly.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // Can't log via tracing from the notify thread.
                    eprintln!("assetpipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("assetpipe: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .map_err(|e| PipelineError::Watch(e.to_string()))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| PipelineError::Watch(format!("watching {}: {e}", root.display())))?;

    info!(root = %root.display(), "file watcher started");

    tokio::spawn(async move {
        let mut cache = FileCache::new();

        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            debug!(?event, "received notify event");

            // One event can carry several paths matching the same category;
            // trigger each category at most once per event.
            let mut triggered = BTreeSet::new();

            for path in &event.paths {
                let Ok(rel) = path.strip_prefix(&root) else {
                    continue;
                };
                let rel = relative_str(rel);

                let matching: Vec<_> = profiles
                    .iter()
                    .filter(|p| p.matches(&rel))
                    .map(|p| p.kind)
                    .collect();
                if matching.is_empty() {
                    continue;
                }

                if skip_unchanged && path.is_file() && !cache.changed(path) {
                    debug!(path = %rel, "content unchanged; not triggering");
                    continue;
                }

                triggered.extend(matching);
            }

            for kind in triggered {
                let sent = runtime_tx
                    .send(RuntimeEvent::TaskTriggered {
                        task: kind,
                        reason: TriggerReason::FileWatch,
                    })
                    .await;
                if sent.is_err() {
                    debug!("runtime channel closed; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
