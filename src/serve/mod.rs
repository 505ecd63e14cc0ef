// src/serve/mod.rs

//! Reload notification: the channel between finished builds and whatever is
//! serving the output tree.
//!
//! Build tasks only see the [`ReloadNotifier`] trait. The production
//! implementation, [`ReloadHub`], fans a unit "reload" signal out over a
//! tokio broadcast channel; single-task CLI runs use [`NoopNotifier`].

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Receiver side of a build-finished notification.
///
/// Called by a task after a clean run; implementations must tolerate there
/// being no subscribers at all.
pub trait ReloadNotifier: Send + Sync {
    fn notify_clients(&self);
}

/// Broadcast-backed notifier used in watch mode.
///
/// Lagged subscribers lose intermediate signals, which is fine: a reload is
/// idempotent and only the latest one matters.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<()>,
}

const RELOAD_CHANNEL_CAPACITY: usize = 16;

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(RELOAD_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadNotifier for ReloadHub {
    fn notify_clients(&self) {
        match self.tx.send(()) {
            Ok(subscribers) => debug!(subscribers, "reload signal broadcast"),
            // No subscribers yet; nothing to reload.
            Err(_) => debug!("reload signal dropped; no subscribers"),
        }
    }
}

/// Notifier for one-shot runs: clean builds are not announced anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
    fn notify_clients(&self) {}
}

/// Spawn a background task that logs every reload broadcast.
///
/// Stands in for a dev-server integration: anything serving the output tree
/// can subscribe to the hub the same way.
pub fn spawn_reload_service(hub: &ReloadHub) {
    let mut rx = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(()) => info!("reload: output tree updated"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "reload receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
