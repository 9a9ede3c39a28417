//! Periodic session expiry.
//!
//! The sweeper is the only path that removes sessions on elapsed time;
//! every other removal is an explicit revocation. It runs as an owned
//! background task with a shutdown handle so the server can join it during
//! graceful teardown instead of abandoning it mid-tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time};
use tracing::{debug, info};

use super::{now_ms, SessionTable};

/// Handle to the background expiry task.
pub struct ExpirySweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Start sweeping `table` every `interval`.
    #[must_use]
    pub fn spawn(table: Arc<SessionTable>, interval: Duration) -> Self {
        let (shutdown, mut rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for uuid in table.evict_expired(now_ms()) {
                            info!("Token for {uuid} has expired");
                        }
                    }
                    _ = rx.changed() => {
                        debug!("Expiry sweeper stopping");
                        break;
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Signal the task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
