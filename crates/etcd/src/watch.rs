//! Change-notification watch loop
//!
//! Long-polls the v2 watch endpoint and forwards changed keys into the
//! scheduler's event channel. The stream promises at least one notification
//! per change, eventually; duplicates are possible and harmless since the
//! scheduler coalesces. Transport errors never terminate the loop.

use std::sync::Arc;
use std::time::Duration;

use scheduler::ChangeEvent;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, warn};

use crate::client::Client;

/// Pause after a failed poll before reconnecting
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Long-poll watch on one namespace root
pub struct Watcher {
    client: Arc<Client>,
    root: String,
}

impl Watcher {
    pub fn new(client: Arc<Client>, root: impl Into<String>) -> Self {
        Self {
            client,
            root: root.into(),
        }
    }

    /// Run until `shutdown` flips or the event channel closes.
    pub async fn run(self, events: mpsc::Sender<ChangeEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut wait_index: Option<u64> = None;

        loop {
            let polled = tokio::select! {
                _ = shutdown.changed() => return,
                polled = self.client.watch_once(&self.root, wait_index) => polled,
            };

            match polled {
                Ok(Some((key, next_index))) => {
                    wait_index = Some(next_index);
                    debug!(key = %key, "change notification");
                    if events.send(ChangeEvent { key }).await.is_err() {
                        debug!("event channel closed, watch loop exiting");
                        return;
                    }
                }
                Ok(None) => {
                    // Poll idled out with no change; resume with the same index.
                }
                Err(error) => {
                    warn!(error = %error, "watch poll failed, reconnecting");
                    wait_index = None;
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = time::sleep(RETRY_BACKOFF) => {}
                    }
                }
            }
        }
    }
}
