//! Snapshot orchestration
//!
//! Two long-lived drivers feed one serialized snapshot action: the debounce
//! driver waits out bursts of change events, and the staleness driver fires
//! on a fixed interval. Both funnel into `Snapshotter`, which owns the
//! read-serialize-sink sequence behind a single execution gate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use snap_core::{archive_name, write_archive, Node};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

use crate::debounce::QuietWindow;
use crate::error::{ConfigError, SinkError, SnapshotError, TransportError};

/// Bound on a single tree read or sink write
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(120);

/// A change notification from the store; only the key is reliable
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub key: String,
}

/// Why a snapshot was taken; logged, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotTrigger {
    /// A burst of change events went quiet
    EventBurstQuiesced,
    /// The maximum staleness clock fired
    MaxStalenessElapsed,
}

/// Point-in-time recursive read of the store namespace
#[async_trait]
pub trait TreeReader: Send + Sync {
    async fn read_tree(&self, root: &str) -> Result<Node, TransportError>;
}

/// Durable destination for finished archives
#[async_trait]
pub trait ArchiveSink: Send + Sync {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<(), SinkError>;
}

#[async_trait]
impl<T: TreeReader + ?Sized> TreeReader for Arc<T> {
    async fn read_tree(&self, root: &str) -> Result<Node, TransportError> {
        (**self).read_tree(root).await
    }
}

#[async_trait]
impl<T: ArchiveSink + ?Sized> ArchiveSink for Arc<T> {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
        (**self).store(name, bytes).await
    }
}

/// Timing bounds for the snapshot cadence
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Span of inactivity after a change before a snapshot is taken
    pub min_quiet_period: Duration,
    /// Upper bound between snapshots regardless of activity
    pub max_staleness_period: Duration,
    /// Bound on a single tree read or sink write
    pub op_timeout: Duration,
    /// Namespace root passed to the tree reader
    pub root: String,
}

impl SchedulerConfig {
    pub fn new(min_quiet_period: Duration, max_staleness_period: Duration) -> Self {
        Self {
            min_quiet_period,
            max_staleness_period,
            op_timeout: DEFAULT_OP_TIMEOUT,
            root: "/".to_string(),
        }
    }

    /// Reject bounds the scheduler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_staleness_period <= self.min_quiet_period {
            return Err(ConfigError::StalenessNotAboveQuiet {
                min: self.min_quiet_period,
                max: self.max_staleness_period,
            });
        }
        Ok(())
    }
}

/// Mutable scheduler state; touched only while the execution gate is held
#[derive(Debug, Default)]
struct SchedulerState {
    last_snapshot: Option<Instant>,
}

/// Debounce scheduler: converts a bursty change-event stream into a bounded
/// snapshot cadence and serializes snapshot execution.
pub struct Snapshotter<R, S> {
    reader: R,
    sink: S,
    cluster_name: String,
    config: SchedulerConfig,
    /// Execution gate; doubles as the lock on the timer fields inside
    state: Mutex<SchedulerState>,
}

impl<R, S> Snapshotter<R, S>
where
    R: TreeReader + 'static,
    S: ArchiveSink + 'static,
{
    pub fn new(
        reader: R,
        sink: S,
        cluster_name: impl Into<String>,
        config: SchedulerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            reader,
            sink,
            cluster_name: cluster_name.into(),
            config,
            state: Mutex::new(SchedulerState::default()),
        })
    }

    /// Run both drivers until `shutdown` flips or the event stream ends.
    pub async fn run(
        self: Arc<Self>,
        events: mpsc::Receiver<ChangeEvent>,
        shutdown: watch::Receiver<bool>,
    ) {
        let debounce = {
            let this = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { this.run_debounce(events, shutdown).await })
        };
        let staleness = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.run_staleness(shutdown).await })
        };
        let _ = tokio::join!(debounce, staleness);
    }

    /// Change-burst driver.
    ///
    /// Idle until an event arrives, then wait out the quiet window
    /// (reset-on-event, capped at the staleness period) while coalescing
    /// further events, and snapshot once per burst.
    pub async fn run_debounce(
        &self,
        mut events: mpsc::Receiver<ChangeEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let first = tokio::select! {
                _ = shutdown.changed() => return,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("change stream closed, debounce driver exiting");
                        return;
                    }
                },
            };

            debug!(key = %first.key, "change observed, waiting for quiet period");
            let opened = Instant::now();
            let mut window = QuietWindow::open(
                opened,
                self.config.min_quiet_period,
                self.config.max_staleness_period,
            );
            let mut last_event = opened;
            let mut stream_closed = false;

            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = time::sleep_until(window.deadline()) => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            trace!(key = %event.key, "coalescing change into pending window");
                            last_event = Instant::now();
                            window.extend(last_event, self.config.min_quiet_period);
                        }
                        None => {
                            // Honor the pending window before exiting.
                            tokio::select! {
                                _ = shutdown.changed() => return,
                                _ = time::sleep_until(window.deadline()) => {}
                            }
                            stream_closed = true;
                            break;
                        }
                    },
                }
            }

            debug!("quiet period expired, taking a snapshot");
            if let Err(error) = self.snapshot_after_burst(last_event).await {
                error!(%error, "snapshot failed, scheduling continues");
            }

            if stream_closed {
                debug!("change stream closed, debounce driver exiting");
                return;
            }
        }
    }

    /// Staleness driver: fires every `max_staleness_period` regardless of the
    /// debounce driver's state. Triggers from this driver are never dropped.
    pub async fn run_staleness(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.max_staleness_period;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = ticker.tick() => {
                    debug!("max staleness period expired, taking a snapshot");
                    if let Err(error) = self
                        .take_snapshot(SnapshotTrigger::MaxStalenessElapsed)
                        .await
                    {
                        error!(%error, "snapshot failed, scheduling continues");
                    }
                }
            }
        }
    }

    /// Take one snapshot now, waiting for any in-flight one to finish first.
    pub async fn take_snapshot(&self, trigger: SnapshotTrigger) -> Result<(), SnapshotError> {
        let mut state = self.state.lock().await;
        self.snapshot_locked(&mut state, trigger).await
    }

    /// Burst variant: once the gate is held, skip if a snapshot completed
    /// after the burst's last event; its effect is already durable.
    async fn snapshot_after_burst(&self, last_event: Instant) -> Result<(), SnapshotError> {
        let mut state = self.state.lock().await;
        if let Some(last_snapshot) = state.last_snapshot {
            if last_snapshot >= last_event {
                debug!("burst subsumed by a newer snapshot, skipping");
                return Ok(());
            }
        }
        self.snapshot_locked(&mut state, SnapshotTrigger::EventBurstQuiesced)
            .await
    }

    async fn snapshot_locked(
        &self,
        state: &mut SchedulerState,
        trigger: SnapshotTrigger,
    ) -> Result<(), SnapshotError> {
        info!(?trigger, "taking a snapshot");

        let tree = time::timeout(
            self.config.op_timeout,
            self.reader.read_tree(&self.config.root),
        )
        .await
        .map_err(|_| TransportError::Timeout)??;

        let archive = write_archive(&tree)?;
        let name = archive_name(&self.cluster_name, Utc::now());
        let bytes = archive.len();

        time::timeout(self.config.op_timeout, self.sink.store(&name, archive))
            .await
            .map_err(|_| SinkError::WriteFailed("sink write timed out".to_string()))??;

        state.last_snapshot = Some(Instant::now());
        info!(name = %name, bytes, "snapshot stored");
        Ok(())
    }
}
