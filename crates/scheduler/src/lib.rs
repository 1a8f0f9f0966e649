//! Coalescing snapshot scheduler
//!
//! Converts a high-frequency, bursty change-event stream into a
//! low-frequency snapshot cadence bounded by a quiet period and a staleness
//! ceiling, and serializes snapshot execution behind a single gate.

mod debounce;
pub mod error;
pub mod snapshot;

// Re-exports
pub use error::{ConfigError, SinkError, SnapshotError, TransportError};
pub use snapshot::{
    ArchiveSink, ChangeEvent, SchedulerConfig, SnapshotTrigger, Snapshotter, TreeReader,
};
