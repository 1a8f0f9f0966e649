//! etcd v2 transport
//!
//! HTTP client for the v2 key-space API: point-in-time recursive reads and
//! the long-poll change watch that feeds the scheduler's event channel.

pub mod client;
pub mod watch;
mod wire;

// Re-exports
pub use client::Client;
pub use watch::Watcher;
