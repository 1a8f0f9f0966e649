//! Snapshot data model and archive encoding
//!
//! This crate provides:
//! - The `Node` tree returned by a point-in-time store read
//! - The tarball serializer (gzip-compressed tar, one entry per node)
//! - Archive naming helpers

pub mod archive;
pub mod node;

// Re-exports
pub use archive::{archive_name, write_archive, ArchiveError};
pub use node::Node;
