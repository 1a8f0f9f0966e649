//! In-memory tree for one snapshot cycle

use chrono::{DateTime, Utc};

/// One entry in a hierarchical snapshot.
///
/// A node is immutable once returned by the tree reader; the serializer never
/// mutates it. Directories carry `nodes`, leaves carry `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Absolute key path, slash-delimited, always starting with `/`
    pub key: String,
    /// Whether this node is a directory
    pub dir: bool,
    /// Leaf payload; empty for directories
    pub value: Vec<u8>,
    /// Children in the order the store returned them (not sorted)
    pub nodes: Vec<Node>,
    /// Store-assigned creation version, preserved as metadata only
    pub created_index: u64,
    /// Store-assigned modification version, preserved as metadata only
    pub modified_index: u64,
    /// Absolute expiry; `None` means the node never expires
    pub expiration: Option<DateTime<Utc>>,
}

impl Node {
    /// Create an empty directory node
    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            dir: true,
            value: Vec::new(),
            nodes: Vec::new(),
            created_index: 0,
            modified_index: 0,
            expiration: None,
        }
    }

    /// Create a leaf node carrying `value`
    pub fn leaf(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            dir: false,
            value: value.into(),
            nodes: Vec::new(),
            created_index: 0,
            modified_index: 0,
            expiration: None,
        }
    }

    /// Set the store version metadata
    pub fn with_indexes(mut self, created: u64, modified: u64) -> Self {
        self.created_index = created;
        self.modified_index = modified;
        self
    }

    /// Set the expiry timestamp
    pub fn with_expiration(mut self, when: DateTime<Utc>) -> Self {
        self.expiration = Some(when);
        self
    }
}
