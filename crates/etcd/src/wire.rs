//! etcd v2 wire format

use chrono::{DateTime, Utc};
use serde::Deserialize;
use snap_core::Node;

/// Response envelope for key-space reads and watches
#[derive(Debug, Deserialize)]
pub(crate) struct KeysResponse {
    #[serde(default)]
    pub action: String,
    pub node: WireNode,
}

/// One node of the v2 key space as it appears on the wire
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireNode {
    /// Absent on the namespace root
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub dir: bool,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub nodes: Vec<WireNode>,
    #[serde(default)]
    pub created_index: u64,
    #[serde(default)]
    pub modified_index: u64,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl WireNode {
    /// Convert into the snapshot tree model, preserving child order
    pub(crate) fn into_node(self) -> Node {
        Node {
            key: if self.key.is_empty() {
                "/".to_string()
            } else {
                self.key
            },
            dir: self.dir,
            value: self.value.into_bytes(),
            nodes: self.nodes.into_iter().map(WireNode::into_node).collect(),
            created_index: self.created_index,
            modified_index: self.modified_index,
            expiration: self.expiration,
        }
    }
}
