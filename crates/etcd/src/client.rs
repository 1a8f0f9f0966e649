//! etcd v2 HTTP client

use std::time::Duration;

use async_trait::async_trait;
use scheduler::{TransportError, TreeReader};
use snap_core::Node;
use tracing::{debug, warn};

use crate::wire::KeysResponse;

/// Per-request bound for key-space reads
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Bound on one long-poll; the server holds the connection until a change
/// arrives, so an expiry here just means the namespace stayed quiet
const POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for the v2 key-space API of one cluster
pub struct Client {
    http: reqwest::Client,
    hosts: Vec<String>,
}

impl Client {
    /// `hosts` are endpoint URLs tried in order until one responds
    pub fn new(hosts: Vec<String>) -> Result<Self, TransportError> {
        let hosts: Vec<String> = hosts
            .into_iter()
            .map(|host| host.trim_end_matches('/').to_string())
            .filter(|host| !host.is_empty())
            .collect();
        if hosts.is_empty() {
            return Err(TransportError::Unavailable);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            hosts,
        })
    }

    /// Recursive point-in-time read of the namespace under `root`
    pub async fn read_recursive(&self, root: &str) -> Result<Node, TransportError> {
        let mut timed_out = false;
        for host in &self.hosts {
            let url = keys_url(host, root, "recursive=true");
            debug!(url = %url, "requesting root node");

            let response = match self.http.get(&url).timeout(READ_TIMEOUT).send().await {
                Ok(response) => response,
                Err(error) => {
                    timed_out |= error.is_timeout();
                    warn!(host = %host, error = %error, "key-space read failed, trying next endpoint");
                    continue;
                }
            };
            if !response.status().is_success() {
                warn!(host = %host, status = %response.status(), "key-space read rejected, trying next endpoint");
                continue;
            }

            let body: KeysResponse = response
                .json()
                .await
                .map_err(|error| TransportError::Decode(error.to_string()))?;
            return Ok(body.node.into_node());
        }

        if timed_out {
            Err(TransportError::Timeout)
        } else {
            Err(TransportError::Unavailable)
        }
    }

    /// One long-poll against the watch endpoint.
    ///
    /// Returns the changed key and the index to resume from, or `None` when
    /// the poll idled out with no change.
    pub(crate) async fn watch_once(
        &self,
        root: &str,
        wait_index: Option<u64>,
    ) -> Result<Option<(String, u64)>, TransportError> {
        let query = match wait_index {
            Some(index) => format!("wait=true&recursive=true&waitIndex={}", index),
            None => "wait=true&recursive=true".to_string(),
        };

        for host in &self.hosts {
            let url = keys_url(host, root, &query);
            let response = match self.http.get(&url).timeout(POLL_TIMEOUT).send().await {
                Ok(response) => response,
                Err(error) => {
                    if error.is_timeout() {
                        return Ok(None);
                    }
                    warn!(host = %host, error = %error, "watch poll failed, trying next endpoint");
                    continue;
                }
            };
            if !response.status().is_success() {
                // Typically an outdated waitIndex; the caller resets and resumes.
                return Err(TransportError::Decode(format!(
                    "watch rejected with status {}",
                    response.status()
                )));
            }

            let body: KeysResponse = response
                .json()
                .await
                .map_err(|error| TransportError::Decode(error.to_string()))?;
            debug!(action = %body.action, key = %body.node.key, "watch event");
            return Ok(Some((body.node.key, body.node.modified_index + 1)));
        }

        Err(TransportError::Unavailable)
    }
}

#[async_trait]
impl TreeReader for Client {
    async fn read_tree(&self, root: &str) -> Result<Node, TransportError> {
        self.read_recursive(root).await
    }
}

fn keys_url(host: &str, root: &str, query: &str) -> String {
    format!("{}/v2/keys{}?{}", host, root, query)
}
