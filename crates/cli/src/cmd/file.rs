//! One-shot archive to a local file or stdout

use std::path::PathBuf;

use anyhow::{Context, Result};
use snap_core::write_archive;
use tracing::debug;

use crate::sink;

pub async fn run(hosts: Vec<String>, outfile: Option<PathBuf>) -> Result<()> {
    let client = etcd::Client::new(hosts)?;

    debug!("requesting root node");
    let tree = client
        .read_recursive("/")
        .await
        .context("could not retrieve the store root")?;

    let archive = write_archive(&tree)?;
    sink::file::write_to(&archive, outfile.as_deref())
}
