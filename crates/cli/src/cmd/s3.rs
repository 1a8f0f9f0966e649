//! One-shot archive upload to an S3 bucket

use anyhow::{Context, Result};
use chrono::Utc;
use scheduler::ArchiveSink;
use snap_core::{archive_name, write_archive};
use tracing::{debug, info};

use crate::sink::S3Sink;

pub async fn run(hosts: Vec<String>, cluster_name: &str, sink: S3Sink) -> Result<()> {
    let client = etcd::Client::new(hosts)?;

    debug!("requesting root node");
    let tree = client
        .read_recursive("/")
        .await
        .context("could not retrieve the store root")?;

    let archive = write_archive(&tree)?;
    let name = archive_name(cluster_name, Utc::now());
    sink.store(&name, archive).await?;

    info!(name = %name, "wrote archive to bucket");
    Ok(())
}
