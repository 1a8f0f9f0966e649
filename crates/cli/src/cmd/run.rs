//! Continuous snapshot daemon
//!
//! Wires the watch loop, the debounce scheduler, and the chosen destination
//! together, then runs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scheduler::{ArchiveSink, SchedulerConfig, Snapshotter};
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::sink::FileSink;
use crate::S3Opts;

/// Buffered change notifications; the watch loop blocks when full
const EVENT_BUFFER: usize = 1024;

pub async fn run(
    hosts: Vec<String>,
    cluster_name: String,
    min_period: Duration,
    max_period: Duration,
    outdir: Option<PathBuf>,
    s3: S3Opts,
) -> Result<()> {
    let sink: Arc<dyn ArchiveSink> = match outdir {
        Some(dir) => {
            anyhow::ensure!(
                !s3.is_configured(),
                "choose either --outdir or an S3 bucket, not both"
            );
            Arc::new(FileSink::new(dir)?)
        }
        None => Arc::new(s3.build_sink()?),
    };

    let client = Arc::new(etcd::Client::new(hosts)?);
    let config = SchedulerConfig::new(min_period, max_period);
    let snapshotter = Arc::new(Snapshotter::new(
        Arc::clone(&client),
        sink,
        cluster_name,
        config,
    )?);

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!("listening for changes");
    let watcher = etcd::Watcher::new(client, "/");
    let watch_task = tokio::spawn(watcher.run(events_tx, shutdown_rx.clone()));
    let scheduler_task = tokio::spawn(snapshotter.run(events_rx, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("shutdown signal received, stopping");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(watch_task, scheduler_task);
    Ok(())
}
