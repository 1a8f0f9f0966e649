//! etcdsnap CLI - point-in-time tar.gz archives of an etcd key space

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;
mod sink;

/// etcdsnap - coalescing snapshot archiver for an etcd namespace
#[derive(Parser)]
#[command(name = "etcdsnap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// etcd endpoints, comma-delimited
    #[arg(
        long = "etcd-hosts",
        short = 'e',
        env = "ETCD_HOSTS",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:2379"
    )]
    etcd_hosts: Vec<String>,

    /// Cluster name used in archive naming
    #[arg(
        long = "cluster-name",
        short = 'n',
        env = "CLUSTER_NAME",
        default_value = "etcd-cluster"
    )]
    cluster_name: String,

    /// Verbose logging
    #[arg(long, env = "DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive the key space once to a local file
    File {
        /// Where to write the resulting tarball (stdout if not set)
        #[arg(long, short = 'o', env = "OUTFILE")]
        outfile: Option<PathBuf>,
    },
    /// Archive the key space once to an S3 bucket
    S3 {
        #[command(flatten)]
        s3: S3Opts,
    },
    /// Watch for changes and archive continuously
    Run {
        /// How long a burst must stay quiet before an archive is taken
        #[arg(long = "min-period", env = "MIN_PERIOD", default_value = "1h")]
        min_period: humantime::Duration,

        /// Longest time between archives if there are no updates
        #[arg(long = "max-period", env = "MAX_PERIOD", default_value = "7d")]
        max_period: humantime::Duration,

        /// Write archives into this directory instead of S3
        #[arg(long)]
        outdir: Option<PathBuf>,

        #[command(flatten)]
        s3: S3Opts,
    },
}

/// S3 destination flags
#[derive(Args)]
struct S3Opts {
    /// Access key of an IAM user with write access to the given bucket
    #[arg(long = "aws-access", env = "AWS_ACCESS_KEY_ID")]
    aws_access: Option<String>,

    /// Secret key of an IAM user with write access to the given bucket
    #[arg(long = "aws-secret", env = "AWS_SECRET_ACCESS_KEY")]
    aws_secret: Option<String>,

    /// S3-compatible endpoint
    #[arg(
        long = "s3-endpoint",
        env = "AWS_S3_ENDPOINT",
        default_value = "https://s3.amazonaws.com"
    )]
    s3_endpoint: String,

    /// Bucket in which to place the archive
    #[arg(long = "aws-bucket", env = "AWS_S3_BUCKET")]
    aws_bucket: Option<String>,
}

impl S3Opts {
    fn is_configured(&self) -> bool {
        self.aws_bucket.is_some()
    }

    fn build_sink(self) -> Result<sink::S3Sink> {
        let bucket = self
            .aws_bucket
            .context("--aws-bucket is required for the s3 destination")?;
        let access = self
            .aws_access
            .context("--aws-access is required for the s3 destination")?;
        let secret = self
            .aws_secret
            .context("--aws-secret is required for the s3 destination")?;
        Ok(sink::S3Sink::new(access, secret, self.s3_endpoint, bucket))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let hosts = validated_hosts(cli.etcd_hosts)?;

    match cli.command {
        Commands::File { outfile } => cmd::file::run(hosts, outfile).await,
        Commands::S3 { s3 } => cmd::s3::run(hosts, &cli.cluster_name, s3.build_sink()?).await,
        Commands::Run {
            min_period,
            max_period,
            outdir,
            s3,
        } => {
            cmd::run::run(
                hosts,
                cli.cluster_name,
                min_period.into(),
                max_period.into(),
                outdir,
                s3,
            )
            .await
        }
    }
}

fn validated_hosts(hosts: Vec<String>) -> Result<Vec<String>> {
    let hosts: Vec<String> = hosts
        .into_iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect();
    anyhow::ensure!(!hosts.is_empty(), "at least one etcd host is required");
    Ok(hosts)
}
