//! Local file destination

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use scheduler::{ArchiveSink, SinkError};
use tracing::info;

/// Write one archive to `path`, or stdout for `-`/unset
pub fn write_to(bytes: &[u8], path: Option<&Path>) -> Result<()> {
    match path {
        None => {
            std::io::stdout()
                .write_all(bytes)
                .context("could not write archive to stdout")?;
        }
        Some(path) if path.as_os_str() == "-" || path.as_os_str().is_empty() => {
            std::io::stdout()
                .write_all(bytes)
                .context("could not write archive to stdout")?;
        }
        Some(path) => {
            std::fs::write(path, bytes)
                .with_context(|| format!("could not write archive to {}", path.display()))?;
        }
    }
    Ok(())
}

/// Continuous-mode destination: every archive lands in one directory
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates `dir` if it does not exist yet
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("could not create archive directory {}", dir.display()))?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl ArchiveSink for FileSink {
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|error| SinkError::WriteFailed(format!("{}: {}", path.display(), error)))?;
        info!(path = %path.display(), "archive written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_to_creates_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cluster.tar.gz");

        write_to(b"archive bytes", Some(&path)).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"archive bytes");
    }

    #[tokio::test]
    async fn sink_stores_under_the_archive_name() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path().join("archives")).unwrap();

        sink.store("prod-2026-08-01T12:00:00Z.tar.gz", b"bytes".to_vec())
            .await
            .unwrap();

        let stored = dir.path().join("archives/prod-2026-08-01T12:00:00Z.tar.gz");
        assert_eq!(std::fs::read(stored).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn unwritable_directory_is_a_sink_error() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path().join("archives")).unwrap();
        std::fs::remove_dir(dir.path().join("archives")).unwrap();

        let error = sink.store("a.tar.gz", b"bytes".to_vec()).await.unwrap_err();
        assert!(matches!(error, SinkError::WriteFailed(_)));
    }
}
