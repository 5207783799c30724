//! Artifact delivery.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::{types::NamedBlob, Error, Result};

/// Receives exported artifacts when a download is requested.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, artifact: &NamedBlob) -> Result<()>;
}

/// Writes artifacts into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `artifact` is written.
    pub fn path_for(&self, artifact: &NamedBlob) -> Result<PathBuf> {
        let name = Path::new(&artifact.name)
            .file_name()
            .ok_or_else(|| Error::Io(format!("Invalid artifact name: {:?}", artifact.name)))?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, artifact: &NamedBlob) -> Result<()> {
        let path = self.path_for(artifact)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, &artifact.blob.data).await?;
        info!(path = %path.display(), bytes = artifact.blob.len(), "Artifact written");
        Ok(())
    }
}
