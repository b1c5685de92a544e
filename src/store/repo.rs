use super::{Reader, Writer};
use crate::error::{GeoError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use path_clean::PathClean;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A directory on local disk. `repo://` stores keep records under `<root>/data`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn repo(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().join("data").clean(),
        }
    }

    pub fn directory(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf().clean(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs_path(&self, rel_path: &str) -> PathBuf {
        self.root.join(rel_path.trim_start_matches('/')).clean()
    }
}

fn io_error(path: &Path, source: io::Error) -> GeoError {
    if source.kind() == io::ErrorKind::NotFound {
        return GeoError::NotFound(path.display().to_string());
    }

    GeoError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl Reader for LocalStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let abs = self.abs_path(path);
        fs::try_exists(&abs).await.map_err(|e| io_error(&abs, e))
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let abs = self.abs_path(path);
        let body = fs::read(&abs).await.map_err(|e| io_error(&abs, e))?;
        Ok(Bytes::from(body))
    }
}

#[async_trait]
impl Writer for LocalStore {
    async fn write(&self, path: &str, body: Bytes) -> Result<()> {
        let abs = self.abs_path(path);

        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        debug!("Write {}", abs.display());
        fs::write(&abs, &body).await.map_err(|e| io_error(&abs, e))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
