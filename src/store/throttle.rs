use super::Reader;
use crate::error::{GeoError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Caps the number of reads in flight against the wrapped reader.
pub struct ThrottledReader {
    inner: Arc<dyn Reader>,
    permits: Semaphore,
}

impl ThrottledReader {
    /// A limit of zero is treated as one.
    pub fn new(inner: Arc<dyn Reader>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    async fn permit(&self, path: &str) -> Result<SemaphorePermit<'_>> {
        self.permits.acquire().await.map_err(|e| GeoError::Io {
            path: path.to_string(),
            source: io::Error::other(e),
        })
    }
}

#[async_trait]
impl Reader for ThrottledReader {
    async fn exists(&self, path: &str) -> Result<bool> {
        let _permit = self.permit(path).await?;
        self.inner.exists(path).await
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let _permit = self.permit(path).await?;
        self.inner.read(path).await
    }
}
