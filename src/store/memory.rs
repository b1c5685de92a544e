use super::{Reader, Writer};
use crate::error::{GeoError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

/// Concurrent in-memory store. Used as the capture half of a writer group and as a test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.records.get(path).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, path: impl Into<String>, body: impl Into<Bytes>) {
        self.records.insert(path.into(), body.into());
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl Reader for MemoryStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.records.contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        self.get(path)
            .ok_or_else(|| GeoError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl Writer for MemoryStore {
    async fn write(&self, path: &str, body: Bytes) -> Result<()> {
        self.records.insert(path.to_string(), body);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
