//! Keyed byte-blob record stores, selected by URI scheme.

use crate::error::{GeoError, Result};
use crate::uri;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub mod github;
pub mod http;
pub mod memory;
pub mod repo;
pub mod throttle;

pub use memory::MemoryStore;
pub use throttle::ThrottledReader;

#[async_trait]
pub trait Reader: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;

    async fn read(&self, path: &str) -> Result<Bytes>;
}

#[async_trait]
pub trait Writer: Send + Sync {
    async fn write(&self, path: &str, body: Bytes) -> Result<()>;

    /// Finalizes any batched work. Most backends have nothing to do here.
    async fn close(&self) -> Result<()>;
}

/// Builds writers from (possibly provenance-rewritten) URIs.
pub trait WriterFactory: Send + Sync {
    fn new_writer(&self, uri: &str) -> Result<Arc<dyn Writer>>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultWriterFactory;

impl WriterFactory for DefaultWriterFactory {
    fn new_writer(&self, uri: &str) -> Result<Arc<dyn Writer>> {
        new_writer(uri)
    }
}

fn split_scheme(store_uri: &str) -> Result<(&str, &str)> {
    store_uri
        .split_once("://")
        .ok_or_else(|| GeoError::UnsupportedScheme(store_uri.to_string()))
}

pub fn new_reader(store_uri: &str) -> Result<Arc<dyn Reader>> {
    let (scheme, rest) = split_scheme(store_uri)?;

    let reader: Arc<dyn Reader> = match scheme {
        "repo" => Arc::new(repo::LocalStore::repo(rest)),
        "fs" => Arc::new(repo::LocalStore::directory(rest)),
        "http" | "https" => Arc::new(http::HttpReader::new(store_uri)?),
        "mem" => Arc::new(MemoryStore::new()),
        _ => return Err(GeoError::UnsupportedScheme(scheme.to_string())),
    };

    Ok(reader)
}

pub fn new_writer(store_uri: &str) -> Result<Arc<dyn Writer>> {
    let (scheme, rest) = split_scheme(store_uri)?;

    let writer: Arc<dyn Writer> = match scheme {
        "repo" => Arc::new(repo::LocalStore::repo(rest)),
        "fs" => Arc::new(repo::LocalStore::directory(rest)),
        "mem" => Arc::new(MemoryStore::new()),
        "stdout" => Arc::new(StdoutWriter),
        "null" => Arc::new(NullWriter),
        "githubapi" => Arc::new(github::GithubApiWriter::new(store_uri)?),
        "http" | "https" => return Err(GeoError::ReadOnly(store_uri.to_string())),
        _ => return Err(GeoError::UnsupportedScheme(scheme.to_string())),
    };

    Ok(writer)
}

pub struct StdoutWriter;

#[async_trait]
impl Writer for StdoutWriter {
    async fn write(&self, path: &str, body: Bytes) -> Result<()> {
        debug!("Writing {} to stdout", path);
        println!("{}", String::from_utf8_lossy(&body));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct NullWriter;

#[async_trait]
impl Writer for NullWriter {
    async fn write(&self, _path: &str, _body: Bytes) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub async fn load_feature(reader: &dyn Reader, id: i64) -> Result<Value> {
    let path = uri::id_to_rel_path(id)?;
    let body = reader.read(&path).await?;

    serde_json::from_slice(&body).map_err(|e| GeoError::decode(path, e))
}

pub async fn load_alt_bytes(reader: &dyn Reader, id: i64, alt_label: &str) -> Result<Bytes> {
    let path = uri::alt_id_to_rel_path(id, alt_label)?;
    reader.read(&path).await
}
