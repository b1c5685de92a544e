//! Depiction and subject writers for a single logical update.
//!
//! Each record write goes to the persisted writer and to an in-memory capture so the final
//! records can be handed back to the caller without reading them from the store again.

use crate::error::{GeoError, Result};
use crate::format::format_feature;
use crate::provenance::{self, UpdateWriterUriOptions};
use crate::store::{MemoryStore, Writer, WriterFactory};
use crate::uri;
use bytes::Bytes;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

pub struct CreateWritersOptions<'a> {
    pub depiction_writer_uri: &'a str,
    pub subject_writer_uri: &'a str,
    pub provenance: Option<UpdateWriterUriOptions>,
}

pub struct WriterGroup {
    depiction_writer: Arc<dyn Writer>,
    subject_writer: Arc<dyn Writer>,
    depiction_capture: MemoryStore,
    subject_capture: MemoryStore,
}

impl WriterGroup {
    pub fn new(factory: &dyn WriterFactory, opts: &CreateWritersOptions<'_>) -> Result<Self> {
        let (depiction_uri, subject_uri) = match &opts.provenance {
            Some(p) => (
                provenance::update_writer_uri(p, opts.depiction_writer_uri)?,
                provenance::update_writer_uri(p, opts.subject_writer_uri)?,
            ),
            None => (
                opts.depiction_writer_uri.to_string(),
                opts.subject_writer_uri.to_string(),
            ),
        };

        Ok(Self {
            depiction_writer: factory.new_writer(&depiction_uri)?,
            subject_writer: factory.new_writer(&subject_uri)?,
            depiction_capture: MemoryStore::new(),
            subject_capture: MemoryStore::new(),
        })
    }

    async fn write_record(
        writer: &dyn Writer,
        capture: &MemoryStore,
        body: &Value,
    ) -> Result<Value> {
        let id = crate::properties::id(body)?;
        let path = uri::id_to_rel_path(id)?;
        let encoded = Bytes::from(format_feature(body)?);

        writer.write(&path, encoded.clone()).await?;
        capture.write(&path, encoded.clone()).await?;

        info!("Wrote {}", path);
        serde_json::from_slice(&encoded).map_err(|e| GeoError::decode(path, e))
    }

    /// Persists and captures a depiction, returning the body exactly as written.
    pub async fn write_depiction(&self, body: &Value) -> Result<Value> {
        Self::write_record(self.depiction_writer.as_ref(), &self.depiction_capture, body).await
    }

    pub async fn write_subject(&self, body: &Value) -> Result<Value> {
        Self::write_record(self.subject_writer.as_ref(), &self.subject_capture, body).await
    }

    /// Alternate geometry files are persisted but never echoed back.
    pub async fn write_alt(&self, id: i64, alt_label: &str, body: Vec<u8>) -> Result<()> {
        let path = uri::alt_id_to_rel_path(id, alt_label)?;
        self.depiction_writer.write(&path, Bytes::from(body)).await?;

        info!("Wrote {}", path);
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.depiction_writer.close().await?;
        self.subject_writer.close().await
    }

    fn captured(capture: &MemoryStore, fallback: &Value) -> Result<Value> {
        let id = crate::properties::id(fallback)?;
        let path = uri::id_to_rel_path(id)?;

        match capture.get(&path) {
            Some(body) => serde_json::from_slice(&body).map_err(|e| GeoError::decode(path, e)),
            None => Ok(fallback.clone()),
        }
    }

    /// Subject first, then depiction. A record that was never written comes back as `fallback`.
    pub fn as_feature_collection(
        &self,
        subject_fallback: &Value,
        depiction_fallback: &Value,
    ) -> Result<Value> {
        let subject = Self::captured(&self.subject_capture, subject_fallback)?;
        let depiction = Self::captured(&self.depiction_capture, depiction_fallback)?;

        Ok(json!({
            "type": "FeatureCollection",
            "features": [subject, depiction],
        }))
    }
}
