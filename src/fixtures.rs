// Records and store doubles shared by the unit tests.

use crate::error::Result;
use crate::format::format_feature;
use crate::store::{MemoryStore, Reader, Writer, WriterFactory};
use crate::uri;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DEFAULT_GEOMETRY_ID: i64 = 102527513;
pub const DEFAULT_GEOMETRY_POINT: (f64, f64) = (-122.386166, 37.616599);

pub fn place(id: i64, x: f64, y: f64, hierarchy: &[(&str, i64)]) -> Value {
    let mut hier = Map::new();

    for (placetype, parent) in hierarchy {
        hier.insert(placetype.to_string(), json!(parent));
    }

    let hierarchies = if hier.is_empty() {
        json!([])
    } else {
        json!([hier])
    };

    json!({
        "id": id,
        "type": "Feature",
        "properties": {
            "wof:id": id,
            "wof:name": format!("place {}", id),
            "wof:placetype": "locality",
            "wof:repo": "whosonfirst-data-admin-us",
            "wof:hierarchy": hierarchies,
        },
        "geometry": {"type": "Point", "coordinates": [x, y]},
    })
}

pub fn depiction(id: i64, parent_id: i64, alt_labels: &[&str]) -> Value {
    json!({
        "id": id,
        "type": "Feature",
        "properties": {
            "wof:id": id,
            "wof:parent_id": parent_id,
            "wof:name": format!("image {}", id),
            "wof:repo": "sfomuseum-data-media-collection",
            "src:geom": "sfomuseum",
            "src:geom_alt": alt_labels,
        },
        "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
    })
}

pub fn subject(id: i64, images: &[i64]) -> Value {
    json!({
        "id": id,
        "type": "Feature",
        "properties": {
            "wof:id": id,
            "wof:parent_id": -1,
            "wof:name": format!("object {}", id),
            "wof:repo": "sfomuseum-data-collection",
            "millsfield:images": images,
        },
        "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
    })
}

/// Stores `body` under its id, formatted the way writers format records.
pub fn put(store: &MemoryStore, body: &Value) {
    let id = crate::properties::id(body).unwrap();
    let path = uri::id_to_rel_path(id).unwrap();
    store.insert(path, format_feature(body).unwrap());
}

/// Two places and the default geometry record.
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());

    put(
        &store,
        &place(1001, 10.0, 20.0, &[("locality_id", 1001), ("country_id", 85633793)]),
    );
    put(
        &store,
        &place(1002, 30.0, 40.0, &[("locality_id", 1002), ("country_id", 85633793)]),
    );

    let (x, y) = DEFAULT_GEOMETRY_POINT;
    put(
        &store,
        &place(DEFAULT_GEOMETRY_ID, x, y, &[("campus_id", DEFAULT_GEOMETRY_ID)]),
    );

    store
}

/// Hands out one memory store per writer URI, or the same store for every URI.
#[derive(Default)]
pub struct MemoryWriterFactory {
    stores: DashMap<String, Arc<MemoryStore>>,
    shared: Option<Arc<MemoryStore>>,
    requested: Mutex<Vec<String>>,
}

impl MemoryWriterFactory {
    pub fn shared(store: Arc<MemoryStore>) -> Self {
        Self {
            shared: Some(store),
            ..Self::default()
        }
    }

    pub fn store(&self, writer_uri: &str) -> Arc<MemoryStore> {
        if let Some(shared) = &self.shared {
            return Arc::clone(shared);
        }

        self.stores
            .entry(writer_uri.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new()))
            .clone()
    }

    /// Writer URIs in the order they were asked for.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl WriterFactory for MemoryWriterFactory {
    fn new_writer(&self, uri: &str) -> Result<Arc<dyn Writer>> {
        self.requested.lock().unwrap().push(uri.to_string());
        let writer: Arc<dyn Writer> = self.store(uri);
        Ok(writer)
    }
}

/// Counts every read and write that reaches the wrapped store.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reader for CountingStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(path).await
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(path).await
    }
}

#[async_trait]
impl Writer for CountingStore {
    async fn write(&self, path: &str, body: Bytes) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, body).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
