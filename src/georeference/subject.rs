//! Rebuilds a subject's georeference roll-up from the live state of its depictions.

use super::{DepictedEntry, depicted_entries, load_default_geometry};
use crate::error::Result;
use crate::fanout::fan_out;
use crate::geometry::{self, derive_points_for_geometries, derive_points_for_ids};
use crate::iterate;
use crate::patch::{self, Updates};
use crate::properties;
use crate::store::{self, Reader, WriterFactory};
use crate::writers::{CreateWritersOptions, WriterGroup};
use crate::{
    RESERVED_GEOREFERENCE_BELONGSTO, RESERVED_GEOREFERENCE_DEPICTED,
    RESERVED_GEOREFERENCE_DEPICTIONS, RESERVED_GEOREFERENCE_LASTMODIFIED,
    RESERVED_GEOTAG_DEPICTIONS, SUBJECT_IMAGES, property_path,
};
use geo_types::Geometry;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// State for a depiction that may not be readable from the store yet.
#[derive(Debug, Clone, Default)]
pub struct PendingDepiction {
    pub depicted: Vec<DepictedEntry>,
    /// Used in place of reading the depiction's geometry by id.
    pub geometry: Option<Geometry<f64>>,
}

/// Depiction id -> pending state. Ordered so recompilation is deterministic.
pub type SkipList = BTreeMap<i64, PendingDepiction>;

#[derive(Clone)]
pub struct RecompileOptions {
    pub depiction_reader: Arc<dyn Reader>,
    /// Where the default geometry record lives.
    pub whosonfirst_reader: Arc<dyn Reader>,
    pub default_geometry_id: Option<i64>,
}

#[derive(Default)]
struct Rollup {
    belongs_to: Vec<i64>,
    depicted: BTreeMap<String, Vec<i64>>,
    depictions: Vec<i64>,
}

impl Rollup {
    /// `always` lists the depiction even if it contributes nothing. A later recompile with an
    /// empty skip list drops it again.
    fn add(&mut self, depiction_id: i64, entries: &[DepictedEntry], always: bool) {
        let contributes = entries.iter().any(|e| !e.ids.is_empty());

        if (always || contributes) && !self.depictions.contains(&depiction_id) {
            self.depictions.push(depiction_id);
        }

        for entry in entries.iter().filter(|e| !e.ids.is_empty()) {
            let ids = self.depicted.entry(entry.label.clone()).or_default();

            for id in &entry.ids {
                if !ids.contains(id) {
                    ids.push(*id);
                }

                if !self.belongs_to.contains(id) {
                    self.belongs_to.push(*id);
                }
            }
        }
    }
}

async fn read_depicted(reader: Arc<dyn Reader>, id: i64) -> Result<Vec<DepictedEntry>> {
    let body = store::load_feature(reader.as_ref(), id).await?;
    depicted_entries(&body)
}

/// Returns whether anything changed and the (possibly) new subject body. The subject's own
/// denormalized values are never trusted, everything is derived from its depictions.
#[tracing::instrument(skip_all, fields(subject_id = %properties::id(subject_body).unwrap_or(-1)))]
pub async fn recompile(
    opts: &RecompileOptions,
    subject_body: &Value,
    skip_list: &SkipList,
) -> Result<(bool, Value)> {
    let mut images = patch::get_i64_array(subject_body, &property_path(SUBJECT_IMAGES));

    for id in skip_list.keys() {
        if !images.contains(id) {
            images.push(*id);
        }
    }

    debug!("Recompile subject from {} depictions", images.len());

    let to_fetch: Vec<i64> = images
        .iter()
        .copied()
        .filter(|id| !skip_list.contains_key(id))
        .collect();

    let reader = Arc::clone(&opts.depiction_reader);
    let fetched = fan_out(to_fetch.clone(), |id| read_depicted(Arc::clone(&reader), id)).await?;

    let fetched: BTreeMap<i64, Vec<DepictedEntry>> = to_fetch.into_iter().zip(fetched).collect();

    let mut rollup = Rollup::default();

    for id in &images {
        match skip_list.get(id) {
            Some(pending) => rollup.add(*id, &pending.depicted, true),
            None => {
                if let Some(entries) = fetched.get(id) {
                    rollup.add(*id, entries, false);
                }
            }
        }
    }

    // Ids whose geometry can be read from the store. Skip-listed depictions contribute their
    // pending geometry instead.
    let mut geom_ids: Vec<i64> = rollup
        .depictions
        .iter()
        .copied()
        .filter(|id| !skip_list.contains_key(id))
        .collect();

    for id in patch::get_i64_array(subject_body, &property_path(RESERVED_GEOTAG_DEPICTIONS)) {
        if !geom_ids.contains(&id) {
            geom_ids.push(id);
        }
    }

    let overrides: Vec<Geometry<f64>> = skip_list
        .values()
        .filter_map(|p| p.geometry.clone())
        .collect();

    let subject_geom = if geom_ids.is_empty() && overrides.is_empty() {
        debug!("No geometry sources, using default geometry");
        let (pt, _) =
            load_default_geometry(opts.whosonfirst_reader.as_ref(), opts.default_geometry_id)
                .await?;
        Geometry::Point(pt)
    } else {
        let mut points = Vec::new();

        if !geom_ids.is_empty() {
            let mp = derive_points_for_ids(Arc::clone(&opts.depiction_reader), &geom_ids).await?;
            points.push(Geometry::MultiPoint(mp));
        }

        points.extend(overrides);
        Geometry::MultiPoint(derive_points_for_geometries(points).await?)
    };

    let depicted: Map<String, Value> = rollup
        .depicted
        .into_iter()
        .map(|(label, ids)| (label, json!(ids)))
        .collect();

    let mut updates = Updates::new();
    updates.insert(
        property_path(RESERVED_GEOREFERENCE_BELONGSTO),
        json!(rollup.belongs_to),
    );
    updates.insert(
        property_path(RESERVED_GEOREFERENCE_DEPICTED),
        Value::Object(depicted),
    );
    updates.insert(
        property_path(RESERVED_GEOREFERENCE_DEPICTIONS),
        json!(rollup.depictions),
    );
    updates.insert(String::from("geometry"), geometry::to_json(&subject_geom)?);

    let (changed, mut new_body) = patch::assign_properties_if_changed(subject_body, &updates)?;

    if changed {
        patch::assign(
            &mut new_body,
            &property_path(RESERVED_GEOREFERENCE_LASTMODIFIED),
            json!(crate::unix_timestamp()),
        )?;
    }

    Ok((changed, new_body))
}

pub struct RecompileSubjectsOptions {
    pub recompile: RecompileOptions,
    pub subject_reader: Arc<dyn Reader>,
    pub subject_writer_uri: String,
    pub writer_factory: Arc<dyn WriterFactory>,
}

/// Subjects to recompile: explicit ids, or every record found under a directory.
#[derive(Debug, Clone)]
pub enum SubjectSource {
    Ids(Vec<i64>),
    Directory(PathBuf),
}

/// Recompiles each subject with an empty skip list, writing only the ones that changed.
/// Returns the ids that were written.
pub async fn recompile_subjects(
    opts: &RecompileSubjectsOptions,
    source: SubjectSource,
) -> Result<Vec<i64>> {
    let writers = WriterGroup::new(
        opts.writer_factory.as_ref(),
        &CreateWritersOptions {
            depiction_writer_uri: "null://",
            subject_writer_uri: &opts.subject_writer_uri,
            provenance: None,
        },
    )?;

    let ids = match source {
        SubjectSource::Ids(ids) => ids,
        SubjectSource::Directory(root) => iterate::record_ids(&root).await?,
    };

    let skip_list = SkipList::new();
    let mut written = Vec::new();

    for id in ids {
        let subject_body = store::load_feature(opts.subject_reader.as_ref(), id).await?;
        let (changed, new_body) = recompile(&opts.recompile, &subject_body, &skip_list).await?;

        if changed {
            writers.write_subject(&new_body).await?;
            written.push(id);
        } else {
            debug!("Subject {} unchanged", id);
        }
    }

    writers.close().await?;
    info!("Recompiled subjects, {} updated", written.len());

    Ok(written)
}
