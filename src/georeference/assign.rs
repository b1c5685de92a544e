//! Assigning labelled place references to a depiction.
//!
//! Given a depiction and its new reference set this
//!
//! * writes one alternate geometry file per reference, deprecating the ones being removed
//! * updates the depiction's geometry, alt list, hierarchies and `georef:` properties
//! * recompiles the depiction's subject from all of the subject's depictions
//!
//! and returns the updated subject and depiction as a FeatureCollection.

use super::subject::{PendingDepiction, RecompileOptions, SkipList, recompile};
use super::{DepictedEntry, GEOREF_ALT_PREFIX, Reference, load_default_geometry, source_geom};
use crate::alt::{self, AltFeature};
use crate::error::{GeoError, Result};
use crate::fanout::fan_out;
use crate::geometry;
use crate::hierarchy::{Hierarchy, HierarchySet};
use crate::patch::{self, Updates};
use crate::properties;
use crate::provenance::{Action, UpdateWriterUriOptions};
use crate::store::{self, Reader, WriterFactory};
use crate::writers::{CreateWritersOptions, WriterGroup};
use crate::{
    RESERVED_GEOREFERENCE_BELONGSTO, RESERVED_GEOREFERENCE_DEPICTED,
    RESERVED_GEOREFERENCE_LASTMODIFIED, property_path,
};
use geo_types::Geometry;
use itertools::Itertools;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AssignReferencesOptions {
    pub depiction_reader: Arc<dyn Reader>,
    pub subject_reader: Arc<dyn Reader>,
    /// Reader for the places being referenced and for the default geometry record.
    pub whosonfirst_reader: Arc<dyn Reader>,
    pub depiction_writer_uri: String,
    pub subject_writer_uri: String,
    pub writer_factory: Arc<dyn WriterFactory>,
    /// Used in commit messages and pull request branches for GitHub writers.
    pub author: String,
    /// Appended to `sfomuseum#georeference` in `src:geom`.
    pub source_geom_suffix: Option<String>,
    pub default_geometry_id: Option<i64>,
}

impl AssignReferencesOptions {
    pub fn recompile_options(&self) -> RecompileOptions {
        RecompileOptions {
            depiction_reader: Arc::clone(&self.depiction_reader),
            whosonfirst_reader: Arc::clone(&self.whosonfirst_reader),
            default_geometry_id: self.default_geometry_id,
        }
    }
}

struct ReferenceContext {
    reader: Arc<dyn Reader>,
    depiction_id: i64,
    repo: String,
    src_geom: String,
}

/// Loads every place in `r`, in order. Repeated ids repeat their point.
async fn resolve_reference(
    ctx: Arc<ReferenceContext>,
    r: Reference,
) -> Result<(AltFeature, Vec<Hierarchy>)> {
    let mut points = Vec::with_capacity(r.ids.len());
    let mut hierarchies = Vec::new();

    for id in &r.ids {
        let body = store::load_feature(ctx.reader.as_ref(), *id).await?;
        hierarchies.extend(properties::hierarchies(&body));
        points.push(properties::centroid(&body)?);
    }

    let feature = AltFeature::for_reference(
        ctx.depiction_id,
        &ctx.repo,
        &r.alt_label,
        &ctx.src_geom,
        &r.label,
        &r.ids,
        points,
    );

    Ok((feature, hierarchies))
}

/// Hierarchies of a place some other label still points at. A place that has since gone
/// missing contributes nothing.
async fn place_hierarchies(reader: Arc<dyn Reader>, id: i64) -> Result<Vec<Hierarchy>> {
    match store::load_feature(reader.as_ref(), id).await {
        Ok(body) => Ok(properties::hierarchies(&body)),
        Err(GeoError::NotFound(path)) => {
            warn!("Place {} ({}) no longer exists", id, path);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[tracing::instrument(skip(opts, refs), fields(references = refs.len()))]
pub async fn assign_references(
    opts: &AssignReferencesOptions,
    depiction_id: i64,
    refs: &[Reference],
) -> Result<Value> {
    let refs = super::validate_references(refs)?;
    let src_geom = source_geom(opts.source_geom_suffix.as_deref());

    let writers = WriterGroup::new(
        opts.writer_factory.as_ref(),
        &CreateWritersOptions {
            depiction_writer_uri: &opts.depiction_writer_uri,
            subject_writer_uri: &opts.subject_writer_uri,
            provenance: Some(UpdateWriterUriOptions {
                id: depiction_id,
                author: opts.author.clone(),
                action: Action::Georeference,
            }),
        },
    )?;

    let depiction_body = store::load_feature(opts.depiction_reader.as_ref(), depiction_id).await?;
    let repo = properties::repo(&depiction_body)?;
    let subject_id = properties::parent_id(&depiction_body)?;

    debug!("Depiction {} belongs to subject {}", depiction_id, subject_id);

    // New alt features, one per reference with ids

    let ctx = Arc::new(ReferenceContext {
        reader: Arc::clone(&opts.whosonfirst_reader),
        depiction_id,
        repo,
        src_geom: src_geom.clone(),
    });

    let to_assign: Vec<Reference> = refs.iter().filter(|r| !r.is_removal()).cloned().collect();

    let resolved = fan_out(to_assign.clone(), |r| resolve_reference(Arc::clone(&ctx), r)).await?;

    let mut hierarchies = HierarchySet::new();
    let mut new_features = Vec::with_capacity(resolved.len());

    for (feature, hiers) in resolved {
        hierarchies.extend(hiers)?;
        new_features.push(feature);
    }

    // Existing alt files that are neither replaced nor removed

    let new_labels: Vec<&str> = to_assign.iter().map(|r| r.alt_label.as_str()).collect();
    let existing_labels = properties::alt_geometries(&depiction_body);

    let mut to_remove: Vec<String> = refs
        .iter()
        .filter(|r| r.is_removal())
        .map(|r| r.alt_label.clone())
        .collect();

    if refs.is_empty() {
        for label in &existing_labels {
            if label.starts_with(GEOREF_ALT_PREFIX) && !to_remove.contains(label) {
                to_remove.push(label.clone());
            }
        }
    }

    let to_fetch: Vec<String> = existing_labels
        .iter()
        .filter(|l| !new_labels.contains(&l.as_str()) && !to_remove.contains(l))
        .cloned()
        .collect();

    let other_features =
        alt::load_alt_features(Arc::clone(&opts.depiction_reader), depiction_id, to_fetch).await?;

    // Labels left out of this call still count, rebuilt from their alt files.
    let kept: Vec<DepictedEntry> = other_features
        .iter()
        .filter_map(AltFeature::reference)
        .filter(|(label, ids)| !ids.is_empty() && !refs.iter().any(|r| &r.label == label))
        .map(|(label, ids)| DepictedEntry { label, ids })
        .collect();

    let kept_ids: Vec<i64> = kept
        .iter()
        .flat_map(|e| e.ids.iter().copied())
        .unique()
        .collect();

    let place_reader = Arc::clone(&opts.whosonfirst_reader);
    let kept_hierarchies = fan_out(kept_ids, |id| {
        place_hierarchies(Arc::clone(&place_reader), id)
    })
    .await?;

    for hiers in kept_hierarchies {
        hierarchies.extend(hiers)?;
    }

    // Depiction geometry

    let mut alt_features = new_features.clone();
    alt_features.extend(other_features);

    let alt_geoms: Vec<String> = alt_features
        .iter()
        .filter_map(|f| f.alt_label().map(String::from))
        .collect();

    let (depiction_geom, pending_geom) = if alt_features.is_empty() {
        debug!("No alt geometries, using default geometry");

        let (pt, default_hiers) =
            load_default_geometry(opts.whosonfirst_reader.as_ref(), opts.default_geometry_id)
                .await?;
        hierarchies.extend(default_hiers)?;

        (Geometry::Point(pt), None)
    } else {
        let mp = Geometry::MultiPoint(alt::derive_multipoint(&alt_features)?);
        (mp.clone(), Some(mp))
    };

    // Alt files

    for (r, feature) in to_assign.iter().zip(new_features.iter()) {
        alt::write_if_changed(
            &writers,
            opts.depiction_reader.as_ref(),
            depiction_id,
            &r.alt_label,
            feature,
        )
        .await?;
    }

    for label in &to_remove {
        alt::deprecate_alt(&writers, opts.depiction_reader.as_ref(), depiction_id, label).await?;
    }

    // Depiction record

    let depicted: Vec<DepictedEntry> = to_assign
        .iter()
        .map(|r| DepictedEntry {
            label: r.label.clone(),
            ids: r.ids.clone(),
        })
        .chain(kept)
        .collect();

    let belongs_to: Vec<i64> = depicted
        .iter()
        .flat_map(|e| e.ids.iter().copied())
        .unique()
        .collect();

    let mut updates = Updates::new();
    updates.insert(property_path("src:geom"), json!(src_geom));
    updates.insert(property_path("src:geom_alt"), json!(alt_geoms));
    updates.insert(property_path("wof:hierarchy"), json!(hierarchies.as_slice()));
    updates.insert(
        property_path(RESERVED_GEOREFERENCE_BELONGSTO),
        json!(belongs_to),
    );
    updates.insert(
        property_path(RESERVED_GEOREFERENCE_DEPICTED),
        serde_json::to_value(&depicted).map_err(GeoError::Encode)?,
    );
    updates.insert(String::from("geometry"), geometry::to_json(&depiction_geom)?);

    let (depiction_changed, mut new_depiction) =
        patch::assign_properties_if_changed(&depiction_body, &updates)?;

    if depiction_changed {
        patch::assign(
            &mut new_depiction,
            &property_path(RESERVED_GEOREFERENCE_LASTMODIFIED),
            json!(crate::unix_timestamp()),
        )?;
        writers.write_depiction(&new_depiction).await?;
    } else {
        debug!("Depiction {} is unchanged", depiction_id);
    }

    // Subject record

    let subject_body = store::load_feature(opts.subject_reader.as_ref(), subject_id).await?;

    let mut skip_list = SkipList::new();
    skip_list.insert(
        depiction_id,
        PendingDepiction {
            depicted,
            geometry: pending_geom,
        },
    );

    let (subject_changed, new_subject) =
        recompile(&opts.recompile_options(), &subject_body, &skip_list).await?;

    if subject_changed {
        writers.write_subject(&new_subject).await?;
    } else {
        debug!("Subject {} is unchanged", subject_id);
    }

    writers.close().await?;

    writers.as_feature_collection(&subject_body, &depiction_body)
}
