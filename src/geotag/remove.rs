use super::{GEOTAG_LABEL, GeotagOptions, is_geotag_property, stamp};
use crate::alt;
use crate::error::Result;
use crate::geometry;
use crate::georeference::{
    PendingDepiction, SkipList, depicted_entries, load_default_geometry, recompile,
};
use crate::patch::{self, Updates};
use crate::properties;
use crate::provenance::{Action, UpdateWriterUriOptions};
use crate::store;
use crate::writers::{CreateWritersOptions, WriterGroup};
use crate::{RESERVED_GEOTAG_DEPICTIONS, RESERVED_GEOTAG_LASTMODIFIED, property_path};
use geo_types::Geometry;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Paths of every `geotag:*` property except the last-modified stamp.
fn geotag_paths(body: &Value) -> Vec<String> {
    match body.get("properties").and_then(Value::as_object) {
        Some(props) => props
            .keys()
            .filter(|k| is_geotag_property(k) && k.as_str() != RESERVED_GEOTAG_LASTMODIFIED)
            .map(|k| property_path(k))
            .collect(),
        None => Vec::new(),
    }
}

/// Strips geotagging from a depiction and from its subject, deprecating the field of view
/// geometry. Returns the subject and depiction as a FeatureCollection.
#[tracing::instrument(skip(opts))]
pub async fn remove_geotag_depiction(opts: &GeotagOptions, depiction_id: i64) -> Result<Value> {
    let writers = WriterGroup::new(
        opts.writer_factory.as_ref(),
        &CreateWritersOptions {
            depiction_writer_uri: &opts.depiction_writer_uri,
            subject_writer_uri: &opts.subject_writer_uri,
            provenance: Some(UpdateWriterUriOptions {
                id: depiction_id,
                author: opts.author.clone(),
                action: Action::Geotag,
            }),
        },
    )?;

    let depiction_body = store::load_feature(opts.depiction_reader.as_ref(), depiction_id).await?;
    let subject_id = properties::parent_id(&depiction_body)?;

    // Depiction

    let alt_labels: Vec<String> = properties::alt_geometries(&depiction_body)
        .into_iter()
        .filter(|l| l != GEOTAG_LABEL)
        .collect();

    alt::deprecate_alt(
        &writers,
        opts.depiction_reader.as_ref(),
        depiction_id,
        GEOTAG_LABEL,
    )
    .await?;

    let remaining = alt::load_alt_features(
        Arc::clone(&opts.depiction_reader),
        depiction_id,
        alt_labels.clone(),
    )
    .await?;

    let (depiction_geom, pending_geom) = if remaining.is_empty() {
        debug!("No alt geometries left, using default geometry");
        let (pt, _) =
            load_default_geometry(opts.whosonfirst_reader.as_ref(), opts.default_geometry_id)
                .await?;
        (Geometry::Point(pt), None)
    } else {
        let mp = Geometry::MultiPoint(alt::derive_multipoint(&remaining)?);
        (mp.clone(), Some(mp))
    };

    let mut updates = Updates::new();
    updates.insert(property_path("src:geom_alt"), json!(alt_labels));
    updates.insert(String::from("geometry"), geometry::to_json(&depiction_geom)?);

    let stripped = patch::remove_properties(depiction_body.clone(), &geotag_paths(&depiction_body));
    let mut new_depiction = patch::assign_properties(stripped, &updates)?;

    if new_depiction != depiction_body {
        stamp(&mut new_depiction)?;
        writers.write_depiction(&new_depiction).await?;
    } else {
        debug!("Depiction {} is unchanged", depiction_id);
    }

    // Subject

    let subject_body = store::load_feature(opts.subject_reader.as_ref(), subject_id).await?;

    let depicts: Vec<i64> =
        patch::get_i64_array(&subject_body, &property_path(RESERVED_GEOTAG_DEPICTIONS))
            .into_iter()
            .filter(|id| *id != depiction_id)
            .collect();

    let untagged = if depicts.is_empty() {
        patch::remove_properties(subject_body.clone(), &geotag_paths(&subject_body))
    } else {
        let mut body = subject_body.clone();
        patch::assign(
            &mut body,
            &property_path(RESERVED_GEOTAG_DEPICTIONS),
            json!(depicts),
        )?;
        body
    };

    let geotag_changed = untagged != subject_body;

    // The depiction write above may not be readable yet.
    let depicted = depicted_entries(&new_depiction)?;
    let mut skip_list = SkipList::new();

    if depicted.iter().any(|e| !e.ids.is_empty()) {
        skip_list.insert(
            depiction_id,
            PendingDepiction {
                depicted,
                geometry: pending_geom,
            },
        );
    }

    let (recompiled, mut new_subject) =
        recompile(&opts.recompile_options(), &untagged, &skip_list).await?;

    if geotag_changed {
        stamp(&mut new_subject)?;
    }

    if geotag_changed || recompiled {
        writers.write_subject(&new_subject).await?;
    } else {
        debug!("Subject {} is unchanged", subject_id);
    }

    writers.close().await?;

    writers.as_feature_collection(&subject_body, &depiction_body)
}
