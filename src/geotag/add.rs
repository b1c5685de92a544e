use super::feature::{GeotagFeature, ParentPointer};
use super::{
    GEOTAG_CAMERA, GEOTAG_LABEL, GEOTAG_SRC_GEOM, GEOTAG_SUBJECT_SRC_GEOM, GEOTAG_TARGET,
    GeotagOptions, stamp,
};
use crate::alt::{self, AltFeature, PROPERTY_ALT_LABEL};
use crate::error::{GeoError, Result};
use crate::fanout::fan_out;
use crate::geometry;
use crate::georeference::{SkipList, recompile};
use crate::hierarchy::Hierarchy;
use crate::patch::{self, Updates};
use crate::properties;
use crate::provenance::{Action, UpdateWriterUriOptions};
use crate::store::{self, Reader};
use crate::writers::{CreateWritersOptions, WriterGroup};
use crate::{RESERVED_GEOTAG_BELONGSTO, RESERVED_GEOTAG_DEPICTIONS, property_path};
use geo_types::Geometry;
use itertools::Itertools;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

/// Subject properties copied from the camera and target places, target last.
const COPIED_PLACE_PROPERTIES: [&str; 2] = ["iso:country", "wof:country"];

async fn load_parent(reader: &dyn Reader, pointer: &ParentPointer) -> Result<Option<Value>> {
    match pointer.id() {
        Some(id) => Ok(Some(store::load_feature(reader, id).await?)),
        None => Ok(None),
    }
}

/// The place's own hierarchies, or the ones carried on the pointer when there is no place.
fn parent_hierarchies(pointer: &ParentPointer, parent: Option<&Value>) -> Vec<Hierarchy> {
    match parent {
        Some(body) => properties::hierarchies(body),
        None => pointer.hierarchy.clone(),
    }
}

async fn load_depiction(reader: Arc<dyn Reader>, id: i64) -> Result<Value> {
    store::load_feature(reader.as_ref(), id).await
}

fn push_unique(ids: &mut Vec<i64>, id: i64) {
    if id > 0 && !ids.contains(&id) {
        ids.push(id);
    }
}

/// Records a camera position and field of view on a depiction, writes the `geotag-fov` alt
/// geometry and rolls the geotagging up into the depiction's subject. Returns the subject,
/// the depiction and the field of view feature as a FeatureCollection.
#[tracing::instrument(skip(opts, feature))]
pub async fn add_geotag_depiction(
    opts: &GeotagOptions,
    depiction_id: i64,
    feature: &GeotagFeature,
) -> Result<Value> {
    let camera = feature.point_of_view()?;
    let target = feature.target()?;
    let fov = feature.field_of_view()?;
    let props = &feature.properties;

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
    let repo = properties::repo(&depiction_body)?;

    let camera_parent = load_parent(opts.whosonfirst_reader.as_ref(), &props.camera).await?;
    let target_parent = load_parent(opts.whosonfirst_reader.as_ref(), &props.target).await?;

    let hierarchies = parent_hierarchies(&props.camera, camera_parent.as_ref())
        .into_iter()
        .chain(parent_hierarchies(&props.target, target_parent.as_ref()));

    let belongs_to: Vec<i64> = props
        .camera
        .id()
        .into_iter()
        .chain(props.target.id())
        .chain(hierarchies.flat_map(|h| h.into_values()))
        .filter(|id| *id > 0)
        .unique()
        .collect();

    // Depiction

    let mut alt_labels = vec![GEOTAG_LABEL.to_string()];
    alt_labels.extend(
        properties::alt_geometries(&depiction_body)
            .into_iter()
            .filter(|l| l != GEOTAG_LABEL),
    );

    let mut updates = Updates::new();
    updates.insert(String::from("geometry"), geometry::point_to_json(camera)?);
    updates.insert(property_path("src:geom"), json!(GEOTAG_SRC_GEOM));
    updates.insert(property_path("src:geom_alt"), json!(alt_labels));
    updates.insert(property_path("geotag:angle"), json!(props.angle));
    updates.insert(property_path("geotag:bearing"), json!(props.bearing));
    updates.insert(property_path("geotag:distance"), json!(props.distance));
    updates.insert(property_path("geotag:camera_latitude"), json!(camera.y()));
    updates.insert(property_path("geotag:camera_longitude"), json!(camera.x()));
    updates.insert(property_path("geotag:target_latitude"), json!(target.y()));
    updates.insert(property_path("geotag:target_longitude"), json!(target.x()));
    // Wins over the geometry when the subject's points are derived.
    updates.insert(property_path("geotag:latitude"), json!(camera.y()));
    updates.insert(property_path("geotag:longitude"), json!(camera.x()));
    updates.insert(property_path(GEOTAG_CAMERA), json!(props.camera.parent_id));
    updates.insert(property_path(GEOTAG_TARGET), json!(props.target.parent_id));
    updates.insert(property_path(RESERVED_GEOTAG_BELONGSTO), json!(belongs_to));
    updates.insert(property_path("geotag:subject"), json!(subject_id));

    let (depiction_changed, mut new_depiction) =
        patch::assign_properties_if_changed(&depiction_body, &updates)?;

    if depiction_changed {
        stamp(&mut new_depiction)?;
        writers.write_depiction(&new_depiction).await?;
    } else {
        debug!("Depiction {} is unchanged", depiction_id);
    }

    let mut alt_props = Map::new();
    alt_props.insert(String::from("wof:id"), json!(depiction_id));
    alt_props.insert(String::from("wof:repo"), json!(repo));
    alt_props.insert(String::from(PROPERTY_ALT_LABEL), json!(GEOTAG_LABEL));
    alt_props.insert(String::from("src:geom"), json!(GEOTAG_SRC_GEOM));

    let alt_feature = AltFeature::new(depiction_id, alt_props, &Geometry::Polygon(fov));

    alt::write_if_changed(
        &writers,
        opts.depiction_reader.as_ref(),
        depiction_id,
        GEOTAG_LABEL,
        &alt_feature,
    )
    .await?;

    // Subject

    let subject_body = store::load_feature(opts.subject_reader.as_ref(), subject_id).await?;

    let mut depicts =
        patch::get_i64_array(&subject_body, &property_path(RESERVED_GEOTAG_DEPICTIONS));

    if !depicts.contains(&depiction_id) {
        depicts.push(depiction_id);
    }

    let others: Vec<i64> = depicts
        .iter()
        .copied()
        .filter(|id| *id != depiction_id)
        .collect();

    debug!("Merge geotagging from {} other depictions", others.len());

    let reader = Arc::clone(&opts.depiction_reader);
    let other_bodies = fan_out(others, |id| load_depiction(Arc::clone(&reader), id)).await?;

    let mut subject_belongs_to = belongs_to.clone();
    let mut cameras: Vec<i64> = props.camera.id().into_iter().collect();
    let mut targets: Vec<i64> = props.target.id().into_iter().collect();

    for other in &other_bodies {
        for id in patch::get_i64_array(other, &property_path(RESERVED_GEOTAG_BELONGSTO)) {
            push_unique(&mut subject_belongs_to, id);
        }

        if let Some(id) = patch::get_i64(other, &property_path(GEOTAG_CAMERA)) {
            push_unique(&mut cameras, id);
        }

        if let Some(id) = patch::get_i64(other, &property_path(GEOTAG_TARGET)) {
            push_unique(&mut targets, id);
        }
    }

    let mut subject_updates = Updates::new();
    subject_updates.insert(property_path("src:geom"), json!(GEOTAG_SUBJECT_SRC_GEOM));
    subject_updates.insert(property_path(RESERVED_GEOTAG_DEPICTIONS), json!(depicts));
    subject_updates.insert(
        property_path(RESERVED_GEOTAG_BELONGSTO),
        json!(subject_belongs_to),
    );

    if !cameras.is_empty() {
        subject_updates.insert(property_path(GEOTAG_CAMERA), json!(cameras));
    }

    if !targets.is_empty() {
        subject_updates.insert(property_path(GEOTAG_TARGET), json!(targets));
    }

    for parent in [camera_parent.as_ref(), target_parent.as_ref()]
        .into_iter()
        .flatten()
    {
        for key in COPIED_PLACE_PROPERTIES {
            if let Some(value) = patch::get(parent, &property_path(key)) {
                subject_updates.insert(property_path(key), value.clone());
            }
        }
    }

    let (geotag_changed, tagged) =
        patch::assign_properties_if_changed(&subject_body, &subject_updates)?;

    // Reads the depiction written above for the subject's points.
    let (recompiled, mut new_subject) =
        recompile(&opts.recompile_options(), &tagged, &SkipList::new()).await?;

    if geotag_changed {
        stamp(&mut new_subject)?;
    }

    if geotag_changed || recompiled {
        writers.write_subject(&new_subject).await?;
    } else {
        debug!("Subject {} is unchanged", subject_id);
    }

    writers.close().await?;

    let mut bundle = writers.as_feature_collection(&subject_body, &depiction_body)?;
    let alt_value = serde_json::to_value(&alt_feature).map_err(GeoError::Encode)?;

    if let Some(features) = bundle.get_mut("features").and_then(Value::as_array_mut) {
        features.push(alt_value);
    }

    Ok(bundle)
}
