//! Alternate geometry records: one small feature per reference label per depiction.

use crate::error::{GeoError, Result};
use crate::fanout::fan_out;
use crate::format::format_feature_without_bbox;
use crate::geometry::{self, PointSet};
use crate::store::{self, Reader};
use crate::writers::WriterGroup;
use geo_types::{Geometry, MultiPoint, Point};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PROPERTY_ALT_LABEL: &str = "src:alt_label";
pub const PROPERTY_DEPRECATED: &str = "edtf:deprecated";

/// Properties every alt record may carry. Anything else is a reference label.
const STANDARD_PROPERTIES: [&str; 5] = [
    "wof:id",
    "wof:repo",
    PROPERTY_ALT_LABEL,
    "src:geom",
    PROPERTY_DEPRECATED,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltFeature {
    pub id: i64,
    #[serde(rename = "type")]
    pub feature_type: String,
    pub properties: Map<String, Value>,
    pub geometry: geojson::Geometry,
    /// Accepted when parsing, never written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Value>,
}

impl AltFeature {
    pub fn new(id: i64, properties: Map<String, Value>, geom: &Geometry<f64>) -> Self {
        Self {
            id,
            feature_type: String::from("Feature"),
            properties,
            geometry: geojson::Geometry::from(geom),
            bbox: None,
        }
    }

    /// The alt record for one reference. `ids` are reproduced under the reference's own label.
    pub fn for_reference(
        depiction_id: i64,
        repo: &str,
        alt_label: &str,
        src_geom: &str,
        label: &str,
        ids: &[i64],
        points: Vec<Point<f64>>,
    ) -> Self {
        let mut props = Map::new();
        props.insert(String::from("wof:id"), json!(depiction_id));
        props.insert(String::from("wof:repo"), json!(repo));
        props.insert(String::from(PROPERTY_ALT_LABEL), json!(alt_label));
        props.insert(String::from("src:geom"), json!(src_geom));
        props.insert(label.to_string(), json!(ids));

        Self::new(
            depiction_id,
            props,
            &Geometry::MultiPoint(MultiPoint::new(points)),
        )
    }

    pub fn alt_label(&self) -> Option<&str> {
        self.properties.get(PROPERTY_ALT_LABEL).and_then(Value::as_str)
    }

    /// The reference label and place ids written by `for_reference`, if this is a reference alt.
    pub fn reference(&self) -> Option<(String, Vec<i64>)> {
        self.properties
            .iter()
            .filter(|(k, _)| !STANDARD_PROPERTIES.contains(&k.as_str()))
            .find_map(|(k, v)| {
                let ids = v
                    .as_array()?
                    .iter()
                    .map(Value::as_i64)
                    .collect::<Option<Vec<i64>>>()?;
                Some((k.clone(), ids))
            })
    }

    pub fn is_deprecated(&self) -> bool {
        self.properties
            .get(PROPERTY_DEPRECATED)
            .is_some_and(|v| !v.is_null())
    }

    /// Stamps `edtf:deprecated` and swaps the geometry for a point at 0,0. Everything else,
    /// the alt label included, is kept.
    pub fn deprecate(mut self, date: &str) -> Self {
        self.properties
            .insert(String::from(PROPERTY_DEPRECATED), json!(date));
        self.geometry = geojson::Geometry::from(&Geometry::Point(geometry::null_island()));
        self.bbox = None;
        self
    }

    pub fn geo_geometry(&self) -> Result<Geometry<f64>> {
        Geometry::<f64>::try_from(self.geometry.clone()).map_err(|e| GeoError::InvalidGeometry {
            path: format!("{}-alt-{}", self.id, self.alt_label().unwrap_or("?")),
            reason: e.to_string(),
        })
    }
}

pub fn format(f: &AltFeature) -> Result<Vec<u8>> {
    let mut value = serde_json::to_value(f).map_err(GeoError::Encode)?;

    if let Some(obj) = value.as_object_mut() {
        obj.remove("bbox");
    }

    format_feature_without_bbox(&value)
}

pub fn parse(body: &[u8]) -> Result<AltFeature> {
    serde_json::from_slice(body).map_err(|e| GeoError::decode("alt feature", e))
}

/// Points and MultiPoints contribute their points as-is, anything else its planar centroid.
pub fn derive_multipoint(features: &[AltFeature]) -> Result<MultiPoint<f64>> {
    let mut points = PointSet::new();

    for f in features {
        let geom = f.geo_geometry()?;
        let label = f.alt_label().unwrap_or_default();
        points.extend(geometry::representative_points(label, &geom)?);
    }

    Ok(points.into_multipoint())
}

/// Today's date in the form used by `edtf:deprecated`.
pub fn deprecation_date() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// An existing alt file to fold into a depiction's geometry. Missing and deprecated files are
/// skipped.
async fn load_live_alt(
    reader: Arc<dyn Reader>,
    depiction_id: i64,
    alt_label: String,
) -> Result<Option<AltFeature>> {
    let body = match store::load_alt_bytes(reader.as_ref(), depiction_id, &alt_label).await {
        Ok(body) => body,
        Err(GeoError::NotFound(path)) => {
            warn!("{} lists alt geometry '{}' but {} does not exist", depiction_id, alt_label, path);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let feature = parse(&body)?;

    if feature.is_deprecated() {
        warn!("{} lists deprecated alt geometry '{}'", depiction_id, alt_label);
        return Ok(None);
    }

    Ok(Some(feature))
}

/// Loads the named alt files concurrently, keeping label order.
pub async fn load_alt_features(
    reader: Arc<dyn Reader>,
    depiction_id: i64,
    alt_labels: Vec<String>,
) -> Result<Vec<AltFeature>> {
    let loaded = fan_out(alt_labels, |label| {
        load_live_alt(Arc::clone(&reader), depiction_id, label)
    })
    .await?;

    Ok(loaded.into_iter().flatten().collect())
}

/// Writes `feature` unless the stored alt file already has exactly the same bytes. Returns true
/// if it was written.
pub async fn write_if_changed(
    writers: &WriterGroup,
    reader: &dyn Reader,
    depiction_id: i64,
    alt_label: &str,
    feature: &AltFeature,
) -> Result<bool> {
    let body = format(feature)?;

    match store::load_alt_bytes(reader, depiction_id, alt_label).await {
        Ok(existing) if existing.as_ref() == body.as_slice() => {
            debug!("Alt geometry '{}' for {} is unchanged", alt_label, depiction_id);
            return Ok(false);
        }
        Ok(_) | Err(GeoError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    writers.write_alt(depiction_id, alt_label, body).await?;
    Ok(true)
}

/// Alt files are never deleted, only deprecated. Returns true if a deprecated body was written.
pub async fn deprecate_alt(
    writers: &WriterGroup,
    reader: &dyn Reader,
    depiction_id: i64,
    alt_label: &str,
) -> Result<bool> {
    let body = match store::load_alt_bytes(reader, depiction_id, alt_label).await {
        Ok(body) => body,
        Err(GeoError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    let existing = parse(&body)?;

    if existing.is_deprecated() {
        debug!("Alt geometry '{}' is already deprecated", alt_label);
        return Ok(false);
    }

    let deprecated = existing.deprecate(&deprecation_date());
    info!("Deprecate alt geometry '{}' for {}", alt_label, depiction_id);

    writers
        .write_alt(depiction_id, alt_label, format(&deprecated)?)
        .await?;

    Ok(true)
}
