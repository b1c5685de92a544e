//! Canonical on-disk encoding of records.
//!
//! Top-level keys come out as `id, type, properties, bbox, geometry` followed by anything else,
//! properties are sorted by key and `bbox` is recomputed from the geometry.

use crate::error::{GeoError, Result};
use crate::geometry;
use geo::BoundingRect;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct OrderedFeature<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Value>,
    #[serde(rename = "type")]
    feature_type: &'a str,
    properties: BTreeMap<&'a str, &'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometry: Option<&'a Value>,
    #[serde(flatten)]
    rest: BTreeMap<&'a str, &'a Value>,
}

pub fn compute_bbox(geometry_value: &Value) -> Option<[f64; 4]> {
    let geom = geometry::from_json("bbox", geometry_value).ok()?;
    let rect = geom.bounding_rect()?;

    Some([rect.min().x, rect.min().y, rect.max().x, rect.max().y])
}

pub fn format_feature(body: &Value) -> Result<Vec<u8>> {
    encode(body, true)
}

/// Same as `format_feature` but never writes a `bbox`.
pub fn format_feature_without_bbox(body: &Value) -> Result<Vec<u8>> {
    encode(body, false)
}

fn encode(body: &Value, with_bbox: bool) -> Result<Vec<u8>> {
    let obj = body.as_object().ok_or_else(|| GeoError::InvalidGeometry {
        path: String::from("feature"),
        reason: String::from("record is not a JSON object"),
    })?;

    let properties = match obj.get("properties").and_then(Value::as_object) {
        Some(props) => props.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        None => BTreeMap::new(),
    };

    let geometry = obj.get("geometry").filter(|g| !g.is_null());

    let rest = obj
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "id" | "type" | "properties" | "bbox" | "geometry"))
        .map(|(k, v)| (k.as_str(), v))
        .collect();

    let ordered = OrderedFeature {
        id: obj.get("id"),
        feature_type: "Feature",
        properties,
        bbox: geometry.filter(|_| with_bbox).and_then(compute_bbox),
        geometry,
        rest,
    };

    let mut out = serde_json::to_vec_pretty(&ordered).map_err(GeoError::Encode)?;
    out.push(b'\n');
    Ok(out)
}
