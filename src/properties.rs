//! Typed accessors for the handful of record properties this crate reads.

use crate::error::{GeoError, Result};
use crate::geometry;
use crate::hierarchy::Hierarchy;
use crate::patch;
use geo_types::{Geometry, Point};
use serde_json::Value;

pub fn id(body: &Value) -> Result<i64> {
    patch::get_i64(body, "properties.wof:id")
        .or_else(|| patch::get_i64(body, "id"))
        .ok_or_else(|| GeoError::missing_property("record", "wof:id"))
}

pub fn parent_id(body: &Value) -> Result<i64> {
    patch::get_i64(body, "properties.wof:parent_id")
        .ok_or_else(|| GeoError::missing_property(label(body), "wof:parent_id"))
}

pub fn repo(body: &Value) -> Result<String> {
    patch::get_str(body, "properties.wof:repo")
        .map(String::from)
        .ok_or_else(|| GeoError::missing_property(label(body), "wof:repo"))
}

/// Every placetype -> id mapping in `wof:hierarchy`. Malformed entries are dropped.
pub fn hierarchies(body: &Value) -> Vec<Hierarchy> {
    let entries = match patch::get(body, "properties.wof:hierarchy").and_then(Value::as_array) {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_i64().map(|id| (k.clone(), id)))
                .collect::<Hierarchy>()
        })
        .collect()
}

pub fn alt_geometries(body: &Value) -> Vec<String> {
    match patch::get(body, "properties.src:geom_alt").and_then(Value::as_array) {
        Some(labels) => labels
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        None => Vec::new(),
    }
}

pub fn geometry(body: &Value) -> Result<Geometry<f64>> {
    let value = body
        .get("geometry")
        .filter(|g| !g.is_null())
        .ok_or_else(|| GeoError::missing_property(label(body), "geometry"))?;

    geometry::from_json(&label(body), value)
}

fn lat_lon(body: &Value, prefix: &str) -> Option<Point<f64>> {
    let lat = patch::get_f64(body, &format!("properties.{}:latitude", prefix))?;
    let lon = patch::get_f64(body, &format!("properties.{}:longitude", prefix))?;
    Some(Point::new(lon, lat))
}

/// The first `{prefix}:latitude` / `{prefix}:longitude` pair present, in prefix order.
pub fn override_point(body: &Value, prefixes: &[&str]) -> Option<Point<f64>> {
    prefixes.iter().find_map(|prefix| lat_lon(body, prefix))
}

/// Label centroid, then math centroid, then the planar centroid of the geometry.
pub fn centroid(body: &Value) -> Result<Point<f64>> {
    if let Some(pt) = override_point(body, &["lbl", "geom"]) {
        return Ok(pt);
    }

    geometry::planar_centroid(&label(body), &geometry(body)?)
}

fn label(body: &Value) -> String {
    match id(body) {
        Ok(id) => id.to_string(),
        Err(_) => String::from("record"),
    }
}
