//! Relative paths for records, partitioned by id.
//!
//! `1511949289` lives at `151/194/928/9/1511949289.geojson` and its `geotag-fov` alternate
//! geometry at `151/194/928/9/1511949289-alt-geotag-fov.geojson`.

use crate::error::{GeoError, Result};

const EXTENSION: &str = ".geojson";
const ALT_MARKER: &str = "-alt-";

fn id_tree(id: i64) -> Result<String> {
    if id < 0 {
        return Err(GeoError::NotFound(id.to_string()));
    }

    let digits = id.to_string();
    let parts = digits
        .as_bytes()
        .chunks(3)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<String>>();

    Ok(parts.join("/"))
}

pub fn id_to_rel_path(id: i64) -> Result<String> {
    Ok(format!("{}/{}{}", id_tree(id)?, id, EXTENSION))
}

pub fn alt_id_to_rel_path(id: i64, alt_label: &str) -> Result<String> {
    if alt_label.is_empty() || alt_label.contains('/') {
        return Err(GeoError::InvalidAltLabel(alt_label.to_string()));
    }

    Ok(format!(
        "{}/{}{}{}{}",
        id_tree(id)?,
        id,
        ALT_MARKER,
        alt_label,
        EXTENSION
    ))
}

/// Returns true for paths (or file names) of alternate geometry records.
pub fn is_alternate_path(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.ends_with(EXTENSION) && file_name.contains(ALT_MARKER)
}

/// Derives the record id from a record's file name, e.g. `.../1511949289.geojson`.
pub fn id_from_path(path: &str) -> Option<i64> {
    let file_name = path.rsplit('/').next()?;
    let stem = file_name.strip_suffix(EXTENSION)?;
    let id_part = stem.split(ALT_MARKER).next()?;
    id_part.parse::<i64>().ok()
}
