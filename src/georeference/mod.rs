//! Labelled place references attached to depictions, and everything derived from them.

use crate::error::{GeoError, Result};
use crate::hierarchy::Hierarchy;
use crate::patch;
use crate::properties;
use crate::store::{self, Reader};
use crate::{
    RESERVED_GEOREFERENCE_BELONGSTO, RESERVED_GEOREFERENCE_DEPICTED,
    RESERVED_GEOREFERENCE_DEPICTIONS, RESERVED_GEOREFERENCE_LABEL, RESERVED_GEOTAG_DEPICTIONS,
    RESERVED_WOF_DEPICTS, property_path,
};
use ahash::AHashSet;
use geo_types::Point;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

pub mod assign;
pub mod flightcover;
pub mod subject;

#[cfg(test)]
mod test_assign;

pub use assign::{AssignReferencesOptions, assign_references};
pub use flightcover::{FlightCoverReferences, assign_flight_cover_references};
pub use subject::{
    PendingDepiction, RecompileOptions, RecompileSubjectsOptions, SkipList, SubjectSource, recompile,
    recompile_subjects,
};

pub const GEOREF_ALT_PREFIX: &str = "georef_";
pub const DEFAULT_SRC_GEOM: &str = "sfomuseum#georeference";

lazy_static! {
    static ref RE_NOT_ALPHANUMERIC: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

const RESERVED_LABELS: [&str; 6] = [
    RESERVED_GEOTAG_DEPICTIONS,
    RESERVED_GEOREFERENCE_DEPICTIONS,
    RESERVED_GEOREFERENCE_DEPICTED,
    RESERVED_GEOREFERENCE_BELONGSTO,
    RESERVED_GEOREFERENCE_LABEL,
    RESERVED_WOF_DEPICTS,
];

/// Labels that would collide with the properties references are rolled up into.
pub fn is_reserved_label(label: &str) -> bool {
    RESERVED_LABELS.contains(&label)
}

/// One class of place pointer on a depiction. Empty `ids` removes the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub ids: Vec<i64>,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alt_label: String,
}

impl Reference {
    pub fn new(label: impl Into<String>, ids: Vec<i64>) -> Self {
        Self {
            ids,
            label: label.into(),
            alt_label: String::new(),
        }
    }

    pub fn with_alt_label(mut self, alt_label: impl Into<String>) -> Self {
        self.alt_label = alt_label.into();
        self
    }

    pub fn is_removal(&self) -> bool {
        self.ids.is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.ids.iter().map(|id| id.to_string()).collect();
        write!(f, "{}={}", self.label, ids.join(","))
    }
}

/// An entry in a depiction's `georef:depicted` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepictedEntry {
    #[serde(rename = "georef:label")]
    pub label: String,
    #[serde(rename = "wof:depicts", default)]
    pub ids: Vec<i64>,
}

/// A depiction's `georef:depicted` list. Absent or null is empty.
pub fn depicted_entries(body: &Value) -> Result<Vec<DepictedEntry>> {
    match patch::get(body, &property_path(RESERVED_GEOREFERENCE_DEPICTED)) {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())
            .map_err(|e| GeoError::decode(RESERVED_GEOREFERENCE_DEPICTED, e)),
        _ => Ok(Vec::new()),
    }
}

pub fn derive_alt_label_from_string(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let collapsed = RE_NOT_ALPHANUMERIC.replace_all(&lower, "_");

    if collapsed.starts_with(GEOREF_ALT_PREFIX) {
        collapsed.into_owned()
    } else {
        format!("{}{}", GEOREF_ALT_PREFIX, collapsed)
    }
}

/// An explicit alt label wins, otherwise one is derived from the label.
pub fn derive_alt_label(r: &Reference) -> String {
    if !r.alt_label.is_empty() {
        return r.alt_label.clone();
    }

    let alt_label = derive_alt_label_from_string(&r.label);
    debug!("Derived alt label '{}' from '{}'", alt_label, r.label);
    alt_label
}

/// Checks labels and fills in alt labels. Never touches a store.
pub fn validate_references(refs: &[Reference]) -> Result<Vec<Reference>> {
    let mut labels = AHashSet::new();
    let mut alt_labels = AHashSet::new();
    let mut validated = Vec::with_capacity(refs.len());

    for r in refs {
        if r.label.trim().is_empty() {
            return Err(GeoError::MissingLabel);
        }

        if is_reserved_label(&r.label) {
            return Err(GeoError::ReservedLabel(r.label.clone()));
        }

        if !labels.insert(r.label.clone()) {
            return Err(GeoError::DuplicateLabel(r.label.clone()));
        }

        let alt_label = derive_alt_label(r);

        if alt_label.is_empty() || alt_label.contains('/') {
            return Err(GeoError::InvalidAltLabel(r.label.clone()));
        }

        if !alt_labels.insert(alt_label.clone()) {
            return Err(GeoError::DuplicateLabel(alt_label));
        }

        validated.push(Reference {
            ids: r.ids.clone(),
            label: r.label.clone(),
            alt_label,
        });
    }

    Ok(validated)
}

/// Parses `label=id,id,...`. An empty right hand side is a removal.
pub fn parse_reference(raw: &str) -> Result<Reference> {
    let (label, ids) = raw
        .split_once('=')
        .ok_or_else(|| GeoError::InvalidReference(raw.to_string()))?;

    let label = label.trim();

    if label.is_empty() {
        return Err(GeoError::MissingLabel);
    }

    if is_reserved_label(label) {
        return Err(GeoError::ReservedLabel(label.to_string()));
    }

    let ids = ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|source| GeoError::InvalidId {
                value: s.to_string(),
                source,
            })
        })
        .collect::<Result<Vec<i64>>>()?;

    Ok(Reference::new(label, ids))
}

pub fn parse_references_json(body: &[u8]) -> Result<Vec<Reference>> {
    serde_json::from_slice(body).map_err(|e| GeoError::decode("references", e))
}

/// `src:geom` for records touched by georeferencing.
pub fn source_geom(suffix: Option<&str>) -> String {
    match suffix {
        Some(s) if !s.is_empty() => format!("{}-{}", DEFAULT_SRC_GEOM, s),
        _ => DEFAULT_SRC_GEOM.to_string(),
    }
}

/// The fallback geometry record: its centroid and its hierarchies.
pub async fn load_default_geometry(
    reader: &dyn Reader,
    default_geometry_id: Option<i64>,
) -> Result<(Point<f64>, Vec<Hierarchy>)> {
    let id = default_geometry_id.ok_or(GeoError::MissingDefaultGeometry)?;
    let body = store::load_feature(reader, id).await?;

    Ok((properties::centroid(&body)?, properties::hierarchies(&body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_alt_label() {
        assert_eq!(
            derive_alt_label(&Reference::new("Hello world, Bob", vec![1])),
            "georef_hello_world_bob"
        );
        assert_eq!(
            derive_alt_label(&Reference::new("This is a-test", vec![1])),
            "georef_this_is_a_test"
        );
        assert_eq!(
            derive_alt_label_from_string("a___b"),
            derive_alt_label_from_string("a_b")
        );
        assert_eq!(
            derive_alt_label_from_string("georef_arrival"),
            "georef_arrival"
        );
        assert_eq!(
            derive_alt_label(&Reference::new("x", vec![]).with_alt_label("flightcover-address-from")),
            "flightcover-address-from"
        );
    }

    #[test]
    fn test_alt_label_is_stable() {
        let r = Reference::new("sfomuseum:flightcover_address_from", vec![1]);
        assert_eq!(derive_alt_label(&r), derive_alt_label(&r));
        assert_eq!(derive_alt_label(&r), "georef_sfomuseum_flightcover_address_from");
    }

    #[test]
    fn test_validate_duplicate_label() {
        let refs = vec![
            Reference::new("arrival", vec![1]),
            Reference::new("arrival", vec![2]),
        ];

        assert!(matches!(
            validate_references(&refs),
            Err(GeoError::DuplicateLabel(l)) if l == "arrival"
        ));
    }

    #[test]
    fn test_validate_colliding_alt_labels() {
        let refs = vec![
            Reference::new("Arrival", vec![1]),
            Reference::new("ARRIVAL", vec![2]),
        ];

        assert!(matches!(
            validate_references(&refs),
            Err(GeoError::DuplicateLabel(l)) if l == "georef_arrival"
        ));
    }

    #[test]
    fn test_validate_missing_and_reserved() {
        assert!(matches!(
            validate_references(&[Reference::new(" ", vec![1])]),
            Err(GeoError::MissingLabel)
        ));
        assert!(matches!(
            validate_references(&[Reference::new("georef:depicted", vec![1])]),
            Err(GeoError::ReservedLabel(_))
        ));

        let ok = validate_references(&[Reference::new("arrival", vec![])]).unwrap();
        assert_eq!(ok[0].alt_label, "georef_arrival");
        assert!(ok[0].is_removal());
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            parse_reference("arrival=1001, 1002").unwrap(),
            Reference::new("arrival", vec![1001, 1002])
        );
        assert!(parse_reference("arrival=").unwrap().is_removal());
        assert!(matches!(
            parse_reference("arrival"),
            Err(GeoError::InvalidReference(_))
        ));
        assert!(matches!(
            parse_reference("geotag:depicts=1"),
            Err(GeoError::ReservedLabel(_))
        ));
        assert!(matches!(
            parse_reference("arrival=abc"),
            Err(GeoError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_reserved_labels_agree() {
        for label in RESERVED_LABELS {
            assert!(is_reserved_label(label));
            assert!(matches!(
                parse_reference(&format!("{}=1", label)),
                Err(GeoError::ReservedLabel(l)) if l == label
            ));
            assert!(matches!(
                validate_references(&[Reference::new(label, vec![1])]),
                Err(GeoError::ReservedLabel(l)) if l == label
            ));
        }

        assert!(!is_reserved_label("arrival"));
    }

    #[test]
    fn test_parse_references_json() {
        let refs = parse_references_json(
            br#"[{"label": "arrival", "ids": [1001]}, {"label": "departure", "ids": [], "alt_label": "dep"}]"#,
        )
        .unwrap();

        assert_eq!(refs[0], Reference::new("arrival", vec![1001]));
        assert_eq!(refs[1].alt_label, "dep");
        assert!(parse_references_json(b"{}").is_err());
    }

    #[test]
    fn test_source_geom() {
        assert_eq!(source_geom(None), "sfomuseum#georeference");
        assert_eq!(source_geom(Some("")), "sfomuseum#georeference");
        assert_eq!(source_geom(Some("sfo")), "sfomuseum#georeference-sfo");
    }
}
