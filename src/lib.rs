// Georeferencing and geotagging maintenance for Who's On First style gazetteer records.
//
// A "subject" is a collection object, a "depiction" is an image (or other media) of that subject
// and "places" are ordinary gazetteer records that depictions point at.

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

pub mod alt;
pub mod config;
pub mod error;
pub mod fanout;
pub mod format;
pub mod geometry;
pub mod georeference;
pub mod geotag;
pub mod hierarchy;
pub mod iterate;
pub mod patch;
pub mod properties;
pub mod provenance;
pub mod store;
pub mod uri;
pub mod writers;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{GeoError, Result};

pub const RESERVED_GEOTAG_DEPICTIONS: &str = "geotag:depicts";
pub const RESERVED_GEOTAG_BELONGSTO: &str = "geotag:whosonfirst_belongsto";
pub const RESERVED_GEOTAG_LASTMODIFIED: &str = "geotag:lastmodified";

pub const RESERVED_GEOREFERENCE_BELONGSTO: &str = "georef:whosonfirst_belongsto";
pub const RESERVED_GEOREFERENCE_DEPICTIONS: &str = "georef:depictions";
pub const RESERVED_GEOREFERENCE_DEPICTED: &str = "georef:depicted";
pub const RESERVED_GEOREFERENCE_LABEL: &str = "georef:label";
pub const RESERVED_GEOREFERENCE_LASTMODIFIED: &str = "georef:lastmodified";

pub const RESERVED_WOF_DEPICTS: &str = "wof:depicts";

/// Property on a subject record listing the ids of every depiction (image) of that subject.
pub const SUBJECT_IMAGES: &str = "millsfield:images";

/// Dotted patch path for a top-level property, e.g. `properties.src:geom`.
pub fn property_path(key: &str) -> String {
    format!("properties.{}", key)
}

/// Seconds since the unix epoch, used for last-modified stamps.
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
