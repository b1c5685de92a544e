//! Geotagging: camera position and field of view recorded directly on a depiction.

use crate::error::Result;
use crate::georeference::RecompileOptions;
use crate::patch;
use crate::store::{Reader, WriterFactory};
use crate::{RESERVED_GEOTAG_LASTMODIFIED, property_path};
use serde_json::{Value, json};
use std::sync::Arc;

pub mod add;
pub mod feature;
pub mod remove;

pub use add::add_geotag_depiction;
pub use feature::{GeotagFeature, GeotagProperties, ParentPointer};
pub use remove::remove_geotag_depiction;

/// Namespace for geotagging properties.
pub const GEOTAG_NS: &str = "geotag";

/// Alt label of the field of view geometry.
pub const GEOTAG_LABEL: &str = "geotag-fov";

/// `src:geom` for depictions and their field of view.
pub const GEOTAG_SRC_GEOM: &str = "sfomuseum";

/// `src:geom` for subjects with at least one geotagged depiction.
pub const GEOTAG_SUBJECT_SRC_GEOM: &str = "sfomuseum#geotagged";

pub const GEOTAG_CAMERA: &str = "geotag:whosonfirst_camera";
pub const GEOTAG_TARGET: &str = "geotag:whosonfirst_target";

#[derive(Clone)]
pub struct GeotagOptions {
    pub depiction_reader: Arc<dyn Reader>,
    pub subject_reader: Arc<dyn Reader>,
    /// Places the camera and target point at, and the default geometry record.
    pub whosonfirst_reader: Arc<dyn Reader>,
    pub depiction_writer_uri: String,
    pub subject_writer_uri: String,
    pub writer_factory: Arc<dyn WriterFactory>,
    pub author: String,
    pub default_geometry_id: Option<i64>,
}

impl GeotagOptions {
    pub(crate) fn recompile_options(&self) -> RecompileOptions {
        RecompileOptions {
            depiction_reader: Arc::clone(&self.depiction_reader),
            whosonfirst_reader: Arc::clone(&self.whosonfirst_reader),
            default_geometry_id: self.default_geometry_id,
        }
    }
}

/// True for `geotag:*` property keys.
pub fn is_geotag_property(key: &str) -> bool {
    key.strip_prefix(GEOTAG_NS)
        .is_some_and(|rest| rest.starts_with(':'))
}

pub(crate) fn stamp(body: &mut Value) -> Result<()> {
    patch::assign(
        body,
        &property_path(RESERVED_GEOTAG_LASTMODIFIED),
        json!(crate::unix_timestamp()),
    )
}
