//! The camera feature drawn by a geotagging client: a GeometryCollection holding the camera
//! point and the two-point horizon line, plus the field of view angle, bearing and distance.

use crate::error::{GeoError, Result};
use crate::hierarchy::Hierarchy;
use geo_types::{Coord, Geometry, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parent id for a camera or target that was not placed in anything.
pub const NO_PARENT: i64 = -1;

fn no_parent() -> i64 {
    NO_PARENT
}

/// The place a camera or its target sits in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentPointer {
    #[serde(rename = "wof:parent_id", default = "no_parent")]
    pub parent_id: i64,
    #[serde(rename = "wof:hierarchy", default)]
    pub hierarchy: Vec<Hierarchy>,
}

impl Default for ParentPointer {
    fn default() -> Self {
        Self {
            parent_id: NO_PARENT,
            hierarchy: Vec::new(),
        }
    }
}

impl ParentPointer {
    pub fn new(parent_id: i64) -> Self {
        Self {
            parent_id,
            hierarchy: Vec::new(),
        }
    }

    /// The parent id when it names an actual place. Earth (0) and unknown (-1) do not.
    pub fn id(&self) -> Option<i64> {
        (self.parent_id > 0).then_some(self.parent_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeotagProperties {
    #[serde(rename = "geotag:angle", default)]
    pub angle: f64,
    #[serde(rename = "geotag:bearing", default)]
    pub bearing: f64,
    #[serde(rename = "geotag:distance", default)]
    pub distance: f64,
    #[serde(rename = "geotag:camera", default)]
    pub camera: ParentPointer,
    #[serde(rename = "geotag:target", default)]
    pub target: ParentPointer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeotagFeature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(rename = "type")]
    pub feature_type: String,
    pub geometry: geojson::Geometry,
    #[serde(default)]
    pub properties: GeotagProperties,
}

impl GeotagFeature {
    pub fn new(camera: Point<f64>, horizon: [Point<f64>; 2], properties: GeotagProperties) -> Self {
        let collection = Geometry::GeometryCollection(geo_types::GeometryCollection(vec![
            Geometry::Point(camera),
            Geometry::LineString(LineString::from(horizon.to_vec())),
        ]));

        Self {
            id: None,
            feature_type: String::from("Feature"),
            geometry: geojson::Geometry::from(&collection),
            properties,
        }
    }

    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| GeoError::decode("geotag feature", e))
    }

    /// Camera point and the left and right ends of the horizon line.
    fn parts(&self) -> Result<(Coord<f64>, Coord<f64>, Coord<f64>)> {
        let invalid = |reason: &str| GeoError::InvalidGeometry {
            path: String::from("geotag feature"),
            reason: reason.to_string(),
        };

        let geom = Geometry::<f64>::try_from(self.geometry.clone())
            .map_err(|e| invalid(&e.to_string()))?;

        let Geometry::GeometryCollection(collection) = geom else {
            return Err(invalid("expected a GeometryCollection"));
        };

        match collection.0.as_slice() {
            [Geometry::Point(camera), Geometry::LineString(horizon)] => match horizon.0.as_slice() {
                [left, right] => Ok((camera.0, *left, *right)),
                _ => Err(invalid("horizon line must have exactly two coordinates")),
            },
            _ => Err(invalid("expected a Point and a LineString")),
        }
    }

    /// Fails on anything that is not a camera point plus a two-point horizon line.
    pub fn validate(&self) -> Result<()> {
        self.parts().map(|_| ())
    }

    /// Where the camera stands.
    pub fn point_of_view(&self) -> Result<Point<f64>> {
        let (camera, _, _) = self.parts()?;
        Ok(Point::from(camera))
    }

    /// The middle of the horizon line.
    pub fn target(&self) -> Result<Point<f64>> {
        let (_, left, right) = self.parts()?;
        Ok(Point::new((left.x + right.x) / 2.0, (left.y + right.y) / 2.0))
    }

    /// The triangle from the camera out to both ends of the horizon line.
    pub fn field_of_view(&self) -> Result<Polygon<f64>> {
        let (camera, left, right) = self.parts()?;
        Ok(Polygon::new(
            LineString::from(vec![camera, right, left, camera]),
            vec![],
        ))
    }
}
