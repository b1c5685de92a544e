use crate::error::{GeoError, Result};
use geo::Centroid;
use geo_types::{Geometry, MultiPoint, Point};
use serde_json::Value;

pub mod multipoint;

pub use multipoint::{derive_points_for_geometries, derive_points_for_ids};

/// Insertion-ordered points, deduplicated by exact coordinate equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<Point<f64>>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// No epsilon. Points that differ in the last bit are both kept.
    pub fn add_if_absent(&mut self, pt: Point<f64>) -> bool {
        if self.points.iter().any(|existing| *existing == pt) {
            return false;
        }

        self.points.push(pt);
        true
    }

    pub fn extend<I: IntoIterator<Item = Point<f64>>>(&mut self, points: I) {
        for pt in points {
            self.add_if_absent(pt);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point<f64>] {
        &self.points
    }

    pub fn into_multipoint(self) -> MultiPoint<f64> {
        MultiPoint::new(self.points)
    }
}

pub fn from_json(path: &str, value: &Value) -> Result<Geometry<f64>> {
    let invalid = |reason: String| GeoError::InvalidGeometry {
        path: path.to_string(),
        reason,
    };

    let geom: geojson::Geometry =
        serde_json::from_value(value.clone()).map_err(|e| invalid(e.to_string()))?;

    Geometry::<f64>::try_from(geom).map_err(|e| invalid(e.to_string()))
}

pub fn to_json(geom: &Geometry<f64>) -> Result<Value> {
    serde_json::to_value(geojson::Geometry::from(geom)).map_err(GeoError::Encode)
}

pub fn multipoint_to_json(mp: MultiPoint<f64>) -> Result<Value> {
    to_json(&Geometry::MultiPoint(mp))
}

pub fn point_to_json(pt: Point<f64>) -> Result<Value> {
    to_json(&Geometry::Point(pt))
}

/// Placeholder geometry for deprecated records.
pub fn null_island() -> Point<f64> {
    Point::new(0.0, 0.0)
}

pub fn planar_centroid(path: &str, geom: &Geometry<f64>) -> Result<Point<f64>> {
    geom.centroid().ok_or_else(|| GeoError::InvalidGeometry {
        path: path.to_string(),
        reason: String::from("geometry is empty, no centroid"),
    })
}

/// Every component of a MultiPoint, otherwise the single planar centroid.
pub fn representative_points(path: &str, geom: &Geometry<f64>) -> Result<Vec<Point<f64>>> {
    match geom {
        Geometry::MultiPoint(mp) => Ok(mp.0.clone()),
        Geometry::Point(pt) => Ok(vec![*pt]),
        other => Ok(vec![planar_centroid(path, other)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{LineString, Polygon};
    use serde_json::json;

    #[test]
    fn test_point_set_same_point_twice() {
        let mut set = PointSet::new();

        assert!(set.add_if_absent(Point::new(-64.764346, 32.296698)));
        assert!(!set.add_if_absent(Point::new(-64.764346, 32.296698)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_point_set_two_distinct_points() {
        let mut set = PointSet::new();

        for pt in [
            Point::new(-64.764346, 32.296698),
            Point::new(-118.25703, 34.05513),
            Point::new(-64.764346, 32.296698),
            Point::new(-118.25703, 34.05513),
        ] {
            set.add_if_absent(pt);
        }

        assert_eq!(set.len(), 2);
        assert_eq!(set.points()[0], Point::new(-64.764346, 32.296698));
    }

    #[test]
    fn test_point_set_exact_equality_only() {
        let mut set = PointSet::new();
        set.add_if_absent(Point::new(1.0, 1.0));
        set.add_if_absent(Point::new(1.0 + f64::EPSILON, 1.0));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_json_round_trip() {
        let value = json!({"type": "MultiPoint", "coordinates": [[10.0, 20.0], [30.0, 40.0]]});
        let geom = from_json("test", &value).unwrap();

        assert!(matches!(geom, Geometry::MultiPoint(ref mp) if mp.0.len() == 2));
        assert_eq!(to_json(&geom).unwrap(), value);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(from_json("bad", &json!({"type": "Blob"})).is_err());
        assert!(from_json("bad", &json!("nope")).is_err());
    }

    #[test]
    fn test_representative_points() {
        let square = Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (0.0, 0.0)]),
            vec![],
        ));

        assert_eq!(
            representative_points("square", &square).unwrap(),
            vec![Point::new(1.0, 1.0)]
        );

        let mp = Geometry::MultiPoint(MultiPoint::from(vec![(0.0, 0.0), (4.0, 4.0)]));
        assert_eq!(representative_points("mp", &mp).unwrap().len(), 2);
    }
}
