//! Folding records and geometries into a single MultiPoint.

use super::{PointSet, representative_points};
use crate::error::Result;
use crate::fanout::fan_out;
use crate::properties;
use crate::store::{self, Reader};
use geo_types::{Geometry, MultiPoint};
use std::sync::Arc;
use tracing::debug;

/// Explicit lat/lon properties that win over a record's geometry, in order.
const OVERRIDE_PREFIXES: [&str; 2] = ["geotag", "lbl"];

async fn contributions_for_id(reader: Arc<dyn Reader>, id: i64) -> Result<Vec<Geometry<f64>>> {
    let body = store::load_feature(reader.as_ref(), id).await?;

    if let Some(pt) = properties::override_point(&body, &OVERRIDE_PREFIXES) {
        debug!("Using override point for {}", id);
        return Ok(vec![Geometry::Point(pt)]);
    }

    let geom = properties::geometry(&body)?;

    match geom {
        Geometry::MultiPoint(mp) => Ok(mp.0.into_iter().map(Geometry::Point).collect()),
        other => {
            let pt = super::planar_centroid(&id.to_string(), &other)?;
            Ok(vec![Geometry::Point(pt)])
        }
    }
}

/// One or more representative points per id, deduplicated. An empty `ids` yields an empty
/// MultiPoint; choosing a fallback geometry is up to the caller.
pub async fn derive_points_for_ids(reader: Arc<dyn Reader>, ids: &[i64]) -> Result<MultiPoint<f64>> {
    let per_id = fan_out(ids.iter().copied(), |id| {
        contributions_for_id(Arc::clone(&reader), id)
    })
    .await?;

    derive_points_for_geometries(per_id.into_iter().flatten().collect()).await
}

pub async fn derive_points_for_geometries(geoms: Vec<Geometry<f64>>) -> Result<MultiPoint<f64>> {
    let per_geom = fan_out(geoms.into_iter().enumerate(), |(idx, geom)| async move {
        representative_points(&format!("geometry #{}", idx), &geom)
    })
    .await?;

    let mut points = PointSet::new();
    points.extend(per_geom.into_iter().flatten());

    Ok(points.into_multipoint())
}
