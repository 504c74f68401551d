//! Buffer operations
//!
//! Grows geometries outward by a distance. The buffer is the Minkowski sum
//! of the geometry with a regular polygon approximating a disc: every segment
//! sweeps the convex hull of the discs at its ends, and areal inputs add
//! their own interior. Because the disc for a larger distance contains the
//! disc for a smaller one, buffers grow monotonically with distance.

use super::join::{spatial_join, JoinOptions};
use super::predicate::SpatialPredicate;
use crate::maybe_rayon::*;
use crate::reproject::reproject_layer;
use geo::orient::{Direction, Orient};
use geo::{BooleanOps, ConvexHull, Coord, Geometry, LineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use terrabind_core::vector::{Feature, GeometryFamily, VectorLayer};
use terrabind_core::{Algorithm, Error, Result, CRS};
use tracing::debug;

/// Parameters for buffer operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferParams {
    /// Buffer distance in the linear units of the working CRS (>= 0)
    pub distance: f64,
    /// Number of segments approximating a full circle (default: 64)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 64,
        }
    }
}

impl BufferParams {
    pub fn new(distance: f64) -> Self {
        Self { distance, ..Self::default() }
    }

    fn check(&self) -> Result<()> {
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(Error::InvalidParameter {
                name: "distance",
                value: self.distance.to_string(),
                reason: "must be a finite, non-negative length".to_string(),
            });
        }
        Ok(())
    }
}

fn disc_coords(center: Coord<f64>, params: &BufferParams) -> Vec<Coord<f64>> {
    let n = params.segments.max(4);
    let r = params.distance;
    (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            Coord { x: center.x + r * angle.cos(), y: center.y + r * angle.sin() }
        })
        .collect()
}

/// Create a circular buffer around a point.
///
/// Generates a counter-clockwise polygon approximating a circle with the
/// given number of segments.
pub fn buffer_point(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let mut coords = disc_coords(point.0, params);
    // Close the ring
    coords.push(coords[0]);
    Polygon::new(LineString::new(coords), vec![])
}

/// Hull swept by the disc along one segment
fn segment_sweep(start: Coord<f64>, end: Coord<f64>, params: &BufferParams) -> Polygon<f64> {
    let mut pts = disc_coords(start, params);
    pts.extend(disc_coords(end, params));
    MultiPoint::from(pts.into_iter().map(Point::from).collect::<Vec<_>>()).convex_hull()
}

fn line_pieces(ls: &LineString<f64>, params: &BufferParams, out: &mut Vec<Polygon<f64>>) {
    let mut swept = false;
    for seg in ls.lines().filter(|l| l.start != l.end) {
        out.push(segment_sweep(seg.start, seg.end, params));
        swept = true;
    }
    if !swept {
        if let Some(c) = ls.0.first() {
            out.push(buffer_point(&Point(*c), params));
        }
    }
}

fn polygon_pieces(p: &Polygon<f64>, params: &BufferParams, out: &mut Vec<Polygon<f64>>) {
    out.push(p.clone());
    if params.distance > 0.0 {
        line_pieces(p.exterior(), params, out);
        for hole in p.interiors() {
            line_pieces(hole, params, out);
        }
    }
}

/// Balanced pairwise union keeps intermediate results small
fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => next.push(first.union(&second)),
                None => next.push(first),
            }
        }
        parts = next;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

/// Buffer one geometry.
///
/// Points and lines need a positive distance; a zero distance returns a
/// polygon unchanged.
pub fn buffer_geometry(geom: &Geometry<f64>, params: &BufferParams) -> Result<Geometry<f64>> {
    params.check()?;

    let areal = matches!(geom, Geometry::Polygon(_) | Geometry::MultiPolygon(_));
    if params.distance == 0.0 && !areal {
        return Err(Error::InvalidParameter {
            name: "distance",
            value: "0".to_string(),
            reason: "points and lines need a positive buffer distance".to_string(),
        });
    }

    let mut pieces = Vec::new();
    match geom {
        Geometry::Point(p) => return Ok(Geometry::Polygon(buffer_point(p, params))),
        Geometry::MultiPoint(mp) => pieces.extend(mp.0.iter().map(|p| buffer_point(p, params))),
        Geometry::LineString(ls) => line_pieces(ls, params, &mut pieces),
        Geometry::MultiLineString(mls) => mls.0.iter().for_each(|ls| line_pieces(ls, params, &mut pieces)),
        Geometry::Polygon(p) => polygon_pieces(p, params, &mut pieces),
        Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| polygon_pieces(p, params, &mut pieces)),
        _ => {
            return Err(Error::UnsupportedGeometry(
                "only points, lines and polygons can be buffered".to_string(),
            ))
        }
    }

    let mut merged = union_all(pieces.into_iter().map(|p| MultiPolygon::new(vec![p])).collect())
        .orient(Direction::Default);

    Ok(if merged.0.len() == 1 {
        Geometry::Polygon(merged.0.remove(0))
    } else {
        Geometry::MultiPolygon(merged)
    })
}

/// Buffer every feature of a layer by a distance measured in `crs_for_distance`.
///
/// `crs_for_distance` must be projected. When it differs from the layer's CRS
/// the layer is reprojected into it, buffered, and reprojected back, so the
/// result keeps the input CRS, schema and feature order.
pub fn buffer(layer: &VectorLayer, params: &BufferParams, crs_for_distance: &CRS) -> Result<VectorLayer> {
    if crs_for_distance.is_geographic() {
        return Err(Error::RequiresProjectedCrs(crs_for_distance.to_string()));
    }
    params.check()?;
    if params.distance == 0.0 && matches!(layer.family(), Some(GeometryFamily::Point | GeometryFamily::Line)) {
        return Err(Error::InvalidParameter {
            name: "distance",
            value: "0".to_string(),
            reason: format!("cannot buffer {} by zero", layer.family().map(|f| f.to_string()).unwrap_or_default()),
        });
    }

    let reprojected;
    let working = if layer.crs() == crs_for_distance {
        layer
    } else {
        reprojected = reproject_layer(layer, crs_for_distance)?;
        &reprojected
    };

    let features: Vec<Feature> = working
        .features()
        .par_iter()
        .map(|f| {
            Ok(Feature {
                geometry: buffer_geometry(&f.geometry, params)?,
                properties: f.properties.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        distance = params.distance,
        segments = params.segments,
        features = features.len(),
        working_crs = %crs_for_distance,
        "buffered layer"
    );

    let buffered = VectorLayer::with_schema(crs_for_distance.clone(), layer.schema().clone(), features)?;
    if layer.crs() == crs_for_distance {
        Ok(buffered)
    } else {
        reproject_layer(&buffered, layer.crs())
    }
}

/// Candidate features lying within `distance` of any reference feature.
///
/// The reference layer is buffered in its own CRS, which must be projected,
/// and the candidates are inner-joined against the buffers with
/// `intersects`. Rows carry candidate geometry and attributes plus the
/// attributes of each reference feature in range, ordered by candidate index
/// then reference index. A zero distance joins against the references as-is.
pub fn within_distance(reference: &VectorLayer, candidate: &VectorLayer, distance: f64) -> Result<VectorLayer> {
    if reference.crs().is_geographic() {
        return Err(Error::RequiresProjectedCrs(reference.crs().to_string()));
    }
    candidate.ensure_same_crs(reference)?;

    let zones = if distance == 0.0 {
        reference.clone()
    } else {
        buffer(reference, &BufferParams::new(distance), reference.crs())?
    };

    spatial_join(candidate, &zones, SpatialPredicate::Intersects, &JoinOptions::inner())
}

/// Buffer algorithm, measuring distance in the layer's own CRS
#[derive(Debug, Clone, Default)]
pub struct Buffer;

impl Algorithm for Buffer {
    type Input = VectorLayer;
    type Output = VectorLayer;
    type Params = BufferParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Buffer"
    }

    fn description(&self) -> &'static str {
        "Grow every geometry of a projected layer outward by a distance"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let crs = input.crs().clone();
        buffer(&input, &params, &crs)
    }
}
