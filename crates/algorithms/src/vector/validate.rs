//! Geometry validation and repair
//!
//! Checks follow the OGC simple-features rules for the six supported
//! geometry variants. Repair re-nodes each exterior ring through the boolean
//! overlay, subtracts its holes, then unions the parts one at a time, so
//! overlapping parts merge instead of cancelling. Repaired polygons are
//! oriented with exteriors counter-clockwise and holes clockwise.

use crate::maybe_rayon::*;
use geo::coordinate_position::{CoordPos, CoordinatePosition};
use geo::kernels::{Kernel, Orientation, RobustKernel};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Coord, Geometry, Line, LineString, MultiLineString, MultiPolygon, Polygon};
use terrabind_core::vector::{Feature, VectorLayer};
use terrabind_core::{Algorithm, Diagnostic, Error, Processed, Result};
use tracing::{debug, warn};

/// Check a geometry, returning the first problem found
pub fn validity(geom: &Geometry<f64>) -> std::result::Result<(), String> {
    if let Some(c) = first_non_finite(geom) {
        return Err(format!("non-finite coordinate ({}, {})", c.x, c.y));
    }

    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(()),
        Geometry::LineString(ls) => line_validity(ls),
        Geometry::MultiLineString(mls) => mls.0.iter().try_for_each(line_validity),
        Geometry::Polygon(p) => polygon_validity(p),
        Geometry::MultiPolygon(mp) => multi_polygon_validity(mp),
        _ => Err("unsupported geometry variant".to_string()),
    }
}

fn first_non_finite(geom: &Geometry<f64>) -> Option<Coord<f64>> {
    let mut bad = None;
    terrabind_core::vector::for_each_coord(geom, |c| {
        if bad.is_none() && (!c.x.is_finite() || !c.y.is_finite()) {
            bad = Some(c);
        }
    });
    bad
}

/// True when [`validity`] finds nothing wrong
pub fn is_valid(geom: &Geometry<f64>) -> bool {
    validity(geom).is_ok()
}

fn line_validity(ls: &LineString<f64>) -> std::result::Result<(), String> {
    if distinct_count(&ls.0) < 2 {
        return Err("linestring needs at least two distinct points".to_string());
    }
    Ok(())
}

fn polygon_validity(p: &Polygon<f64>) -> std::result::Result<(), String> {
    ring_validity(p.exterior()).map_err(|e| format!("exterior ring: {}", e))?;
    for (i, hole) in p.interiors().iter().enumerate() {
        ring_validity(hole).map_err(|e| format!("hole {}: {}", i, e))?;
    }

    // Rings may touch at a point but never cross or share an edge
    let rings: Vec<&LineString<f64>> = std::iter::once(p.exterior()).chain(p.interiors()).collect();
    for i in 0..rings.len() {
        for j in (i + 1)..rings.len() {
            if rings_cross(rings[i], rings[j]) {
                return Err(format!("rings {} and {} cross", i, j));
            }
        }
    }

    let shell = Polygon::new(p.exterior().clone(), vec![]);
    for (i, hole) in p.interiors().iter().enumerate() {
        if !ring_inside(hole, &shell) {
            return Err(format!("hole {} lies outside the exterior ring", i));
        }
        for (j, other) in p.interiors().iter().enumerate() {
            if i != j && ring_inside(hole, &Polygon::new(other.clone(), vec![])) {
                return Err(format!("hole {} is nested inside hole {}", i, j));
            }
        }
    }
    Ok(())
}

fn multi_polygon_validity(mp: &MultiPolygon<f64>) -> std::result::Result<(), String> {
    for (i, p) in mp.0.iter().enumerate() {
        polygon_validity(p).map_err(|e| format!("part {}: {}", i, e))?;
    }
    for i in 0..mp.0.len() {
        for j in (i + 1)..mp.0.len() {
            let a = MultiPolygon::new(vec![mp.0[i].clone()]);
            let b = MultiPolygon::new(vec![mp.0[j].clone()]);
            if a.intersection(&b).unsigned_area() > 0.0 {
                return Err(format!("parts {} and {} overlap", i, j));
            }
        }
    }
    Ok(())
}

fn ring_validity(ring: &LineString<f64>) -> std::result::Result<(), String> {
    if ring.0.first() != ring.0.last() {
        return Err("ring is not closed".to_string());
    }
    if is_degenerate_ring(ring) {
        return Err("ring has zero area".to_string());
    }

    let segs: Vec<(Coord<f64>, Coord<f64>)> = ring
        .lines()
        .filter(|l| l.start != l.end)
        .map(|l| (l.start, l.end))
        .collect();
    let n = segs.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            let contact = segment_contact(segs[i].0, segs[i].1, segs[j].0, segs[j].1);
            let bad = if adjacent {
                contact == Contact::Overlap
            } else {
                contact != Contact::None
            };
            if bad {
                return Err(format!("ring self-intersects between segments {} and {}", i, j));
            }
        }
    }
    Ok(())
}

/// Every vertex of `ring` inside or on `shell`, at least one strictly inside
fn ring_inside(ring: &LineString<f64>, shell: &Polygon<f64>) -> bool {
    let mut strictly_inside = false;
    for c in &ring.0 {
        match shell.coordinate_position(c) {
            CoordPos::Outside => return false,
            CoordPos::Inside => strictly_inside = true,
            CoordPos::OnBoundary => {}
        }
    }
    strictly_inside
}

fn rings_cross(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    a.lines().any(|la| {
        b.lines().any(|lb| {
            matches!(
                segment_contact(la.start, la.end, lb.start, lb.end),
                Contact::Cross | Contact::Overlap
            )
        })
    })
}

fn distinct_count(coords: &[Coord<f64>]) -> usize {
    let mut distinct: Vec<Coord<f64>> = Vec::new();
    for c in coords {
        if !distinct.contains(c) {
            distinct.push(*c);
            if distinct.len() >= 3 {
                break;
            }
        }
    }
    distinct.len()
}

/// Fewer than three distinct points, or all points on one line
fn is_degenerate_ring(ring: &LineString<f64>) -> bool {
    if ring.0.len() < 4 || distinct_count(&ring.0) < 3 {
        return true;
    }
    let p0 = ring.0[0];
    let Some(p1) = ring.0.iter().copied().find(|c| *c != p0) else {
        return true;
    };
    ring.0
        .iter()
        .all(|c| RobustKernel::orient2d(p0, p1, *c) == Orientation::Collinear)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Contact {
    None,
    /// Meet at a single point that is an endpoint of at least one segment
    Touch,
    /// Interiors cross at a single point
    Cross,
    /// Collinear with a shared stretch of positive length
    Overlap,
}

fn segment_contact(p1: Coord<f64>, p2: Coord<f64>, q1: Coord<f64>, q2: Coord<f64>) -> Contact {
    match line_intersection(Line::new(p1, p2), Line::new(q1, q2)) {
        None => Contact::None,
        Some(LineIntersection::SinglePoint { is_proper: true, .. }) => Contact::Cross,
        Some(LineIntersection::SinglePoint { is_proper: false, .. }) => Contact::Touch,
        Some(LineIntersection::Collinear { intersection }) if intersection.start != intersection.end => {
            Contact::Overlap
        }
        Some(LineIntersection::Collinear { .. }) => Contact::Touch,
    }
}

// ── Repair ───────────────────────────────────────────────────────────────

fn unrepairable(reason: impl Into<String>) -> Error {
    Error::UnrepairableGeometry { reason: reason.into() }
}

fn dedup_coords(ls: &LineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ls.0.len());
    for c in &ls.0 {
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    LineString::new(coords)
}

/// Remove repeated points and drop degenerate holes; `None` if the exterior is degenerate
fn clean_polygon(p: &Polygon<f64>) -> Option<Polygon<f64>> {
    let exterior = dedup_coords(p.exterior());
    if is_degenerate_ring(&exterior) {
        return None;
    }
    let interiors = p
        .interiors()
        .iter()
        .map(dedup_coords)
        .filter(|r| !is_degenerate_ring(r))
        .collect();
    Some(Polygon::new(exterior, interiors))
}

/// Simple-ring version of one polygon: the re-noded exterior minus the union of its holes.
///
/// Holes only remove area where they overlap the exterior.
fn renode_polygon(p: &Polygon<f64>) -> MultiPolygon<f64> {
    let empty = MultiPolygon::new(vec![]);
    let shell = MultiPolygon::new(vec![Polygon::new(p.exterior().clone(), vec![])]).union(&empty);
    if p.interiors().is_empty() {
        return shell;
    }
    let holes = p
        .interiors()
        .iter()
        .map(|ring| MultiPolygon::new(vec![Polygon::new(ring.clone(), vec![])]).union(&empty))
        .fold(empty.clone(), |acc, hole| acc.union(&hole));
    shell.difference(&holes)
}

fn repair_polygons(parts: &[Polygon<f64>]) -> Result<MultiPolygon<f64>> {
    let cleaned: Vec<Polygon<f64>> = parts.iter().filter_map(clean_polygon).collect();
    if cleaned.is_empty() {
        return Err(unrepairable("every ring has zero area"));
    }

    let cleaned = MultiPolygon::new(cleaned);
    let candidate = if multi_polygon_validity(&cleaned).is_ok() {
        cleaned
    } else {
        cleaned
            .0
            .iter()
            .map(renode_polygon)
            .fold(MultiPolygon::new(vec![]), |acc, part| acc.union(&part))
    };

    let candidate = MultiPolygon::new(
        candidate
            .0
            .into_iter()
            .filter_map(|p| clean_polygon(&p))
            .collect(),
    )
    .orient(Direction::Default);

    if candidate.0.is_empty() || candidate.unsigned_area() == 0.0 {
        return Err(unrepairable("repair produced an empty geometry"));
    }
    multi_polygon_validity(&candidate).map_err(|e| unrepairable(format!("still invalid after repair: {}", e)))?;
    Ok(candidate)
}

/// Repair a geometry so that it passes [`validity`].
///
/// Points pass through when finite. Lines lose repeated points and must keep
/// two distinct ones. Polygons lose repeated points and zero-area holes, and
/// self-intersecting rings are rebuilt as simple rings covering the same area.
/// A polygon that repairs into several parts becomes a MultiPolygon.
pub fn validate_and_repair(geom: &Geometry<f64>) -> Result<Geometry<f64>> {
    if let Some(c) = first_non_finite(geom) {
        return Err(unrepairable(format!("non-finite coordinate ({}, {})", c.x, c.y)));
    }

    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(geom.clone()),
        Geometry::LineString(ls) => {
            let ls = dedup_coords(ls);
            line_validity(&ls).map_err(unrepairable)?;
            Ok(Geometry::LineString(ls))
        }
        Geometry::MultiLineString(mls) => {
            let parts: Vec<LineString<f64>> = mls
                .0
                .iter()
                .map(dedup_coords)
                .filter(|ls| line_validity(ls).is_ok())
                .collect();
            if parts.is_empty() {
                return Err(unrepairable("every linestring is degenerate"));
            }
            Ok(Geometry::MultiLineString(MultiLineString::new(parts)))
        }
        Geometry::Polygon(p) => {
            let mut repaired = repair_polygons(std::slice::from_ref(p))?;
            if repaired.0.len() == 1 {
                Ok(Geometry::Polygon(repaired.0.remove(0)))
            } else {
                Ok(Geometry::MultiPolygon(repaired))
            }
        }
        Geometry::MultiPolygon(mp) => Ok(Geometry::MultiPolygon(repair_polygons(&mp.0)?)),
        _ => Err(unrepairable("unsupported geometry variant")),
    }
}

/// Repair every feature of a layer.
///
/// Features that cannot be repaired are dropped and reported as diagnostics;
/// the remaining features keep their input order.
pub fn repair_layer(layer: &VectorLayer) -> Result<Processed<VectorLayer>> {
    let outcomes: Vec<Result<Feature>> = layer
        .features()
        .into_par_iter()
        .map(|f| {
            validate_and_repair(&f.geometry).map(|geometry| Feature {
                geometry,
                properties: f.properties.clone(),
            })
        })
        .collect();

    let mut features = Vec::with_capacity(outcomes.len());
    let mut diagnostics = Vec::new();
    for (feature_index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(f) => features.push(f),
            Err(error) => {
                warn!(feature_index, %error, "dropping feature that could not be repaired");
                diagnostics.push(Diagnostic { feature_index, error });
            }
        }
    }

    debug!(
        input = layer.len(),
        kept = features.len(),
        dropped = diagnostics.len(),
        "repaired layer"
    );

    let value = layer.derive(features)?;
    Ok(Processed::new(value, diagnostics))
}

/// Layer repair algorithm
#[derive(Debug, Clone, Default)]
pub struct RepairGeometries;

impl Algorithm for RepairGeometries {
    type Input = VectorLayer;
    type Output = Processed<VectorLayer>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "RepairGeometries"
    }

    fn description(&self) -> &'static str {
        "Repair self-intersecting and degenerate geometries, dropping what cannot be fixed"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        repair_layer(&input)
    }
}
