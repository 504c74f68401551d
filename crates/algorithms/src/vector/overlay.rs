//! Polygon overlay
//!
//! Boolean set operations between two polygon layers, feature by feature.
//! Candidate pairs come from the bounding-box index; exact pieces come from
//! `geo`'s boolean operations.
//!
//! Output rows, in order:
//! 1. intersection pieces, by (a index, b index), for `Intersection` and `Union`
//! 2. the part of each `a` feature not covered by any `b` feature, for
//!    `Difference`, `SymmetricDifference` and `Union` (b attributes null)
//! 3. the part of each `b` feature not covered by any `a` feature, for
//!    `SymmetricDifference` and `Union` (a attributes null)
//!
//! Pieces with no area are dropped.

use super::join::match_pairs;
use super::predicate::SpatialPredicate;
use super::validate::validity;
use crate::maybe_rayon::*;
use geo::orient::{Direction, Orient};
use geo::{Area, BooleanOps, Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::fmt;
use terrabind_core::vector::{Feature, GeometryFamily, KeyCollision, Schema, VectorLayer};
use terrabind_core::{Algorithm, Error, Result};
use tracing::debug;

/// Boolean set operation applied between the two layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlayMode {
    #[default]
    Intersection,
    Union,
    Difference,
    SymmetricDifference,
}

impl fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverlayMode::Intersection => "intersection",
            OverlayMode::Union => "union",
            OverlayMode::Difference => "difference",
            OverlayMode::SymmetricDifference => "symmetric_difference",
        };
        f.write_str(name)
    }
}

impl OverlayMode {
    fn keeps_intersection(self) -> bool {
        matches!(self, OverlayMode::Intersection | OverlayMode::Union)
    }

    fn keeps_a_remainder(self) -> bool {
        !matches!(self, OverlayMode::Intersection)
    }

    fn keeps_b_remainder(self) -> bool {
        matches!(self, OverlayMode::Union | OverlayMode::SymmetricDifference)
    }
}

/// Overlay configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayOptions {
    /// Handling of attribute names present on both layers
    pub collision: KeyCollision,
}

fn as_multi(geom: &Geometry<f64>) -> MultiPolygon<f64> {
    match geom {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        _ => MultiPolygon::new(vec![]),
    }
}

fn piece_geometry(mut mp: MultiPolygon<f64>) -> Geometry<f64> {
    mp = mp.orient(Direction::Default);
    if mp.0.len() == 1 {
        Geometry::Polygon(mp.0.remove(0))
    } else {
        Geometry::MultiPolygon(mp)
    }
}

fn non_empty(mp: MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    (!mp.0.is_empty() && mp.unsigned_area() > 0.0).then_some(mp)
}

fn check_inputs(layer: &VectorLayer, side: &str) -> Result<()> {
    match layer.family() {
        None | Some(GeometryFamily::Polygon) => {}
        Some(other) => {
            return Err(Error::UnsupportedGeometry(format!(
                "overlay needs polygon layers, layer {} holds {}",
                side, other
            )))
        }
    }
    for (index, feature) in layer.iter().enumerate() {
        validity(&feature.geometry).map_err(|reason| Error::InvalidGeometry {
            index,
            reason: format!("layer {}: {}", side, reason),
        })?;
    }
    Ok(())
}

/// `own[i]` minus every overlapping geometry of the other layer
fn remainders(own: &[MultiPolygon<f64>], other: &[MultiPolygon<f64>], hits: &[Vec<usize>]) -> Vec<Option<MultiPolygon<f64>>> {
    (0..own.len())
        .into_par_iter()
        .map(|i| {
            let rest = hits[i]
                .iter()
                .fold(own[i].clone(), |acc, &j| acc.difference(&other[j]));
            non_empty(rest)
        })
        .collect()
}

/// Overlay two polygon layers.
///
/// Both layers must share a CRS and hold valid polygons; run
/// [`repair_layer`](super::repair_layer) first when they might not.
pub fn overlay(
    a: &VectorLayer,
    b: &VectorLayer,
    mode: OverlayMode,
    options: &OverlayOptions,
) -> Result<VectorLayer> {
    a.ensure_same_crs(b)?;
    check_inputs(a, "a")?;
    check_inputs(b, "b")?;
    let merge = Schema::merge(a.schema(), b.schema(), &options.collision)?;

    let polys_a: Vec<MultiPolygon<f64>> = a.iter().map(|f| as_multi(&f.geometry)).collect();
    let polys_b: Vec<MultiPolygon<f64>> = b.iter().map(|f| as_multi(&f.geometry)).collect();
    let hits_a = match_pairs(a, b, SpatialPredicate::Intersects);

    let mut rows: Vec<Feature> = Vec::new();

    if mode.keeps_intersection() {
        let pieces: Vec<Vec<(usize, MultiPolygon<f64>)>> = (0..polys_a.len())
            .into_par_iter()
            .map(|i| {
                hits_a[i]
                    .iter()
                    .filter_map(|&j| non_empty(polys_a[i].intersection(&polys_b[j])).map(|mp| (j, mp)))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (i, row) in pieces.into_iter().enumerate() {
            for (j, mp) in row {
                rows.push(Feature {
                    geometry: piece_geometry(mp),
                    properties: merge.combine(Some(&a.features()[i].properties), Some(&b.features()[j].properties)),
                });
            }
        }
    }

    if mode.keeps_a_remainder() {
        for (i, rest) in remainders(&polys_a, &polys_b, &hits_a).into_iter().enumerate() {
            if let Some(mp) = rest {
                rows.push(Feature {
                    geometry: piece_geometry(mp),
                    properties: merge.combine(Some(&a.features()[i].properties), None),
                });
            }
        }
    }

    if mode.keeps_b_remainder() {
        let hits_b = match_pairs(b, a, SpatialPredicate::Intersects);
        for (j, rest) in remainders(&polys_b, &polys_a, &hits_b).into_iter().enumerate() {
            if let Some(mp) = rest {
                rows.push(Feature {
                    geometry: piece_geometry(mp),
                    properties: merge.combine(None, Some(&b.features()[j].properties)),
                });
            }
        }
    }

    debug!(
        %mode,
        a = a.len(),
        b = b.len(),
        candidate_pairs = hits_a.iter().map(Vec::len).sum::<usize>(),
        rows = rows.len(),
        "overlay"
    );

    VectorLayer::with_schema(a.crs().clone(), merge.into_schema(), rows)
}

/// Parameters for [`Overlay`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayParams {
    pub mode: OverlayMode,
    pub options: OverlayOptions,
}

/// Polygon overlay algorithm over an (a, b) pair of layers
#[derive(Debug, Clone, Default)]
pub struct Overlay;

impl Algorithm for Overlay {
    type Input = (VectorLayer, VectorLayer);
    type Output = VectorLayer;
    type Params = OverlayParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Overlay"
    }

    fn description(&self) -> &'static str {
        "Intersection, union, difference or symmetric difference of two polygon layers"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (a, b) = input;
        overlay(&a, &b, params.mode, &params.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{point, polygon};
    use terrabind_core::vector::AttributeValue;
    use terrabind_core::CRS;

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ]
        .into()
    }

    fn layer_a() -> VectorLayer {
        VectorLayer::new(
            CRS::local(),
            vec![Feature::new(square(0.0, 0.0, 4.0)).with_property("name", "a0")],
        )
        .unwrap()
    }

    fn layer_b() -> VectorLayer {
        VectorLayer::new(
            CRS::local(),
            vec![
                Feature::new(square(2.0, 2.0, 4.0)).with_property("code", 1.0),
                Feature::new(square(10.0, 10.0, 1.0)).with_property("code", 2.0),
            ],
        )
        .unwrap()
    }

    fn total_area(layer: &VectorLayer) -> f64 {
        layer.iter().map(|f| f.geometry.unsigned_area()).sum()
    }

    #[test]
    fn test_intersection() {
        let out = overlay(&layer_a(), &layer_b(), OverlayMode::Intersection, &OverlayOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        let f = out.get(0).unwrap();
        assert_relative_eq!(f.geometry.unsigned_area(), 4.0, epsilon = 1e-9);
        assert_eq!(f.get_property("name"), Some(&AttributeValue::from("a0")));
        assert_eq!(f.get_property("code"), Some(&AttributeValue::Number(1.0)));
    }

    #[test]
    fn test_difference_nulls_other_side() {
        let out = overlay(&layer_a(), &layer_b(), OverlayMode::Difference, &OverlayOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        let f = out.get(0).unwrap();
        assert_relative_eq!(f.geometry.unsigned_area(), 12.0, epsilon = 1e-9);
        assert_eq!(f.get_property("code"), Some(&AttributeValue::Null));
    }

    #[test]
    fn test_symmetric_difference_rows() {
        let out = overlay(
            &layer_a(),
            &layer_b(),
            OverlayMode::SymmetricDifference,
            &OverlayOptions::default(),
        )
        .unwrap();
        // a remainder, then both b remainders
        assert_eq!(out.len(), 3);
        assert_relative_eq!(total_area(&out), 12.0 + 12.0 + 1.0, epsilon = 1e-9);
        assert_eq!(out.get(0).unwrap().get_property("code"), Some(&AttributeValue::Null));
        assert_eq!(out.get(2).unwrap().get_property("name"), Some(&AttributeValue::Null));
        assert_eq!(out.get(2).unwrap().get_property("code"), Some(&AttributeValue::Number(2.0)));
    }

    #[test]
    fn test_union_area() {
        let out = overlay(&layer_a(), &layer_b(), OverlayMode::Union, &OverlayOptions::default()).unwrap();
        assert_eq!(out.len(), 4);
        assert_relative_eq!(total_area(&out), 16.0 + 17.0 - 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_touching_pieces_dropped() {
        let b = VectorLayer::new(CRS::local(), vec![Feature::new(square(4.0, 0.0, 4.0))]).unwrap();
        let out = overlay(&layer_a(), &b, OverlayMode::Intersection, &OverlayOptions::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_input_rejected() {
        let bowtie: Geometry<f64> =
            polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 2.0), (x: 2.0, y: 0.0), (x: 0.0, y: 2.0)].into();
        let bad = VectorLayer::new(CRS::local(), vec![Feature::new(square(9.0, 9.0, 1.0)), Feature::new(bowtie)])
            .unwrap();
        let err = overlay(&layer_a(), &bad, OverlayMode::Union, &OverlayOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { index: 1, .. }));
    }

    #[test]
    fn test_points_rejected() {
        let pts = VectorLayer::new(CRS::local(), vec![Feature::new(point!(x: 1.0, y: 1.0))]).unwrap();
        let err = overlay(&layer_a(), &pts, OverlayMode::Intersection, &OverlayOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedGeometry(_)));
    }

    #[test]
    fn test_algorithm_impl() {
        let out = Overlay
            .execute(
                (layer_a(), layer_b()),
                OverlayParams { mode: OverlayMode::Difference, ..Default::default() },
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(Overlay.name(), "Overlay");
    }
}
