//! Binary spatial predicates over the DE-9IM matrix
//!
//! `within` is `T*F**F***` and `contains` its transpose, so a pair whose
//! only contact is boundary on boundary is never within or contains. That
//! case reports `touches`. Both geometries must share a CRS.

use geo::coordinate_position::CoordPos;
use geo::dimensions::{Dimensions, HasDimensions};
use geo::{Geometry, Relate};
use serde::{Deserialize, Serialize};
use std::fmt;
use terrabind_core::vector::BoundingBox;
use terrabind_core::{Error, Result, CRS};

/// A binary topological relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpatialPredicate {
    /// Every point of A lies in B, and the interiors meet
    Within,
    /// A and B share at least one point
    #[default]
    Intersects,
    /// B within A
    Contains,
    /// A and B meet only on their boundaries
    Touches,
    /// The interiors meet in a lower dimension than the inputs
    Crosses,
    /// A and B share no point
    Disjoint,
}

impl fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpatialPredicate::Within => "within",
            SpatialPredicate::Intersects => "intersects",
            SpatialPredicate::Contains => "contains",
            SpatialPredicate::Touches => "touches",
            SpatialPredicate::Crosses => "crosses",
            SpatialPredicate::Disjoint => "disjoint",
        };
        f.write_str(name)
    }
}

impl SpatialPredicate {
    /// Whether a true result implies the bounding boxes overlap
    pub fn requires_overlap(&self) -> bool {
        !matches!(self, SpatialPredicate::Disjoint)
    }

    /// Evaluate the predicate for two geometries assumed to share a CRS
    pub fn test(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
        let boxes = BoundingBox::of(a).zip(BoundingBox::of(b));
        match boxes {
            Some((ba, bb)) if ba.intersects(&bb) => {}
            // Empty geometries or separated boxes share no point
            _ => return *self == SpatialPredicate::Disjoint,
        }

        let m = a.relate(b);
        match self {
            SpatialPredicate::Within => m.is_within(),
            SpatialPredicate::Contains => m.is_contains(),
            SpatialPredicate::Intersects => m.is_intersects(),
            SpatialPredicate::Disjoint => m.is_disjoint(),
            SpatialPredicate::Touches => {
                m.get(CoordPos::Inside, CoordPos::Inside) == Dimensions::Empty
                    && (m.get(CoordPos::Inside, CoordPos::OnBoundary) != Dimensions::Empty
                        || m.get(CoordPos::OnBoundary, CoordPos::Inside) != Dimensions::Empty
                        || m.get(CoordPos::OnBoundary, CoordPos::OnBoundary) != Dimensions::Empty)
            }
            SpatialPredicate::Crosses => {
                let ii = m.get(CoordPos::Inside, CoordPos::Inside);
                match (rank(a.dimensions()), rank(b.dimensions())) {
                    (1, 1) => ii == Dimensions::ZeroDimensional,
                    (da, db) if da < db => {
                        ii != Dimensions::Empty
                            && m.get(CoordPos::Inside, CoordPos::Outside) != Dimensions::Empty
                    }
                    (da, db) if da > db => {
                        ii != Dimensions::Empty
                            && m.get(CoordPos::Outside, CoordPos::Inside) != Dimensions::Empty
                    }
                    _ => false,
                }
            }
        }
    }

    /// Evaluate after checking both geometries are in the same frame.
    ///
    /// Fails with [`Error::CrsMismatch`] rather than reprojecting.
    pub fn evaluate(&self, a: &Geometry<f64>, a_crs: &CRS, b: &Geometry<f64>, b_crs: &CRS) -> Result<bool> {
        if a_crs != b_crs {
            return Err(Error::CrsMismatch(a_crs.to_string(), b_crs.to_string()));
        }
        Ok(self.test(a, b))
    }
}

fn rank(d: Dimensions) -> i8 {
    match d {
        Dimensions::Empty => -1,
        Dimensions::ZeroDimensional => 0,
        Dimensions::OneDimensional => 1,
        Dimensions::TwoDimensional => 2,
    }
}
