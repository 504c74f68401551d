//! Raster extraction at vector locations
//!
//! - Sample: cell values under points
//! - Mask: no-data outside polygons, optional crop

mod mask;
mod sample;

pub use mask::{mask, Mask, MaskParams};
pub use sample::{extract_values, sample, sample_points, sample_value, ExtractParams, ExtractValues, SampleValue};

use terrabind_core::raster::GeoTransform;
use terrabind_core::vector::BoundingBox;

/// Half-open block of cells `[row0, row1) x [col0, col1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellWindow {
    pub row0: usize,
    pub row1: usize,
    pub col0: usize,
    pub col1: usize,
}

impl CellWindow {
    pub fn full(rows: usize, cols: usize) -> Self {
        Self { row0: 0, row1: rows, col0: 0, col1: cols }
    }

    pub fn rows(&self) -> usize {
        self.row1 - self.row0
    }

    pub fn cols(&self) -> usize {
        self.col1 - self.col0
    }

    /// Cells of a `rows` x `cols` grid touched by `bbox`, `None` when they miss the grid
    pub fn covering(transform: &GeoTransform, bbox: &BoundingBox, rows: usize, cols: usize) -> Option<Self> {
        let corners = [
            transform.geo_to_pixel(bbox.min_x, bbox.min_y),
            transform.geo_to_pixel(bbox.max_x, bbox.min_y),
            transform.geo_to_pixel(bbox.min_x, bbox.max_y),
            transform.geo_to_pixel(bbox.max_x, bbox.max_y),
        ];
        let (mut c_lo, mut c_hi, mut r_lo, mut r_hi) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for (c, r) in corners {
            if !c.is_finite() || !r.is_finite() {
                return None;
            }
            c_lo = c_lo.min(c);
            c_hi = c_hi.max(c);
            r_lo = r_lo.min(r);
            r_hi = r_hi.max(r);
        }

        let span = |lo: f64, hi: f64, n: usize| -> Option<(usize, usize)> {
            let start = lo.floor();
            let end = hi.ceil().max(start + 1.0);
            let start = start.max(0.0);
            let end = end.min(n as f64);
            (end > start).then(|| (start as usize, end as usize))
        };

        let (col0, col1) = span(c_lo, c_hi, cols)?;
        let (row0, row1) = span(r_lo, r_hi, rows)?;
        Some(Self { row0, row1, col0, col1 })
    }
}
