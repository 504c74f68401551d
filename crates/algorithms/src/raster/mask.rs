//! Polygon masking
//!
//! Rasterizes polygons onto the raster's own grid: a cell is inside when its
//! centre lies in the closed region of any polygon (boundary included, no
//! anti-aliasing). Outside cells take the raster's no-data sentinel.

use super::CellWindow;
use crate::maybe_rayon::*;
use crate::vector::BoxIndex;
use geo::{Intersects, Point};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use terrabind_core::raster::{Raster, RasterElement};
use terrabind_core::vector::{BoundingBox, GeometryFamily, VectorLayer};
use terrabind_core::{Algorithm, Error, Result};
use tracing::debug;

/// Parameters for masking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskParams {
    /// Shrink the output to the cells covering the polygons' bounding box
    pub crop: bool,
}

/// Mask `raster` to the area of `polygons`.
///
/// With `crop`, the output grid is the block of cells touched by the
/// polygons' combined bounding box, clipped to the raster, and the transform
/// origin moves to that block's corner. Fails with [`Error::DisjointExtent`]
/// when cropping leaves no cells.
pub fn mask<T: RasterElement>(raster: &Raster<T>, polygons: &VectorLayer, params: &MaskParams) -> Result<Raster<T>> {
    if raster.crs() != polygons.crs() {
        return Err(Error::CrsMismatch(raster.crs().to_string(), polygons.crs().to_string()));
    }
    match polygons.family() {
        None | Some(GeometryFamily::Polygon) => {}
        Some(other) => {
            return Err(Error::UnsupportedGeometry(format!("mask needs polygons, got {}", other)));
        }
    }

    let (rows, cols) = raster.shape();
    let boxes: Vec<Option<BoundingBox>> = polygons.iter().map(|f| BoundingBox::of(&f.geometry)).collect();

    let window = if params.crop {
        let extent = boxes
            .iter()
            .flatten()
            .copied()
            .reduce(|a, b| a.union(&b))
            .ok_or(Error::DisjointExtent)?;
        CellWindow::covering(raster.transform(), &extent, rows, cols).ok_or(Error::DisjointExtent)?
    } else {
        CellWindow::full(rows, cols)
    };

    let index = BoxIndex::new(boxes);
    let nodata = raster.nodata();
    let data = raster.data();

    let row_values: Vec<Vec<T>> = (window.row0..window.row1)
        .into_par_iter()
        .map(|row| {
            (window.col0..window.col1)
                .map(|col| {
                    let (x, y) = raster.pixel_to_geo(col, row);
                    let centre = Point::new(x, y);
                    let inside = index
                        .query(&BoundingBox::new(x, y, x, y))
                        .into_iter()
                        .any(|i| polygons.features()[i].geometry.intersects(&centre));
                    if inside {
                        data[[row, col]]
                    } else {
                        nodata
                    }
                })
                .collect::<Vec<T>>()
        })
        .collect();
    let values: Vec<T> = row_values.into_iter().flatten().collect();

    let kept = values.iter().filter(|v| !v.is_nodata(nodata)).count();
    debug!(
        polygons = polygons.len(),
        crop = params.crop,
        rows = window.rows(),
        cols = window.cols(),
        kept,
        "masked raster"
    );

    let out = Array2::from_shape_vec((window.rows(), window.cols()), values)
        .map_err(|e| Error::Algorithm(format!("mask output shape: {}", e)))?;
    let transform = if params.crop {
        raster.transform().translated_to(window.col0, window.row0)
    } else {
        *raster.transform()
    };
    raster.with_data(out, transform)
}

/// Masking algorithm over a (raster, polygons) pair
#[derive(Debug, Clone, Default)]
pub struct Mask;

impl Algorithm for Mask {
    type Input = (Raster<f64>, VectorLayer);
    type Output = Raster<f64>;
    type Params = MaskParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Mask"
    }

    fn description(&self) -> &'static str {
        "Set raster cells outside a set of polygons to no-data, optionally cropping"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (raster, polygons) = input;
        mask(&raster, &polygons, &params)
    }
}
