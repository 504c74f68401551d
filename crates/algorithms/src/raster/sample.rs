//! Point sampling of raster cells
//!
//! A point takes the value of the cell whose footprint contains it, found by
//! inverting the raster transform and flooring. Points outside the grid, or
//! over a no-data cell, sample as [`SampleValue::NoData`]; sampling never
//! fails for an individual point.

use crate::maybe_rayon::*;
use geo::{Geometry, Point};
use serde::{Deserialize, Serialize};
use terrabind_core::raster::{Raster, RasterElement};
use terrabind_core::vector::{AttributeValue, Feature, Field, FieldType, GeometryFamily, VectorLayer};
use terrabind_core::{Algorithm, Error, Result};
use tracing::debug;

/// Value under a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue<T> {
    Value(T),
    /// Outside the grid, or the cell holds the no-data sentinel
    NoData,
}

impl<T: Copy> SampleValue<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            SampleValue::Value(v) => Some(*v),
            SampleValue::NoData => None,
        }
    }

    pub fn is_nodata(&self) -> bool {
        matches!(self, SampleValue::NoData)
    }
}

/// Sample the cell under (x, y)
pub fn sample_value<T: RasterElement>(raster: &Raster<T>, x: f64, y: f64) -> SampleValue<T> {
    let Some((row, col)) = raster.cell_at(x, y) else {
        return SampleValue::NoData;
    };
    match raster.get(row, col) {
        Ok(v) if !raster.is_nodata(v) => SampleValue::Value(v),
        _ => SampleValue::NoData,
    }
}

/// Sample a list of points, keeping their order
pub fn sample_points<T: RasterElement>(raster: &Raster<T>, points: &[Point<f64>]) -> Vec<(Point<f64>, SampleValue<T>)> {
    points
        .par_iter()
        .map(|p| (*p, sample_value(raster, p.x(), p.y())))
        .collect()
}

fn ensure_points(layer: &VectorLayer) -> Result<()> {
    match layer.family() {
        None | Some(GeometryFamily::Point) => Ok(()),
        Some(other) => Err(Error::UnsupportedGeometry(format!(
            "sampling needs a point layer, got {}",
            other
        ))),
    }
}

/// Sample a point layer.
///
/// The layer must share the raster's CRS. MultiPoint members are sampled in
/// order, one result each.
pub fn sample<T: RasterElement>(raster: &Raster<T>, layer: &VectorLayer) -> Result<Vec<(Point<f64>, SampleValue<T>)>> {
    if raster.crs() != layer.crs() {
        return Err(Error::CrsMismatch(raster.crs().to_string(), layer.crs().to_string()));
    }
    ensure_points(layer)?;

    let mut points = Vec::with_capacity(layer.len());
    for f in layer.iter() {
        match &f.geometry {
            Geometry::Point(p) => points.push(*p),
            Geometry::MultiPoint(mp) => points.extend(mp.0.iter().copied()),
            _ => {}
        }
    }

    let samples = sample_points(raster, &points);
    debug!(
        points = samples.len(),
        nodata = samples.iter().filter(|(_, v)| v.is_nodata()).count(),
        "sampled raster"
    );
    Ok(samples)
}

/// Copy of a point layer with the sampled value in a new Number field.
///
/// No-data samples become null. Features must be single points; the field
/// must not already exist.
pub fn extract_values<T: RasterElement>(raster: &Raster<T>, layer: &VectorLayer, field: &str) -> Result<VectorLayer> {
    if raster.crs() != layer.crs() {
        return Err(Error::CrsMismatch(raster.crs().to_string(), layer.crs().to_string()));
    }
    ensure_points(layer)?;

    let mut schema = layer.schema().clone();
    schema.push(Field::new(field, FieldType::Number))?;

    let features = layer
        .iter()
        .enumerate()
        .map(|(index, f)| {
            let Geometry::Point(p) = &f.geometry else {
                return Err(Error::InvalidGeometry {
                    index,
                    reason: "value extraction needs single points".to_string(),
                });
            };
            let value = sample_value(raster, p.x(), p.y())
                .value()
                .and_then(RasterElement::to_f64)
                .map_or(AttributeValue::Null, AttributeValue::Number);
            let mut out = f.clone();
            out.set_property(field, value);
            Ok(out)
        })
        .collect::<Result<Vec<Feature>>>()?;

    VectorLayer::with_schema(layer.crs().clone(), schema, features)
}

/// Parameters for [`ExtractValues`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractParams {
    /// Name of the attribute receiving the sampled value
    pub field: String,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self { field: "value".to_string() }
    }
}

/// Raster value extraction at point features
#[derive(Debug, Clone, Default)]
pub struct ExtractValues;

impl Algorithm for ExtractValues {
    type Input = (Raster<f64>, VectorLayer);
    type Output = VectorLayer;
    type Params = ExtractParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ExtractValues"
    }

    fn description(&self) -> &'static str {
        "Attach the raster value under each point feature as an attribute"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (raster, layer) = input;
        extract_values(&raster, &layer, &params.field)
    }
}
