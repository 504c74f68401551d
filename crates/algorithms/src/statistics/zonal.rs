//! Zonal statistics
//!
//! Summarises the raster cells falling in each polygon of a zone layer.
//! A cell belongs to a zone when its centre lies in the closed polygon
//! region, the same rule the masker uses. No-data cells are skipped.

use crate::maybe_rayon::*;
use crate::raster::CellWindow;
use geo::{Intersects, Point};
use terrabind_core::raster::{Raster, RasterElement};
use terrabind_core::vector::{AttributeValue, BoundingBox, Feature, Field, FieldType, GeometryFamily, VectorLayer};
use terrabind_core::{Algorithm, Error, Result};
use tracing::debug;

/// Attribute names written by [`zonal_statistics`], in output order
pub const ZONAL_FIELDS: [&str; 5] = ["count", "sum", "mean", "min", "max"];

/// Statistics of the valid cells of one zone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalResult {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl ZonalResult {
    fn empty() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    /// Mean of the zone, `None` when no valid cell fell inside
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn attributes(&self) -> [AttributeValue; 5] {
        if self.count == 0 {
            return [
                AttributeValue::Number(0.0),
                AttributeValue::Null,
                AttributeValue::Null,
                AttributeValue::Null,
                AttributeValue::Null,
            ];
        }
        [
            AttributeValue::Number(self.count as f64),
            AttributeValue::Number(self.sum),
            self.mean().map_or(AttributeValue::Null, AttributeValue::Number),
            AttributeValue::Number(self.min),
            AttributeValue::Number(self.max),
        ]
    }
}

fn zone_result<T: RasterElement>(raster: &Raster<T>, zone: &Feature) -> ZonalResult {
    let mut acc = ZonalResult::empty();
    let (rows, cols) = raster.shape();
    let Some(window) = BoundingBox::of(&zone.geometry)
        .and_then(|bbox| CellWindow::covering(raster.transform(), &bbox, rows, cols))
    else {
        return acc;
    };

    let data = raster.data();
    for row in window.row0..window.row1 {
        for col in window.col0..window.col1 {
            let v = data[[row, col]];
            if raster.is_nodata(v) {
                continue;
            }
            let (x, y) = raster.pixel_to_geo(col, row);
            if !zone.geometry.intersects(&Point::new(x, y)) {
                continue;
            }
            if let Some(v) = v.to_f64() {
                acc.add(v);
            }
        }
    }
    acc
}

/// Per-zone statistics, one entry per feature of `zones` in layer order
pub fn zonal_results<T: RasterElement>(raster: &Raster<T>, zones: &VectorLayer) -> Result<Vec<ZonalResult>> {
    if raster.crs() != zones.crs() {
        return Err(Error::CrsMismatch(raster.crs().to_string(), zones.crs().to_string()));
    }
    match zones.family() {
        None | Some(GeometryFamily::Polygon) => {}
        Some(other) => {
            return Err(Error::UnsupportedGeometry(format!(
                "zonal statistics need polygon zones, got {}",
                other
            )));
        }
    }

    Ok(zones.features().par_iter().map(|zone| zone_result(raster, zone)).collect())
}

/// Copy of `zones` with `count`, `sum`, `mean`, `min` and `max` attributes.
///
/// Zones without any valid cell get a count of 0 and null statistics.
/// Fails with [`Error::SchemaConflict`] when a zone attribute already uses
/// one of those names.
pub fn zonal_statistics<T: RasterElement>(raster: &Raster<T>, zones: &VectorLayer) -> Result<VectorLayer> {
    let results = zonal_results(raster, zones)?;

    let mut schema = zones.schema().clone();
    for name in ZONAL_FIELDS {
        schema.push(Field::new(name, FieldType::Number))?;
    }

    let features: Vec<Feature> = zones
        .iter()
        .zip(&results)
        .map(|(zone, result)| {
            let mut out = zone.clone();
            for (name, value) in ZONAL_FIELDS.iter().zip(result.attributes()) {
                out.set_property(*name, value);
            }
            out
        })
        .collect();

    debug!(
        zones = zones.len(),
        empty = results.iter().filter(|r| r.count == 0).count(),
        "computed zonal statistics"
    );
    VectorLayer::with_schema(zones.crs().clone(), schema, features)
}

/// Zonal statistics algorithm over a (raster, zones) pair
#[derive(Debug, Clone, Default)]
pub struct ZonalStatistics;

impl Algorithm for ZonalStatistics {
    type Input = (Raster<f64>, VectorLayer);
    type Output = VectorLayer;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "ZonalStatistics"
    }

    fn description(&self) -> &'static str {
        "Count, sum, mean, min and max of raster cells inside each polygon"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        let (raster, zones) = input;
        zonal_statistics(&raster, &zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{point, polygon};
    use ndarray::array;
    use terrabind_core::raster::GeoTransform;
    use terrabind_core::CRS;

    fn grid() -> Raster<f64> {
        // 4x4, origin (0, 4), 1 m cells, one no-data cell at row 1 col 1
        Raster::from_array(
            array![
                [1.0, 2.0, 3.0, 4.0],
                [5.0, -9999.0, 7.0, 8.0],
                [9.0, 10.0, 11.0, 12.0],
                [13.0, 14.0, 15.0, 16.0],
            ],
            GeoTransform::new(0.0, 4.0, 1.0, -1.0),
            CRS::local(),
            -9999.0,
        )
        .unwrap()
    }

    fn zones() -> VectorLayer {
        VectorLayer::new(
            CRS::local(),
            vec![
                // Top-left 2x2 block
                Feature::new(polygon![(x: 0.0, y: 2.0), (x: 2.0, y: 2.0), (x: 2.0, y: 4.0), (x: 0.0, y: 4.0)])
                    .with_property("name", "nw"),
                // Bottom row
                Feature::new(polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 1.0), (x: 0.0, y: 1.0)])
                    .with_property("name", "south"),
                // Far away
                Feature::new(polygon![(x: 20.0, y: 20.0), (x: 21.0, y: 20.0), (x: 21.0, y: 21.0)])
                    .with_property("name", "none"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_zone_results() {
        let results = zonal_results(&grid(), &zones()).unwrap();
        assert_eq!(results.len(), 3);

        // 1, 2, 5 (the no-data cell skipped)
        assert_eq!(results[0].count, 3);
        assert_relative_eq!(results[0].sum, 8.0);
        assert_relative_eq!(results[0].min, 1.0);
        assert_relative_eq!(results[0].max, 5.0);

        assert_eq!(results[1].count, 4);
        assert_relative_eq!(results[1].mean().unwrap(), 14.5);

        assert_eq!(results[2].count, 0);
        assert!(results[2].mean().is_none());
    }

    #[test]
    fn test_zonal_statistics_layer() {
        let out = zonal_statistics(&grid(), &zones()).unwrap();
        assert_eq!(out.len(), 3);
        let names: Vec<&str> = out.schema().names().collect();
        assert_eq!(names, vec!["name", "count", "sum", "mean", "min", "max"]);

        let nw = out.get(0).unwrap();
        assert_eq!(nw.get_property("name"), Some(&AttributeValue::from("nw")));
        assert_eq!(nw.get_property("count"), Some(&AttributeValue::Number(3.0)));
        let mean = nw.get_property("mean").and_then(AttributeValue::as_f64).unwrap();
        assert_relative_eq!(mean, 8.0 / 3.0);

        let empty = out.get(2).unwrap();
        assert_eq!(empty.get_property("count"), Some(&AttributeValue::Number(0.0)));
        assert_eq!(empty.get_property("mean"), Some(&AttributeValue::Null));
        assert_eq!(empty.get_property("max"), Some(&AttributeValue::Null));
    }

    #[test]
    fn test_existing_field_conflicts() {
        let layer = VectorLayer::new(
            CRS::local(),
            vec![Feature::new(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)])
                .with_property("sum", 1.0)],
        )
        .unwrap();
        assert!(matches!(
            zonal_statistics(&grid(), &layer),
            Err(Error::SchemaConflict { .. })
        ));
    }

    #[test]
    fn test_rejects_point_zones() {
        let pts = VectorLayer::new(CRS::local(), vec![Feature::new(point!(x: 1.0, y: 1.0))]).unwrap();
        assert!(matches!(
            zonal_statistics(&grid(), &pts),
            Err(Error::UnsupportedGeometry(_))
        ));
    }
}
