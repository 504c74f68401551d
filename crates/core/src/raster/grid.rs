//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a row-major grid together with
/// the transform that places it in its CRS and the sentinel marking cells
/// without a valid measurement. Rasters are immutable once built; operations
/// return new rasters.
///
/// # Example
///
/// ```ignore
/// use terrabind_core::{GeoTransform, Raster, CRS};
///
/// let dem: Raster<f32> = Raster::filled(
///     100, 100, 0.0,
///     GeoTransform::new(500_000.0, 4_100_000.0, 30.0, -30.0),
///     CRS::utm(33, true)?,
///     -9999.0,
/// )?;
/// let value = dem.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: CRS,
    /// No-data sentinel
    nodata: T,
}

impl<T: RasterElement> Raster<T> {
    /// Create a raster from an ndarray, validating dimensions and transform
    pub fn from_array(data: Array2<T>, transform: GeoTransform, crs: CRS, nodata: T) -> Result<Self> {
        let (rows, cols) = data.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions { width: cols, height: rows });
        }
        transform.ensure_invertible()?;

        Ok(Self { data, transform, crs, nodata })
    }

    /// Create a new raster filled with a specific value
    pub fn filled(
        rows: usize,
        cols: usize,
        value: T,
        transform: GeoTransform,
        crs: CRS,
        nodata: T,
    ) -> Result<Self> {
        Self::from_array(Array2::from_elem((rows, cols), value), transform, crs, nodata)
    }

    /// Create a raster from row-major data
    pub fn from_vec(
        data: Vec<T>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        crs: CRS,
        nodata: T,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Self::from_array(array, transform, crs, nodata)
    }

    /// Same georeferencing, new cells
    pub fn with_data(&self, data: Array2<T>, transform: GeoTransform) -> Result<Self> {
        Self::from_array(data, transform, self.crs.clone(), self.nodata)
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for a constructed raster; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Get the CRS
    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Get the no-data sentinel
    pub fn nodata(&self) -> T {
        self.nodata
    }

    /// CRS bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Coordinate conversion

    /// Cell centre of (col, row) in CRS coordinates
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Convert CRS coordinates to fractional pixel coordinates
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// (row, col) of the cell containing a CRS coordinate, if inside the grid
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        self.transform
            .cell_at(x, y, self.cols(), self.rows())
            .map(|(col, row)| (row, col))
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(data: Vec<f32>, rows: usize, cols: usize) -> Raster<f32> {
        Raster::from_vec(
            data,
            rows,
            cols,
            GeoTransform::new(0.0, rows as f64, 1.0, -1.0),
            CRS::local(),
            -9999.0,
        )
        .unwrap()
    }

    #[test]
    fn test_raster_creation() {
        let raster = grid(vec![0.0; 100 * 200], 100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_rejects_empty_and_degenerate() {
        let empty = Raster::<f32>::filled(0, 5, 1.0, GeoTransform::default(), CRS::local(), 0.0);
        assert!(matches!(empty, Err(Error::InvalidDimensions { .. })));

        let flat = Raster::<f32>::filled(2, 2, 1.0, GeoTransform::new(0.0, 0.0, 0.0, -1.0), CRS::local(), 0.0);
        assert!(matches!(flat, Err(Error::DegenerateTransform)));

        let short = Raster::<f32>::from_vec(vec![1.0; 3], 2, 2, GeoTransform::default(), CRS::local(), 0.0);
        assert!(matches!(short, Err(Error::InvalidDimensions { .. })));
    }

    #[test]
    fn test_raster_access() {
        let raster = grid((0..16).map(|v| v as f32).collect(), 4, 4);
        assert_eq!(raster.get(1, 2).unwrap(), 6.0);
        assert!(raster.get(4, 0).is_err());
        assert_eq!(raster.cell_at(2.5, 2.5), Some((1, 2)));
    }

    #[test]
    fn test_raster_statistics() {
        let mut data: Vec<f32> = (0..100).map(|v| v as f32).collect();
        data[0] = -9999.0;
        let raster = grid(data, 10, 10);

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }
}
