//! Raster statistics aggregated over vector zones
//!
//! - **zonal**: count, sum, mean, min and max of the cells inside each polygon

mod zonal;

pub use zonal::{zonal_results, zonal_statistics, ZonalResult, ZonalStatistics, ZONAL_FIELDS};
