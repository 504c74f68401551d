//! Boundary traits for loading and saving layers
//!
//! Format codecs live outside this workspace. Hosts implement these traits
//! over whatever storage they use; [`MemoryStore`] is the in-process
//! implementation used by tests and by pipelines that never touch disk.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::raster::{Raster, RasterElement};
use crate::vector::VectorLayer;

/// Supplies fully materialised vector layers
pub trait VectorSource {
    fn load_vector(&self, source: &str) -> Result<VectorLayer>;
}

/// Persists vector layers
pub trait VectorSink {
    fn save_vector(&mut self, layer: &VectorLayer, destination: &str) -> Result<()>;
}

/// Supplies fully materialised rasters
pub trait RasterSource<T: RasterElement> {
    fn load_raster(&self, source: &str) -> Result<Raster<T>>;
}

/// Persists rasters
pub trait RasterSink<T: RasterElement> {
    fn save_raster(&mut self, raster: &Raster<T>, destination: &str) -> Result<()>;
}
