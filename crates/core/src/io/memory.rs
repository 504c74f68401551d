//! In-memory layer store

use super::{RasterSink, RasterSource, VectorSink, VectorSource};
use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use crate::vector::VectorLayer;
use std::collections::HashMap;

/// Named layers held in process memory
#[derive(Debug, Clone)]
pub struct MemoryStore<T: RasterElement = f64> {
    vectors: HashMap<String, VectorLayer>,
    rasters: HashMap<String, Raster<T>>,
}

impl<T: RasterElement> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            vectors: HashMap::new(),
            rasters: HashMap::new(),
        }
    }
}

impl<T: RasterElement> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of stored vector layers, sorted
    pub fn vector_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vectors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names of stored rasters, sorted
    pub fn raster_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rasters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn missing(kind: &str, name: &str) -> Error {
    Error::Io(format!("no {} named '{}'", kind, name))
}

impl<T: RasterElement> VectorSource for MemoryStore<T> {
    fn load_vector(&self, source: &str) -> Result<VectorLayer> {
        self.vectors.get(source).cloned().ok_or_else(|| missing("vector layer", source))
    }
}

impl<T: RasterElement> VectorSink for MemoryStore<T> {
    fn save_vector(&mut self, layer: &VectorLayer, destination: &str) -> Result<()> {
        self.vectors.insert(destination.to_string(), layer.clone());
        Ok(())
    }
}

impl<T: RasterElement> RasterSource<T> for MemoryStore<T> {
    fn load_raster(&self, source: &str) -> Result<Raster<T>> {
        self.rasters.get(source).cloned().ok_or_else(|| missing("raster", source))
    }
}

impl<T: RasterElement> RasterSink<T> for MemoryStore<T> {
    fn save_raster(&mut self, raster: &Raster<T>, destination: &str) -> Result<()> {
        self.rasters.insert(destination.to_string(), raster.clone());
        Ok(())
    }
}
