//! # Terrabind Core
//!
//! Core types and traits for the Terrabind geospatial analysis library.
//!
//! This crate provides:
//! - `CRS` and `CrsRegistry`: coordinate reference systems resolved to transform parameters
//! - `VectorLayer`, `Feature`, `Schema`: immutable vector data with typed attributes
//! - `Raster<T>` and `GeoTransform`: georeferenced grids with a no-data sentinel
//! - `io`: boundary traits for hosts that load and save layers
//! - Algorithm traits for consistent API

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{CrsRegistry, CRS};
pub use error::{Diagnostic, Error, Processed, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{AttributeValue, Feature, GeometryFamily, Schema, VectorLayer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CrsRegistry, CRS};
    pub use crate::error::{Diagnostic, Error, Processed, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{
        AttributeValue, BoundingBox, Feature, Field, FieldType, GeometryFamily, KeyCollision, Schema,
        VectorLayer,
    };
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in Terrabind.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
