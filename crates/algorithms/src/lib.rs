//! # Terrabind Algorithms
//!
//! Vector and raster analysis for Terrabind layers.
//!
//! ## Available Algorithm Categories
//!
//! - **reproject**: coordinate transforms between CRSs, layer harmonisation
//! - **vector**: validation and repair, spatial predicates, joins, overlays, buffers
//! - **raster**: point sampling, value extraction, polygon masks
//! - **statistics**: zonal statistics over polygon layers
//!
//! Every operation takes immutable inputs and returns a new value. Layers in
//! different CRSs are never reprojected implicitly; call
//! [`reproject::harmonize`] first.

mod maybe_rayon;

pub mod raster;
pub mod reproject;
pub mod statistics;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::raster::{
        extract_values, mask, sample, sample_points, sample_value, ExtractParams, ExtractValues, Mask,
        MaskParams, SampleValue,
    };
    pub use crate::reproject::{
        harmonize, reproject_coord, reproject_geometry, reproject_layer, CoordTransform, Reproject,
        ReprojectParams, Reprojector,
    };
    pub use crate::statistics::{zonal_statistics, ZonalResult, ZonalStatistics};
    pub use crate::vector::{
        buffer, buffer_geometry, overlay, repair_layer, spatial_join, validate_and_repair, within_distance,
        Buffer, BufferParams, JoinHow, JoinOptions, Overlay, OverlayMode, OverlayOptions, RepairGeometries,
        SpatialJoin, SpatialPredicate,
    };
    pub use terrabind_core::prelude::*;
}
