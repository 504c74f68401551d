//! Vector analysis algorithms
//!
//! Operations between vector layers:
//! - Validate: detect and repair invalid geometries
//! - Predicate: DE-9IM relationships between geometry pairs
//! - Index: bounding-box candidate search
//! - Join: attribute join by spatial relationship
//! - Overlay: boolean set operations between polygon layers
//! - Buffer: grow geometries by a distance, proximity queries

mod buffer;
mod index;
mod join;
mod overlay;
mod predicate;
mod validate;

pub use buffer::{buffer, buffer_geometry, buffer_point, within_distance, Buffer, BufferParams};
pub use index::BoxIndex;
pub use join::{spatial_join, JoinHow, JoinOptions, SpatialJoin, SpatialJoinParams};
pub use overlay::{overlay, Overlay, OverlayMode, OverlayOptions, OverlayParams};
pub use predicate::SpatialPredicate;
pub use validate::{is_valid, repair_layer, validate_and_repair, validity, RepairGeometries};
