//! Vector data structures
//!
//! - `Feature`: geometry + typed attributes
//! - `VectorLayer`: features sharing one CRS, schema and geometry family
//! - `Schema`: ordered typed fields and the merge rules used by joins and overlays

mod attribute;
mod geometry;
mod layer;

pub use attribute::{AttributeValue, Field, FieldType, KeyCollision, Schema, SchemaMerge};
pub use geometry::{family_of, for_each_coord, normalize, BoundingBox, GeometryFamily};
pub use layer::{Feature, VectorLayer};
