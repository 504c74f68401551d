//! Error types for Terrabind

use thiserror::Error;

/// Main error type for Terrabind operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    #[error("Unsupported transform: no path from {from} to {to}")]
    UnsupportedTransform { from: String, to: String },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Operation requires a projected CRS, got geographic {0}")]
    RequiresProjectedCrs(String),

    #[error("Unrepairable geometry: {reason}")]
    UnrepairableGeometry { reason: String },

    #[error("Invalid geometry at feature {index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },

    #[error("Schema conflict on '{field}': {left} vs {right}")]
    SchemaConflict {
        field: String,
        left: String,
        right: String,
    },

    #[error("Mixed geometry layer: expected {expected}, found {found}")]
    MixedGeometry { expected: String, found: String },

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Invalid coordinate ({x}, {y}): {reason}")]
    InvalidCoordinate { x: f64, y: f64, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Geotransform is not invertible")]
    DegenerateTransform,

    #[error("Geometries do not overlap the raster extent")]
    DisjointExtent,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Result type alias for Terrabind operations
pub type Result<T> = std::result::Result<T, Error>;

/// A per-feature failure recovered locally instead of aborting the operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Index of the offending feature in the input layer
    pub feature_index: usize,
    /// What went wrong
    pub error: Error,
}

/// An operation result carried together with its recovered failures.
#[derive(Debug, Clone)]
pub struct Processed<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Processed<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// True when nothing had to be dropped
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
