//! Error types for model construction, forward passes and checkpoint I/O.
//!
//! Construction-time problems abort with a message naming the offending field.
//! Per-batch numerical problems abort the current forward pass and carry the
//! timestep at which they were detected.

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum GlassError {
    /// Operand shapes do not match
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    Shape {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Non-finite hidden state detected while running the recurrence
    #[error("Hidden state has non-finite values at time point {timestep}")]
    NumericalInstability { timestep: usize },

    /// Transfer matrix norm fell below the configured floor (strict mode only)
    #[error("Degenerate transfer matrix at time point {timestep}: norm {norm:e} is below the floor")]
    DegenerateNormalization { timestep: usize, norm: f32 },

    /// Requested configuration or checkpoint does not fit this architecture
    #[error("Unsupported configuration `{field}`: {reason}")]
    UnsupportedConfiguration { field: String, reason: String },

    /// Checkpoint content could not be applied
    #[error("Checkpoint error at '{path}': {message}")]
    Checkpoint { path: String, message: String },

    /// I/O errors with path context
    #[error("IO error at '{path}': {message}")]
    Io { path: String, message: String },

    /// (De)serialization failures for configs and state dicts
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias used throughout the crate
pub type GlassResult<T> = std::result::Result<T, GlassError>;

impl GlassError {
    /// Whether the error should abort the whole run rather than a single call.
    ///
    /// Everything except I/O is fatal: the core has no retry logic of its own.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GlassError::Io { .. })
    }

    /// Timestep attached to numerical errors
    pub fn timestep(&self) -> Option<usize> {
        match self {
            GlassError::NumericalInstability { timestep } => Some(*timestep),
            GlassError::DegenerateNormalization { timestep, .. } => Some(*timestep),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GlassError {
    fn from(err: serde_json::Error) -> Self {
        GlassError::Serialization(err.to_string())
    }
}

/// Helper trait for adding path context to IO operations
pub trait IoResultExt<T> {
    fn with_path<P: AsRef<std::path::Path>>(self, path: P) -> GlassResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path<P: AsRef<std::path::Path>>(self, path: P) -> GlassResult<T> {
        self.map_err(|e| GlassError::Io {
            message: e.to_string(),
            path: path.as_ref().display().to_string(),
        })
    }
}

/// Helper for configuration errors
pub fn config_error(field: impl Into<String>, reason: impl Into<String>) -> GlassError {
    GlassError::UnsupportedConfiguration {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Helper for shape errors
pub fn shape_error(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> GlassError {
    GlassError::Shape {
        context: context.into(),
        expected: expected.to_vec(),
        actual: actual.to_vec(),
    }
}
