//! Error types for scene conversion.

use serde::{Serialize, Serializer};
use shapegraph_kernel::MeshError;
use thiserror::Error;

/// Errors that can occur while converting a scene.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// A per-object override list disagrees in length with the object list.
    #[error("{field} has {actual} entries but there are {expected} objects")]
    LengthMismatch {
        /// Which list (`names`, `colors` or `alphas`).
        field: &'static str,
        /// Number of objects.
        expected: usize,
        /// Length of the list.
        actual: usize,
    },

    /// An input object matches no dispatch case.
    #[error("{name}: unsupported object of type {type_name}")]
    UnsupportedType {
        /// Path of the object in the scene.
        name: String,
        /// Type name reported by the classifier.
        type_name: String,
    },

    /// A sequence or shape resolved to nothing renderable.
    #[error("{name}: empty input")]
    EmptyInput {
        /// Path of the object in the scene.
        name: String,
    },

    /// The kernel failed to mesh a shape.
    #[error("mesh generation failed for {target}: {reason}")]
    MeshGenerationFailed {
        /// `instance <index>`, or the build path of an inline leaf.
        target: String,
        /// Kernel error.
        reason: MeshError,
    },

    /// An internal invariant does not hold.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Invalid conversion options.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Options file is not valid TOML.
    #[error("invalid options file: {0}")]
    Config(#[from] toml::de::Error),

    /// Reading an options file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// A non-fatal problem recorded during conversion.
#[derive(Debug, Serialize)]
pub struct Diagnostic {
    /// Build path of the input object: `/` followed by explicit names,
    /// mapping keys or `[index]` positions.
    pub path: String,
    /// What went wrong.
    #[serde(serialize_with = "display")]
    pub error: ConvertError,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(path: impl Into<String>, error: ConvertError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

fn display<S: Serializer>(error: &ConvertError, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
