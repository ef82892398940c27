//! Error types for scene documents.

use thiserror::Error;

/// Errors loading or resolving a scene document.
#[derive(Error, Debug)]
pub enum IrError {
    /// The document is not valid JSON or does not match the schema.
    #[error("invalid scene document: {0}")]
    Json(#[from] serde_json::Error),

    /// A `Ref` names a shape that is not in the library.
    #[error("unknown library shape: {0:?}")]
    UnknownShape(String),

    /// Library shapes reference each other in a cycle.
    #[error("cyclic library reference through {0:?}")]
    CyclicReference(String),

    /// A primitive has negative or non-finite dimensions.
    #[error("invalid {what}: {reason}")]
    InvalidDimensions {
        /// Which primitive.
        what: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Reading the document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for IR operations.
pub type Result<T> = std::result::Result<T, IrError>;
