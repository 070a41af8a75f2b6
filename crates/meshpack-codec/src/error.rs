//! Error types for the array codec.

use thiserror::Error;

use crate::dtype::DType;

/// Errors from array construction, encoding, and decoding.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Element type tag outside the supported set.
    #[error("unsupported dtype: {dtype}")]
    UnsupportedType {
        /// The tag that could not be resolved.
        dtype: String,
    },

    /// Payload or decoded bytes disagree with the recorded metadata.
    #[error("corrupt data in {context}: {reason}")]
    CorruptData {
        /// Entry or buffer the data came from.
        context: String,
        /// What did not match.
        reason: String,
    },

    /// Element count does not fill the requested shape.
    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Requested shape.
        shape: Vec<usize>,
        /// Elements implied by the shape.
        expected: usize,
        /// Elements supplied.
        actual: usize,
    },

    /// Shape whose element count does not fit in `usize`.
    #[error("shape {shape:?} overflows the addressable size")]
    ShapeOverflow {
        /// Offending shape.
        shape: Vec<usize>,
    },

    /// Typed access with the wrong element type.
    #[error("dtype mismatch: array holds {actual}, requested {expected}")]
    DTypeMismatch {
        /// Requested element type.
        expected: DType,
        /// Element type stored in the array.
        actual: DType,
    },

    /// Codec options out of range.
    #[error("invalid codec options: {0}")]
    InvalidOptions(String),

    /// IO error from the compressor.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        CodecError::CorruptData {
            context: "payload".into(),
            reason: reason.into(),
        }
    }

    /// Attach the name of the entry being processed to a corrupt-data error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        match self {
            CodecError::CorruptData { reason, .. } => CodecError::CorruptData {
                context: context.into(),
                reason,
            },
            other => other,
        }
    }

    /// Whether this error reports bytes that disagree with their metadata.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, CodecError::CorruptData { .. })
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
