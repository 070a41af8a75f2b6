//! Error types for mesh encoding and archive I/O.

use std::fmt;

use meshpack_codec::CodecError;
use thiserror::Error;

/// One violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field, attribute or key the constraint applies to.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

/// Every constraint a mesh, field set or key set failed, collected in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// Violations in the order they were found.
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single violation.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(field, message);
        err
    }

    /// Record a violation.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Append every violation from `other`.
    pub fn extend(&mut self, other: ValidationError) {
        self.violations.extend(other.violations);
    }

    /// Whether nothing was violated.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether any violation names `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// `Ok(())` when empty, otherwise this error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(MeshpackError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Errors from mesh encoding, decoding and archive I/O.
#[derive(Error, Debug)]
pub enum MeshpackError {
    /// Array codec error.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A mesh or its fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationError),

    /// The archive names a mesh class the registry does not know.
    #[error("unknown mesh class {module_name}.{class_name}: register it or pass a fallback")]
    ClassResolution {
        /// Recorded class name.
        class_name: String,
        /// Recorded module name.
        module_name: String,
    },

    /// An archive entry is missing, unreadable or inconsistent.
    #[error("corrupt archive entry {entry}: {reason}")]
    CorruptData {
        /// Entry name.
        entry: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The mesh optimization library rejected its input.
    #[error("mesh optimization failed: {0}")]
    Optimization(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP container error while writing.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON error while writing a manifest.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MeshpackError {
    pub(crate) fn corrupt(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        MeshpackError::CorruptData {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error reports bytes that disagree with their metadata,
    /// or an archive entry that is missing or unreadable.
    pub fn is_corrupt(&self) -> bool {
        match self {
            MeshpackError::CorruptData { .. } => true,
            MeshpackError::Codec(e) => e.is_corrupt(),
            _ => false,
        }
    }

    /// The validation details, if this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            MeshpackError::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ValidationError> for MeshpackError {
    fn from(err: ValidationError) -> Self {
        MeshpackError::Validation(err)
    }
}

/// Result type for meshpack operations.
pub type Result<T> = std::result::Result<T, MeshpackError>;
