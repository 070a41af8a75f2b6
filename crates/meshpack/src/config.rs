//! Archive and load options.

use std::path::Path;

use meshpack_codec::CodecOptions;
use serde::{Deserialize, Serialize};

use crate::error::{MeshpackError, Result};
use crate::mesh::{GenericMesh, MeshType};
use crate::registry::{construct, Constructor};

/// Options for writing archives.
///
/// Can be read from TOML:
///
/// ```toml
/// compress_manifests = true
/// pretty_manifests = false
///
/// [codec]
/// compression_level = 9
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Array codec tuning.
    pub codec: CodecOptions,
    /// Deflate JSON manifest entries. Binary entries are always stored, as
    /// their payloads are already compressed.
    pub compress_manifests: bool,
    /// Indent JSON manifests.
    pub pretty_manifests: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            codec: CodecOptions::default(),
            compress_manifests: true,
            pretty_manifests: true,
        }
    }
}

impl ArchiveOptions {
    /// Parse options from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let options: Self = toml::from_str(s).map_err(|e| MeshpackError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Read options from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate options.
    pub fn validate(&self) -> Result<()> {
        self.codec
            .validate()
            .map_err(|e| MeshpackError::Config(e.to_string()))
    }
}

/// Options for reading archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Constructor for classes the registry does not know. Without one,
    /// unknown classes fail with a class-resolution error.
    pub fallback: Option<Constructor>,
}

impl LoadOptions {
    /// Fall back to `T` for unknown classes.
    pub fn with_fallback<T: MeshType>() -> Self {
        Self {
            fallback: Some(construct::<T>),
        }
    }

    /// Fall back to [`GenericMesh`], which keeps every stored array and field.
    pub fn generic_fallback() -> Self {
        Self::with_fallback::<GenericMesh>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ArchiveOptions::default();
        assert_eq!(options.codec.compression_level, 6);
        assert!(options.compress_manifests);
        assert!(options.pretty_manifests);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn toml_overrides_and_defaults() {
        let options = ArchiveOptions::from_toml_str(
            r#"
            pretty_manifests = false

            [codec]
            compression_level = 9
            "#,
        )
        .unwrap();
        assert_eq!(options.codec.compression_level, 9);
        assert!(!options.pretty_manifests);
        assert!(options.compress_manifests);

        assert_eq!(
            ArchiveOptions::from_toml_str("").unwrap(),
            ArchiveOptions::default()
        );
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ArchiveOptions::from_toml_str("[codec]\ncompression_level = 11\n").unwrap_err();
        assert!(matches!(err, MeshpackError::Config(_)));

        let err = ArchiveOptions::from_toml_str("pretty_manifests = \"yes\"").unwrap_err();
        assert!(matches!(err, MeshpackError::Config(_)));
    }

    #[test]
    fn load_options_fallback() {
        assert!(LoadOptions::default().fallback.is_none());
        assert!(LoadOptions::generic_fallback().fallback.is_some());
    }
}
