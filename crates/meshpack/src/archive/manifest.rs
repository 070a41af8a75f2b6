//! JSON manifests stored alongside the binary entries.

use indexmap::IndexMap;
use meshpack_codec::ArrayMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{EncodedObject, MeshMetadata};
use crate::error::{MeshpackError, Result};
use crate::mesh::{MeshFileMetadata, ModelData};

/// Format name recorded in every top-level manifest.
pub const FORMAT_NAME: &str = "meshpack";

/// Current archive layout version.
pub const FORMAT_VERSION: u32 = 1;

/// Name of the manifest entry, at the root and inside each mesh directory.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Everything needed to decode one stored mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshManifest {
    /// Class identity.
    #[serde(flatten)]
    pub file: MeshFileMetadata,
    /// Counts, layout and extra array metadata.
    #[serde(flatten)]
    pub mesh: MeshMetadata,
    /// Vertex buffer metadata.
    pub vertices: ArrayMetadata,
    /// Index buffer metadata.
    pub indices: ArrayMetadata,
    /// Plain fields.
    #[serde(default)]
    pub model_data: ModelData,
}

impl MeshManifest {
    /// Manifest describing an encoded object.
    pub fn for_object(encoded: &EncodedObject) -> Self {
        Self {
            file: encoded.file_metadata.clone(),
            mesh: encoded.mesh.metadata.clone(),
            vertices: encoded.mesh.vertices.metadata.clone(),
            indices: encoded.mesh.indices.metadata.clone(),
            model_data: encoded.model_data.clone(),
        }
    }
}

/// Top-level manifest of a combined archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Always [`FORMAT_NAME`].
    pub format: String,
    /// Layout version.
    pub version: u32,
    /// Stored meshes by key.
    #[serde(default)]
    pub meshes: IndexMap<String, MeshManifest>,
    /// Stored standalone arrays by key.
    #[serde(default)]
    pub arrays: IndexMap<String, ArrayMetadata>,
    /// Caller-supplied metadata.
    #[serde(default)]
    pub metadata: Value,
}

impl ArchiveManifest {
    /// Empty manifest for the current format.
    pub fn new(metadata: Value) -> Self {
        Self {
            format: FORMAT_NAME.into(),
            version: FORMAT_VERSION,
            meshes: IndexMap::new(),
            arrays: IndexMap::new(),
            metadata,
        }
    }

    /// Reject manifests written by another tool or a newer layout.
    pub fn check_format(&self) -> Result<()> {
        check_format(&self.format, self.version)
    }
}

/// Root manifest of a single-mesh archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleMeshManifest {
    /// Always [`FORMAT_NAME`].
    pub format: String,
    /// Layout version.
    pub version: u32,
    /// The stored mesh.
    #[serde(flatten)]
    pub mesh: MeshManifest,
}

impl SingleMeshManifest {
    /// Wrap a mesh manifest for the current format.
    pub fn new(mesh: MeshManifest) -> Self {
        Self {
            format: FORMAT_NAME.into(),
            version: FORMAT_VERSION,
            mesh,
        }
    }

    /// Reject manifests written by another tool or a newer layout.
    pub fn check_format(&self) -> Result<()> {
        check_format(&self.format, self.version)
    }
}

fn check_format(format: &str, version: u32) -> Result<()> {
    if format != FORMAT_NAME {
        return Err(MeshpackError::corrupt(
            MANIFEST_ENTRY,
            format!("format is {format:?}, expected {FORMAT_NAME:?}"),
        ));
    }
    if version != FORMAT_VERSION {
        return Err(MeshpackError::corrupt(
            MANIFEST_ENTRY,
            format!("layout version {version} is not supported, expected {FORMAT_VERSION}"),
        ));
    }
    Ok(())
}
