#![warn(missing_docs)]

//! Mesh containers with a compact codec and ZIP archive bundles.
//!
//! A [`Mesh`] holds an `f32` vertex buffer and a `u32` triangle index
//! buffer. Richer mesh types implement [`MeshType`] to carry extra arrays
//! and plain fields; the codec stores them next to the core buffers and
//! records the type's identity so a [`MeshRegistry`] can rebuild it.
//!
//! Archives come in two layouts:
//!
//! - a single mesh: [`archive::save_mesh`] / [`archive::load_mesh`]
//! - a [`Bundle`] of named meshes, standalone arrays and JSON metadata:
//!   [`archive::save_combined`] / [`archive::load_combined`]
//!
//! In-place optimization ([`Mesh::optimize`], [`Mesh::simplify`]) uses
//! meshoptimizer.
//!
//! # Example
//!
//! ```
//! use meshpack::archive::{load_mesh_from_bytes, save_mesh_to_bytes};
//! use meshpack::{ArchiveOptions, LoadOptions, Mesh, MeshRegistry};
//!
//! let mesh = Mesh::new(
//!     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
//!     vec![0, 1, 2],
//! )?;
//! let bytes = save_mesh_to_bytes(&mesh, &ArchiveOptions::default())?;
//!
//! let loaded = load_mesh_from_bytes(&bytes, &MeshRegistry::with_builtin(), &LoadOptions::default())?;
//! assert_eq!(loaded.downcast_ref::<Mesh>(), Some(&mesh));
//! # Ok::<(), meshpack::MeshpackError>(())
//! ```

pub mod archive;
pub mod codec;
pub mod config;
pub mod error;
pub mod mesh;
pub mod optimize;
pub mod registry;
pub mod schema;

pub use archive::Bundle;
pub use codec::{
    decode_mesh, decode_object, decode_parts, encode_mesh, encode_object, EncodedMesh,
    EncodedObject, MeshMetadata,
};
pub use config::{ArchiveOptions, LoadOptions};
pub use error::{MeshpackError, Result, ValidationError, Violation};
pub use mesh::{
    GenericMesh, Mesh, MeshFileMetadata, MeshObject, MeshParts, MeshType, ModelData, VERTEX_SIZE,
};
pub use registry::{construct, construct_as, Constructor, MeshRegistry};
pub use schema::{FieldDescriptor, FieldKind};

pub use meshpack_codec::{
    decode_array, encode_array, encode_array_with, Array, ArrayMetadata, CodecError,
    CodecOptions, DType, EncodedArray, Element,
};
