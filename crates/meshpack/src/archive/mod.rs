//! ZIP archives of encoded meshes, standalone arrays and metadata.
//!
//! # Layout
//!
//! A combined archive holds:
//!
//! ```text
//! manifest.json            format, version, every mesh and array, metadata
//! <mesh>/manifest.json     that mesh's manifest on its own
//! <mesh>/vertices.bin      encoded vertex buffer
//! <mesh>/indices.bin       encoded index buffer
//! <mesh>/<attribute>.bin   one per extra array
//! <array>.bin              encoded standalone array
//! <array>.json             its ArrayMetadata
//! ```
//!
//! A single-mesh archive uses the per-mesh layout at the root, with the
//! format and version folded into its `manifest.json`.
//!
//! Loading reads the root manifest first and only then touches binary
//! entries, since dtype and shape are needed to reinterpret them.

mod entries;
pub mod manifest;

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use indexmap::IndexMap;
use meshpack_codec::{decode_array, encode_array_with, Array, ArrayMetadata, EncodedArray};
use serde_json::Value;

use crate::codec::{decode_object, decode_parts, encode_object, EncodedMesh, EncodedObject};
use crate::config::{ArchiveOptions, LoadOptions};
use crate::error::{MeshpackError, Result, ValidationError};
use crate::mesh::{MeshFileMetadata, MeshObject, MeshType};
use crate::registry::{construct_as, Constructor, MeshRegistry};
use crate::schema::attribute_name_error;
use entries::{EntryReader, EntryWriter};
pub use manifest::{
    ArchiveManifest, MeshManifest, SingleMeshManifest, FORMAT_NAME, FORMAT_VERSION,
    MANIFEST_ENTRY,
};

/// Named meshes and arrays with shared metadata, saved as one archive.
#[derive(Debug, Default)]
pub struct Bundle {
    /// Meshes by key.
    pub meshes: IndexMap<String, Box<dyn MeshObject>>,
    /// Standalone arrays by key.
    pub arrays: IndexMap<String, Array>,
    /// Free-form metadata.
    pub metadata: Value,
}

impl Bundle {
    /// Empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty bundle carrying `metadata`.
    pub fn with_metadata(metadata: Value) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Add or replace a mesh.
    pub fn insert_mesh(&mut self, key: impl Into<String>, mesh: impl MeshObject) -> &mut Self {
        self.meshes.insert(key.into(), Box::new(mesh));
        self
    }

    /// Add or replace an array.
    pub fn insert_array(&mut self, key: impl Into<String>, array: Array) -> &mut Self {
        self.arrays.insert(key.into(), array);
        self
    }

    /// Mesh stored under `key`, if it is a `T`.
    pub fn mesh<T: MeshObject>(&self, key: &str) -> Option<&T> {
        self.meshes.get(key).and_then(|m| m.downcast_ref::<T>())
    }

    /// Array stored under `key`.
    pub fn array(&self, key: &str) -> Option<&Array> {
        self.arrays.get(key)
    }
}

/// Reason `key` cannot name a mesh or array, if any.
pub fn key_error(key: &str) -> Option<String> {
    if key.is_empty() {
        Some("key is empty".into())
    } else if key.contains(['/', '\\']) {
        Some(format!("key {key:?} contains a path separator"))
    } else if key == "." || key == ".." {
        Some(format!("key {key:?} is not a valid entry name"))
    } else if key == "manifest" {
        Some("key \"manifest\" is reserved".into())
    } else {
        None
    }
}

fn mesh_entry(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}.bin")
}

fn write_mesh_entries<W: Write + Seek>(
    writer: &mut EntryWriter<W>,
    prefix: &str,
    encoded: &EncodedObject,
) -> Result<()> {
    writer.write_binary(&mesh_entry(prefix, "vertices"), &encoded.mesh.vertices.payload)?;
    writer.write_binary(&mesh_entry(prefix, "indices"), &encoded.mesh.indices.payload)?;
    for (name, array) in &encoded.extras {
        writer.write_binary(&mesh_entry(prefix, name), &array.payload)?;
    }
    Ok(())
}

fn read_mesh_entries<R: Read + Seek>(
    reader: &mut EntryReader<R>,
    prefix: &str,
    manifest: &MeshManifest,
) -> Result<EncodedObject> {
    let mut read = |name: &str, metadata: &ArrayMetadata| -> Result<EncodedArray> {
        Ok(EncodedArray {
            payload: reader.read_bytes(&mesh_entry(prefix, name))?,
            metadata: metadata.clone(),
        })
    };

    let vertices = read("vertices", &manifest.vertices)?;
    let indices = read("indices", &manifest.indices)?;
    let mut extras = IndexMap::with_capacity(manifest.mesh.extras.len());
    for (name, metadata) in &manifest.mesh.extras {
        if let Some(reason) = attribute_name_error(name) {
            return Err(MeshpackError::corrupt(mesh_entry(prefix, name), reason));
        }
        extras.insert(name.clone(), read(name, metadata)?);
    }

    Ok(EncodedObject {
        mesh: EncodedMesh {
            vertices,
            indices,
            metadata: manifest.mesh.clone(),
        },
        extras,
        model_data: manifest.model_data.clone(),
        file_metadata: manifest.file.clone(),
    })
}

fn resolve(
    identity: &MeshFileMetadata,
    registry: &MeshRegistry,
    options: &LoadOptions,
) -> Result<Constructor> {
    if let Some(constructor) = registry.resolve(identity) {
        return Ok(constructor);
    }
    match options.fallback {
        Some(fallback) => {
            tracing::warn!(class = %identity, "Mesh class not registered, using fallback");
            Ok(fallback)
        }
        None => Err(MeshpackError::ClassResolution {
            class_name: identity.class_name.clone(),
            module_name: identity.module_name.clone(),
        }),
    }
}

fn decode_entry(payload: &[u8], metadata: &ArrayMetadata, entry: &str) -> Result<Array> {
    Ok(decode_array(payload, metadata).map_err(|e| e.with_context(entry))?)
}

/// A bundle with every key checked and every payload encoded, ready to write.
struct Prepared<'a> {
    manifest: ArchiveManifest,
    meshes: Vec<(&'a str, EncodedObject)>,
    arrays: Vec<(&'a str, EncodedArray)>,
}

fn prepare_combined<'a>(bundle: &'a Bundle, options: &ArchiveOptions) -> Result<Prepared<'a>> {
    options.validate()?;

    let mut keys = ValidationError::new();
    for key in bundle.meshes.keys().chain(bundle.arrays.keys()) {
        if let Some(message) = key_error(key) {
            keys.push(key.as_str(), message);
        }
    }
    keys.into_result()?;

    let mut manifest = ArchiveManifest::new(bundle.metadata.clone());

    let mut meshes = Vec::with_capacity(bundle.meshes.len());
    for (key, mesh) in &bundle.meshes {
        let encoded = encode_object(mesh.as_ref(), &options.codec)?;
        manifest
            .meshes
            .insert(key.clone(), MeshManifest::for_object(&encoded));
        meshes.push((key.as_str(), encoded));
    }

    let mut arrays = Vec::with_capacity(bundle.arrays.len());
    for (key, array) in &bundle.arrays {
        let encoded = encode_array_with(array, &options.codec)
            .map_err(|e| e.with_context(format!("{key}.bin")))?;
        manifest
            .arrays
            .insert(key.clone(), encoded.metadata.clone());
        arrays.push((key.as_str(), encoded));
    }

    Ok(Prepared {
        manifest,
        meshes,
        arrays,
    })
}

fn write_combined<W: Write + Seek>(
    writer: W,
    prepared: &Prepared<'_>,
    options: &ArchiveOptions,
) -> Result<W> {
    let mut out = EntryWriter::new(writer, options);
    out.write_json(MANIFEST_ENTRY, &prepared.manifest)?;
    for (key, encoded) in &prepared.meshes {
        let prefix = format!("{key}/");
        out.write_json(
            &format!("{prefix}{MANIFEST_ENTRY}"),
            &prepared.manifest.meshes[*key],
        )?;
        write_mesh_entries(&mut out, &prefix, encoded)?;
    }
    for (key, encoded) in &prepared.arrays {
        out.write_json(&format!("{key}.json"), &encoded.metadata)?;
        out.write_binary(&format!("{key}.bin"), &encoded.payload)?;
    }
    let writer = out.finish()?;

    tracing::info!(
        meshes = prepared.meshes.len(),
        arrays = prepared.arrays.len(),
        "Saved combined archive"
    );
    Ok(writer)
}

/// Write a combined archive.
///
/// Every key and mesh is validated and encoded before the first byte is
/// written. If writing then fails, the output holds an unspecified partial
/// archive.
pub fn save_combined<W: Write + Seek>(
    writer: W,
    bundle: &Bundle,
    options: &ArchiveOptions,
) -> Result<W> {
    let prepared = prepare_combined(bundle, options)?;
    write_combined(writer, &prepared, options)
}

/// Write a combined archive to a file.
///
/// The file is only created once the bundle has been validated and encoded.
pub fn save_combined_to_path(
    path: impl AsRef<Path>,
    bundle: &Bundle,
    options: &ArchiveOptions,
) -> Result<()> {
    let prepared = prepare_combined(bundle, options)?;
    let file = BufWriter::new(File::create(path)?);
    write_combined(file, &prepared, options)?.flush()?;
    Ok(())
}

/// Write a combined archive into memory.
pub fn save_combined_to_bytes(bundle: &Bundle, options: &ArchiveOptions) -> Result<Vec<u8>> {
    Ok(save_combined(Cursor::new(Vec::new()), bundle, options)?.into_inner())
}

/// Read only the top-level manifest of a combined archive.
pub fn read_manifest<R: Read + Seek>(reader: R) -> Result<ArchiveManifest> {
    let mut entries = EntryReader::new(reader)?;
    let manifest: ArchiveManifest = entries.read_json(MANIFEST_ENTRY)?;
    manifest.check_format()?;
    Ok(manifest)
}

/// Names of every entry in an archive, in storage order.
pub fn entry_names<R: Read + Seek>(reader: R) -> Result<Vec<String>> {
    let entries = EntryReader::new(reader)?;
    let names = entries.names().map(str::to_owned).collect();
    Ok(names)
}

/// Read a combined archive.
///
/// Every mesh class is resolved against `registry` (or the fallback in
/// `options`) before any payload is decoded.
pub fn load_combined<R: Read + Seek>(
    reader: R,
    registry: &MeshRegistry,
    options: &LoadOptions,
) -> Result<Bundle> {
    let mut entries = EntryReader::new(reader)?;
    let manifest: ArchiveManifest = entries.read_json(MANIFEST_ENTRY)?;
    manifest.check_format()?;

    for key in manifest.meshes.keys().chain(manifest.arrays.keys()) {
        if let Some(reason) = key_error(key) {
            return Err(MeshpackError::corrupt(MANIFEST_ENTRY, reason));
        }
    }

    let constructors = manifest
        .meshes
        .values()
        .map(|m| resolve(&m.file, registry, options))
        .collect::<Result<Vec<_>>>()?;

    let mut meshes = IndexMap::with_capacity(manifest.meshes.len());
    for ((key, mesh_manifest), constructor) in manifest.meshes.iter().zip(constructors) {
        let encoded = read_mesh_entries(&mut entries, &format!("{key}/"), mesh_manifest)?;
        meshes.insert(key.clone(), decode_object(&encoded, constructor)?);
    }

    let mut arrays = IndexMap::with_capacity(manifest.arrays.len());
    for (key, metadata) in &manifest.arrays {
        let entry = format!("{key}.bin");
        let payload = entries.read_bytes(&entry)?;
        arrays.insert(key.clone(), decode_entry(&payload, metadata, &entry)?);
    }

    tracing::info!(
        meshes = meshes.len(),
        arrays = arrays.len(),
        "Loaded combined archive"
    );
    Ok(Bundle {
        meshes,
        arrays,
        metadata: manifest.metadata,
    })
}

/// Read a combined archive from a file.
pub fn load_combined_from_path(
    path: impl AsRef<Path>,
    registry: &MeshRegistry,
    options: &LoadOptions,
) -> Result<Bundle> {
    load_combined(BufReader::new(File::open(path)?), registry, options)
}

/// Read a combined archive from memory.
pub fn load_combined_from_bytes(
    bytes: &[u8],
    registry: &MeshRegistry,
    options: &LoadOptions,
) -> Result<Bundle> {
    load_combined(Cursor::new(bytes), registry, options)
}

fn prepare_mesh(mesh: &dyn MeshObject, options: &ArchiveOptions) -> Result<EncodedObject> {
    options.validate()?;
    encode_object(mesh, &options.codec)
}

fn write_mesh<W: Write + Seek>(
    writer: W,
    encoded: &EncodedObject,
    options: &ArchiveOptions,
) -> Result<W> {
    let manifest = SingleMeshManifest::new(MeshManifest::for_object(encoded));
    let mut out = EntryWriter::new(writer, options);
    out.write_json(MANIFEST_ENTRY, &manifest)?;
    write_mesh_entries(&mut out, "", encoded)?;
    let writer = out.finish()?;
    tracing::info!(class = %encoded.file_metadata, "Saved mesh archive");
    Ok(writer)
}

/// Write a single-mesh archive.
pub fn save_mesh<W: Write + Seek>(
    writer: W,
    mesh: &dyn MeshObject,
    options: &ArchiveOptions,
) -> Result<W> {
    let encoded = prepare_mesh(mesh, options)?;
    write_mesh(writer, &encoded, options)
}

/// Write a single-mesh archive to a file, created only once the mesh has
/// been validated and encoded.
pub fn save_mesh_to_path(
    path: impl AsRef<Path>,
    mesh: &dyn MeshObject,
    options: &ArchiveOptions,
) -> Result<()> {
    let encoded = prepare_mesh(mesh, options)?;
    let file = BufWriter::new(File::create(path)?);
    write_mesh(file, &encoded, options)?.flush()?;
    Ok(())
}

/// Write a single-mesh archive into memory.
pub fn save_mesh_to_bytes(mesh: &dyn MeshObject, options: &ArchiveOptions) -> Result<Vec<u8>> {
    Ok(save_mesh(Cursor::new(Vec::new()), mesh, options)?.into_inner())
}

fn open_single<R: Read + Seek>(reader: R) -> Result<(EntryReader<R>, MeshManifest)> {
    let mut entries = EntryReader::new(reader)?;
    let manifest: SingleMeshManifest = entries.read_json(MANIFEST_ENTRY)?;
    manifest.check_format()?;
    Ok((entries, manifest.mesh))
}

/// Read a single-mesh archive, resolving its class through `registry`.
pub fn load_mesh<R: Read + Seek>(
    reader: R,
    registry: &MeshRegistry,
    options: &LoadOptions,
) -> Result<Box<dyn MeshObject>> {
    let (mut entries, manifest) = open_single(reader)?;
    let constructor = resolve(&manifest.file, registry, options)?;
    let encoded = read_mesh_entries(&mut entries, "", &manifest)?;
    let object = decode_object(&encoded, constructor)?;
    tracing::info!(class = %manifest.file, "Loaded mesh archive");
    Ok(object)
}

/// Read a single-mesh archive that must hold a `T`.
///
/// Fails with a class-resolution error if the archive records another class.
pub fn load_mesh_as<T: MeshType, R: Read + Seek>(reader: R) -> Result<T> {
    let (mut entries, manifest) = open_single(reader)?;
    if manifest.file != MeshFileMetadata::of::<T>() {
        return Err(MeshpackError::ClassResolution {
            class_name: manifest.file.class_name,
            module_name: manifest.file.module_name,
        });
    }
    let encoded = read_mesh_entries(&mut entries, "", &manifest)?;
    construct_as::<T>(decode_parts(&encoded)?)
}

/// Read a single-mesh archive from a file.
pub fn load_mesh_from_path(
    path: impl AsRef<Path>,
    registry: &MeshRegistry,
    options: &LoadOptions,
) -> Result<Box<dyn MeshObject>> {
    load_mesh(BufReader::new(File::open(path)?), registry, options)
}

/// Read a single-mesh archive from memory.
pub fn load_mesh_from_bytes(
    bytes: &[u8],
    registry: &MeshRegistry,
    options: &LoadOptions,
) -> Result<Box<dyn MeshObject>> {
    load_mesh(Cursor::new(bytes), registry, options)
}
