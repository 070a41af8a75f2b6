//! Mesh codec: core buffers, extra arrays and plain fields.

use indexmap::IndexMap;
use meshpack_codec::{encode_array_with, ArrayMetadata, CodecOptions, DType, EncodedArray};
use serde::{Deserialize, Serialize};

use crate::error::{MeshpackError, Result, ValidationError};
use crate::mesh::{Mesh, MeshFileMetadata, MeshObject, MeshParts, ModelData, VERTEX_SIZE};
use crate::registry::Constructor;
use crate::schema::attribute_name_error;

/// Counts and layout of an encoded mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshMetadata {
    /// Number of vertices.
    pub vertex_count: usize,
    /// Number of indices.
    pub index_count: usize,
    /// Bytes per vertex.
    pub vertex_size: usize,
    /// Extra arrays by attribute name.
    #[serde(default)]
    pub extras: IndexMap<String, ArrayMetadata>,
}

/// Encoded core buffers of one mesh. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMesh {
    /// Encoded vertex buffer (`float32`, `[N, 3]`).
    pub vertices: EncodedArray,
    /// Encoded index buffer (`uint32`, `[M]`).
    pub indices: EncodedArray,
    /// Counts, layout and extra array metadata.
    pub metadata: MeshMetadata,
}

/// Everything stored for one mesh object.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedObject {
    /// Core buffers.
    pub mesh: EncodedMesh,
    /// Extra arrays by attribute name, matching `mesh.metadata.extras`.
    pub extras: IndexMap<String, EncodedArray>,
    /// Plain fields.
    pub model_data: ModelData,
    /// Class identity.
    pub file_metadata: MeshFileMetadata,
}

/// Encode the core buffers of a mesh.
///
/// Fails with a validation error before producing any bytes if an index
/// is out of bounds or the index count is not a multiple of 3.
pub fn encode_mesh(mesh: &Mesh, options: &CodecOptions) -> Result<EncodedMesh> {
    mesh.validate()?;

    let vertices = encode_array_with(&mesh.vertices_array()?, options)
        .map_err(|e| e.with_context("vertices"))?;
    let indices = encode_array_with(&mesh.indices_array(), options)
        .map_err(|e| e.with_context("indices"))?;

    Ok(EncodedMesh {
        vertices,
        indices,
        metadata: MeshMetadata {
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
            vertex_size: VERTEX_SIZE,
            extras: IndexMap::new(),
        },
    })
}

/// Encode a mesh object: core buffers, every extra array, plain fields.
pub fn encode_object(object: &dyn MeshObject, options: &CodecOptions) -> Result<EncodedObject> {
    let extra_arrays = object.extra_arrays();

    let mut names = ValidationError::new();
    for (i, (name, _)) in extra_arrays.iter().enumerate() {
        if let Some(message) = attribute_name_error(name) {
            names.push(name.as_str(), message);
        } else if extra_arrays[..i].iter().any(|(other, _)| other == name) {
            names.push(name.as_str(), "attribute appears more than once");
        }
    }
    names.into_result()?;

    let mut mesh = encode_mesh(object.core(), options)?;

    let mut extras = IndexMap::with_capacity(extra_arrays.len());
    for (name, array) in &extra_arrays {
        let encoded =
            encode_array_with(array, options).map_err(|e| e.with_context(name.as_str()))?;
        mesh.metadata
            .extras
            .insert(name.clone(), encoded.metadata.clone());
        extras.insert(name.clone(), encoded);
    }

    Ok(EncodedObject {
        mesh,
        extras,
        model_data: object.model_data(),
        file_metadata: object.file_metadata(),
    })
}

fn check_core(encoded: &EncodedArray, name: &str, dtype: DType, shape: &[usize]) -> Result<()> {
    let metadata = &encoded.metadata;
    if metadata.dtype != dtype || metadata.shape != shape {
        return Err(MeshpackError::corrupt(
            name,
            format!(
                "expected {dtype} {shape:?}, metadata records {} {:?}",
                metadata.dtype, metadata.shape
            ),
        ));
    }
    Ok(())
}

/// Decode core buffers back into a [`Mesh`].
///
/// The decoded index buffer is validated like [`Mesh::new`] does.
pub fn decode_mesh(encoded: &EncodedMesh) -> Result<Mesh> {
    let metadata = &encoded.metadata;
    if metadata.vertex_size != VERTEX_SIZE {
        return Err(MeshpackError::corrupt(
            "vertices",
            format!(
                "vertex size {} is not supported, expected {VERTEX_SIZE}",
                metadata.vertex_size
            ),
        ));
    }
    check_core(
        &encoded.vertices,
        "vertices",
        DType::F32,
        &[metadata.vertex_count, 3],
    )?;
    check_core(
        &encoded.indices,
        "indices",
        DType::U32,
        &[metadata.index_count],
    )?;

    let vertices = encoded
        .vertices
        .decode()
        .map_err(|e| e.with_context("vertices"))?
        .to_vec::<f32>()?;
    let indices = encoded
        .indices
        .decode()
        .map_err(|e| e.with_context("indices"))?
        .to_vec::<u32>()?;

    let vertices = vertices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    let mesh = Mesh { vertices, indices };
    mesh.validate()?;
    Ok(mesh)
}

/// Decode an encoded object into parts, without choosing a type.
pub fn decode_parts(encoded: &EncodedObject) -> Result<MeshParts> {
    let mesh = decode_mesh(&encoded.mesh)?;

    let mut arrays = IndexMap::with_capacity(encoded.extras.len());
    for (name, array) in &encoded.extras {
        let decoded = array.decode().map_err(|e| e.with_context(name.as_str()))?;
        arrays.insert(name.clone(), decoded);
    }

    Ok(MeshParts {
        mesh,
        arrays,
        model_data: encoded.model_data.clone(),
        file_metadata: encoded.file_metadata.clone(),
    })
}

/// Decode an encoded object and rebuild it with `constructor`.
pub fn decode_object(
    encoded: &EncodedObject,
    constructor: Constructor,
) -> Result<Box<dyn MeshObject>> {
    constructor(decode_parts(encoded)?)
}

impl Mesh {
    /// Encode with default codec options.
    pub fn encode(&self) -> Result<EncodedMesh> {
        encode_mesh(self, &CodecOptions::default())
    }
}

impl EncodedMesh {
    /// Decode back into a [`Mesh`].
    pub fn decode(&self) -> Result<Mesh> {
        decode_mesh(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{GenericMesh, MeshType};
    use crate::registry::construct;
    use crate::schema::FieldDescriptor;
    use meshpack_codec::Array;
    use quickcheck_macros::quickcheck;
    use serde_json::{json, Value};

    fn quad() -> Mesh {
        Mesh::new(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
        .unwrap()
    }

    #[derive(Debug, Clone, PartialEq)]
    struct ColoredMesh {
        mesh: Mesh,
        colors: Vec<u8>,
        label: String,
    }

    impl MeshObject for ColoredMesh {
        fn file_metadata(&self) -> MeshFileMetadata {
            MeshFileMetadata::of::<Self>()
        }

        fn core(&self) -> &Mesh {
            &self.mesh
        }

        fn core_mut(&mut self) -> &mut Mesh {
            &mut self.mesh
        }

        fn extra_arrays(&self) -> Vec<(String, Array)> {
            let colors = Array::from_slice([self.mesh.vertex_count(), 4], &self.colors)
                .expect("four channels per vertex");
            vec![("colors".into(), colors)]
        }

        fn model_data(&self) -> ModelData {
            let mut data = ModelData::new();
            data.insert("label".into(), Value::String(self.label.clone()));
            data
        }
    }

    impl MeshType for ColoredMesh {
        const CLASS_NAME: &'static str = "ColoredMesh";
        const MODULE_NAME: &'static str = "codec_tests";

        fn fields() -> &'static [FieldDescriptor] {
            const FIELDS: &[FieldDescriptor] = &[
                FieldDescriptor::array("colors", DType::U8, 2),
                FieldDescriptor::string("label"),
            ];
            FIELDS
        }

        fn from_parts(mut parts: MeshParts) -> Result<Self> {
            Ok(Self {
                colors: parts.take_array("colors")?.to_vec()?,
                label: parts.take_field("label")?,
                mesh: parts.mesh,
            })
        }
    }

    fn colored() -> ColoredMesh {
        ColoredMesh {
            mesh: quad(),
            colors: (0..16).collect(),
            label: "tile".into(),
        }
    }

    #[test]
    fn core_roundtrip() {
        let mesh = quad();
        let encoded = mesh.encode().unwrap();
        assert_eq!(encoded.metadata.vertex_count, 4);
        assert_eq!(encoded.metadata.index_count, 6);
        assert_eq!(encoded.metadata.vertex_size, 12);
        assert_eq!(encoded.vertices.metadata.shape, vec![4, 3]);
        assert_eq!(encoded.indices.metadata.dtype, DType::U32);
        assert_eq!(encoded.decode().unwrap(), mesh);
    }

    #[test]
    fn empty_mesh_roundtrip() {
        let mesh = Mesh::default();
        assert_eq!(mesh.encode().unwrap().decode().unwrap(), mesh);
    }

    #[test]
    fn out_of_bounds_index_fails_before_encoding() {
        let mesh = Mesh {
            vertices: vec![[0.0; 3]; 3],
            indices: vec![0, 1, 3],
        };
        let err = mesh.encode().unwrap_err();
        assert!(err.validation().unwrap().mentions("indices"));
    }

    #[test]
    fn subclass_roundtrip() {
        let original = colored();
        let encoded = encode_object(&original, &CodecOptions::default()).unwrap();
        assert_eq!(
            encoded.mesh.metadata.extras.keys().collect::<Vec<_>>(),
            vec!["colors"]
        );
        assert_eq!(encoded.model_data["label"], json!("tile"));
        assert_eq!(encoded.file_metadata.qualified_name(), "codec_tests.ColoredMesh");

        let object = decode_object(&encoded, construct::<ColoredMesh>).unwrap();
        let restored = object.downcast::<ColoredMesh>().unwrap();
        assert_eq!(*restored, original);
    }

    #[test]
    fn generic_constructor_keeps_everything() {
        let encoded = encode_object(&colored(), &CodecOptions::default()).unwrap();
        let object = decode_object(&encoded, construct::<GenericMesh>).unwrap();
        let generic = object.downcast_ref::<GenericMesh>().unwrap();
        assert_eq!(generic.identity, MeshFileMetadata::of::<ColoredMesh>());
        assert_eq!(generic.arrays["colors"].shape(), &[4, 4]);
        assert_eq!(generic.model_data["label"], json!("tile"));
    }

    #[test]
    fn missing_field_fails_validation() {
        let mut encoded = encode_object(&colored(), &CodecOptions::default()).unwrap();
        encoded.model_data.clear();
        let err = decode_object(&encoded, construct::<ColoredMesh>).unwrap_err();
        assert!(err.validation().unwrap().mentions("label"));
    }

    #[test]
    fn reserved_extra_name_is_rejected() {
        let mut generic = GenericMesh::from(quad());
        generic
            .arrays
            .insert("indices".into(), Array::from_values(&[1u32]));
        let err = encode_object(&generic, &CodecOptions::default()).unwrap_err();
        assert!(err.validation().unwrap().mentions("indices"));
    }

    #[test]
    fn truncated_vertices_are_corrupt() {
        let mut encoded = quad().encode().unwrap();
        encoded.vertices.payload.pop();
        let err = encoded.decode().unwrap_err();
        assert!(err.is_corrupt(), "unexpected error: {err}");
        assert!(err.to_string().contains("vertices"));
    }

    #[test]
    fn mismatched_core_metadata_is_corrupt() {
        let mut encoded = quad().encode().unwrap();
        encoded.metadata.vertex_count = 5;
        assert!(encoded.decode().unwrap_err().is_corrupt());

        let mut encoded = quad().encode().unwrap();
        encoded.metadata.vertex_size = 16;
        assert!(encoded.decode().unwrap_err().is_corrupt());
    }

    #[quickcheck]
    fn valid_meshes_roundtrip(points: Vec<(i16, i16, i16)>, raw: Vec<u32>) -> bool {
        let vertices: Vec<[f32; 3]> = points
            .iter()
            .map(|&(x, y, z)| [f32::from(x) / 8.0, f32::from(y), f32::from(z) * 0.5])
            .collect();
        let indices: Vec<u32> = if vertices.is_empty() {
            Vec::new()
        } else {
            let len = raw.len() / 3 * 3;
            raw[..len]
                .iter()
                .map(|i| i % vertices.len() as u32)
                .collect()
        };
        let mesh = Mesh::new(vertices, indices).unwrap();
        mesh.encode().unwrap().decode().unwrap() == mesh
    }
}
