//! Mesh model: the core vertex/index buffers and the types built on them.
//!
//! [`Mesh`] is the base type. Richer mesh types carry extra arrays (UVs,
//! normals, per-face data) and plain fields (names, flags) next to a core
//! `Mesh`; they expose them through [`MeshObject`] and are rebuilt from a
//! [`MeshParts`] decomposition through [`MeshType::from_parts`].

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;
use meshpack_codec::Array;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MeshpackError, Result, ValidationError};
use crate::schema::FieldDescriptor;

/// Bytes per vertex in the core vertex buffer (three `f32`).
pub const VERTEX_SIZE: usize = std::mem::size_of::<[f32; 3]>();

/// Non-array fields of a mesh, kept as ordered JSON.
pub type ModelData = serde_json::Map<String, Value>;

/// Class identity recorded for every stored mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshFileMetadata {
    /// Type name.
    pub class_name: String,
    /// Namespace the type is defined in.
    pub module_name: String,
}

impl MeshFileMetadata {
    /// Identity from explicit names.
    pub fn new(class_name: impl Into<String>, module_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            module_name: module_name.into(),
        }
    }

    /// Identity of a registered mesh type.
    pub fn of<T: MeshType>() -> Self {
        Self::new(T::CLASS_NAME, T::MODULE_NAME)
    }

    /// `module.class`, the registry key.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_name, self.class_name)
    }
}

impl fmt::Display for MeshFileMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module_name, self.class_name)
    }
}

/// Triangle mesh: `N` positions and `M` indices, `M` a multiple of 3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<[f32; 3]>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh, validating the index buffer.
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Result<Self> {
        let mesh = Self { vertices, indices };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Create a mesh from flat `x, y, z` triplets.
    pub fn from_flat(positions: &[f32], indices: Vec<u32>) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(ValidationError::single(
                "vertices",
                format!("{} floats do not form xyz triplets", positions.len()),
            )
            .into());
        }
        let vertices = positions
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self::new(vertices, indices)
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Collect every violated core invariant.
    pub fn check(&self) -> ValidationError {
        let mut err = ValidationError::new();

        if self.indices.len() % 3 != 0 {
            err.push(
                "indices",
                format!("length {} is not a multiple of 3", self.indices.len()),
            );
        }

        let vertex_count = self.vertices.len();
        let mut out_of_bounds = self
            .indices
            .iter()
            .enumerate()
            .filter(|&(_, &i)| i as usize >= vertex_count);
        if let Some((position, &index)) = out_of_bounds.next() {
            let total = 1 + out_of_bounds.count();
            err.push(
                "indices",
                format!(
                    "index {index} at position {position} is out of bounds for {vertex_count} vertices ({total} out of bounds)"
                ),
            );
        }

        if u32::try_from(vertex_count).is_err() {
            err.push(
                "vertices",
                format!("{vertex_count} vertices cannot be addressed by 32-bit indices"),
            );
        }

        err
    }

    /// Check the core invariants: index count divisible by 3, every index
    /// below the vertex count.
    pub fn validate(&self) -> Result<()> {
        self.check().into_result()
    }

    /// Vertex buffer as a `float32` array of shape `[N, 3]`.
    pub fn vertices_array(&self) -> Result<Array> {
        let flat: &[f32] = bytemuck::cast_slice(&self.vertices);
        Ok(Array::from_slice([self.vertices.len(), 3], flat)?)
    }

    /// Index buffer as a `uint32` array of shape `[M]`.
    pub fn indices_array(&self) -> Array {
        Array::from_values(&self.indices)
    }
}

/// A mesh instance split into its core buffers, extra arrays and plain fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshParts {
    /// Core buffers.
    pub mesh: Mesh,
    /// Extra array attributes, in declaration order.
    pub arrays: IndexMap<String, Array>,
    /// Non-array fields.
    pub model_data: ModelData,
    /// Identity the parts were recorded under.
    pub file_metadata: MeshFileMetadata,
}

impl MeshParts {
    /// Parts holding only core buffers.
    pub fn new(mesh: Mesh, file_metadata: MeshFileMetadata) -> Self {
        Self {
            mesh,
            arrays: IndexMap::new(),
            model_data: ModelData::new(),
            file_metadata,
        }
    }

    /// Decompose a mesh object.
    pub fn from_object(object: &dyn MeshObject) -> Self {
        Self {
            mesh: object.core().clone(),
            arrays: object.extra_arrays().into_iter().collect(),
            model_data: object.model_data(),
            file_metadata: object.file_metadata(),
        }
    }

    /// Remove an extra array.
    pub fn take_array(&mut self, name: &str) -> Result<Array> {
        self.arrays
            .shift_remove(name)
            .ok_or_else(|| ValidationError::single(name, "missing required array").into())
    }

    /// Remove an optional extra array.
    pub fn take_optional_array(&mut self, name: &str) -> Option<Array> {
        self.arrays.shift_remove(name)
    }

    /// Remove a plain field and deserialize it.
    pub fn take_field<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let value = self
            .model_data
            .shift_remove(name)
            .ok_or_else(|| MeshpackError::from(ValidationError::single(name, "missing required field")))?;
        serde_json::from_value(value)
            .map_err(|e| ValidationError::single(name, e.to_string()).into())
    }

    /// Remove an optional plain field; `null` counts as absent.
    pub fn take_optional_field<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>> {
        match self.model_data.shift_remove(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ValidationError::single(name, e.to_string()).into()),
        }
    }
}

/// Lets trait objects be downcast to their concrete type.
pub trait AsAny: Any {
    /// Borrow as [`Any`].
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Convert into a boxed [`Any`].
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A mesh instance that can be encoded.
///
/// Implementors return their extra arrays and plain fields; the codec never
/// inspects the concrete type.
pub trait MeshObject: AsAny + fmt::Debug + Send + Sync {
    /// Class identity to record.
    fn file_metadata(&self) -> MeshFileMetadata;

    /// Core buffers.
    fn core(&self) -> &Mesh;

    /// Core buffers, for in-place optimization.
    fn core_mut(&mut self) -> &mut Mesh;

    /// Extra array attributes beyond the core buffers.
    fn extra_arrays(&self) -> Vec<(String, Array)> {
        Vec::new()
    }

    /// Plain fields stored as JSON.
    fn model_data(&self) -> ModelData {
        ModelData::new()
    }
}

impl dyn MeshObject {
    /// Whether the concrete type is `T`.
    pub fn is<T: MeshObject>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow as `T`.
    pub fn downcast_ref<T: MeshObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow as `T`.
    pub fn downcast_mut<T: MeshObject>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Convert into `T`, or `None` if the concrete type differs.
    pub fn downcast<T: MeshObject>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}

/// A mesh type that can be rebuilt from stored parts.
pub trait MeshType: MeshObject + Sized {
    /// Recorded class name.
    const CLASS_NAME: &'static str;

    /// Recorded module name.
    const MODULE_NAME: &'static str;

    /// Extra arrays and plain fields this type declares.
    ///
    /// Parts are checked against these before [`from_parts`](Self::from_parts)
    /// runs, so `from_parts` may assume declared required fields exist with
    /// the declared kind.
    fn fields() -> &'static [FieldDescriptor] {
        &[]
    }

    /// Rebuild an instance.
    fn from_parts(parts: MeshParts) -> Result<Self>;
}

impl MeshObject for Mesh {
    fn file_metadata(&self) -> MeshFileMetadata {
        MeshFileMetadata::of::<Self>()
    }

    fn core(&self) -> &Mesh {
        self
    }

    fn core_mut(&mut self) -> &mut Mesh {
        self
    }
}

impl MeshType for Mesh {
    const CLASS_NAME: &'static str = "Mesh";
    const MODULE_NAME: &'static str = "meshpack";

    fn from_parts(parts: MeshParts) -> Result<Self> {
        Ok(parts.mesh)
    }
}

/// A mesh of any class, keeping every stored array and field.
///
/// Useful as a load fallback for classes the caller has not registered:
/// nothing is dropped and saving it again records the original identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericMesh {
    /// Core buffers.
    pub mesh: Mesh,
    /// Extra arrays.
    pub arrays: IndexMap<String, Array>,
    /// Plain fields.
    pub model_data: ModelData,
    /// Identity it was stored under.
    pub identity: MeshFileMetadata,
}

impl From<Mesh> for GenericMesh {
    fn from(mesh: Mesh) -> Self {
        Self {
            mesh,
            arrays: IndexMap::new(),
            model_data: ModelData::new(),
            identity: MeshFileMetadata::of::<Mesh>(),
        }
    }
}

impl MeshObject for GenericMesh {
    fn file_metadata(&self) -> MeshFileMetadata {
        self.identity.clone()
    }

    fn core(&self) -> &Mesh {
        &self.mesh
    }

    fn core_mut(&mut self) -> &mut Mesh {
        &mut self.mesh
    }

    fn extra_arrays(&self) -> Vec<(String, Array)> {
        self.arrays
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn model_data(&self) -> ModelData {
        self.model_data.clone()
    }
}

impl MeshType for GenericMesh {
    const CLASS_NAME: &'static str = "GenericMesh";
    const MODULE_NAME: &'static str = "meshpack";

    fn from_parts(parts: MeshParts) -> Result<Self> {
        Ok(Self {
            mesh: parts.mesh,
            arrays: parts.arrays,
            model_data: parts.model_data,
            identity: parts.file_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn counts() {
        let mesh = triangle();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let err = Mesh::new(vec![[0.0; 3]; 3], vec![0, 1, 3, 4, 0, 1]).unwrap_err();
        let validation = err.validation().expect("validation error");
        assert_eq!(validation.violations.len(), 1);
        assert!(validation.violations[0]
            .message
            .contains("index 3 at position 2 is out of bounds for 3 vertices (2 out of bounds)"));
    }

    #[test]
    fn every_violation_is_reported() {
        let mesh = Mesh {
            vertices: vec![[0.0; 3]; 2],
            indices: vec![0, 1, 2, 0],
        };
        let err = mesh.check();
        assert_eq!(err.violations.len(), 2);
        assert!(err.mentions("indices"));
    }

    #[test]
    fn from_flat_groups_triplets() {
        let mesh = Mesh::from_flat(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], vec![0, 1, 2])
            .unwrap();
        assert_eq!(mesh, triangle());
        assert!(Mesh::from_flat(&[0.0, 1.0], vec![]).is_err());
    }

    #[test]
    fn core_arrays_have_expected_layout() {
        let mesh = triangle();
        let vertices = mesh.vertices_array().unwrap();
        assert_eq!(vertices.shape(), &[3, 3]);
        assert_eq!(vertices.nbytes(), 3 * VERTEX_SIZE);
        let indices = mesh.indices_array();
        assert_eq!(indices.shape(), &[3]);
        assert_eq!(indices.to_vec::<u32>().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn take_field_reports_missing_and_mistyped() {
        let mut parts = MeshParts::new(triangle(), MeshFileMetadata::of::<Mesh>());
        parts
            .model_data
            .insert("name".into(), Value::String("tri".into()));
        parts.model_data.insert("lod".into(), Value::String("high".into()));
        parts.model_data.insert("tag".into(), Value::Null);

        assert_eq!(parts.take_field::<String>("name").unwrap(), "tri");
        assert!(parts.take_field::<u32>("lod").is_err());
        assert!(parts.take_field::<String>("missing").is_err());
        assert_eq!(parts.take_optional_field::<String>("tag").unwrap(), None);
        assert!(parts.take_array("uvs").is_err());
    }

    #[test]
    fn downcast_recovers_concrete_type() {
        let boxed: Box<dyn MeshObject> = Box::new(triangle());
        assert!(boxed.is::<Mesh>());
        assert!(!boxed.is::<GenericMesh>());
        assert_eq!(boxed.downcast_ref::<Mesh>().unwrap().vertex_count(), 3);
        let mesh = boxed.downcast::<Mesh>().unwrap();
        assert_eq!(*mesh, triangle());
    }

    #[test]
    fn generic_mesh_keeps_identity() {
        let mut parts = MeshParts::new(triangle(), MeshFileMetadata::new("Textured", "demo"));
        parts
            .arrays
            .insert("uvs".into(), Array::from_vec([3, 2], vec![0.0f32; 6]).unwrap());
        let generic = GenericMesh::from_parts(parts.clone()).unwrap();
        assert_eq!(generic.file_metadata().qualified_name(), "demo.Textured");
        assert_eq!(MeshParts::from_object(&generic), parts);
    }
}
