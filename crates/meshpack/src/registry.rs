//! Class registry: which mesh types a loader may instantiate.

use std::collections::HashMap;

use crate::error::Result;
use crate::mesh::{GenericMesh, Mesh, MeshFileMetadata, MeshObject, MeshParts, MeshType};
use crate::schema::validate_parts;

/// Rebuilds a mesh object from stored parts.
pub type Constructor = fn(MeshParts) -> Result<Box<dyn MeshObject>>;

/// Validate `parts` against `T`'s declared fields, then build a `T`.
pub fn construct<T: MeshType>(parts: MeshParts) -> Result<Box<dyn MeshObject>> {
    validate_parts(&parts, T::fields()).into_result()?;
    Ok(Box::new(T::from_parts(parts)?))
}

/// Same as [`construct`], returning the concrete type.
pub fn construct_as<T: MeshType>(parts: MeshParts) -> Result<T> {
    validate_parts(&parts, T::fields()).into_result()?;
    T::from_parts(parts)
}

/// Mapping from `module.class` to a constructor.
///
/// Filled by the caller before a load and only read during it.
#[derive(Debug, Clone, Default)]
pub struct MeshRegistry {
    constructors: HashMap<String, Constructor>,
}

impl MeshRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing the built-in [`Mesh`] and [`GenericMesh`] types.
    pub fn with_builtin() -> Self {
        Self::new().with::<Mesh>().with::<GenericMesh>()
    }

    /// Register `T` under its class identity, replacing any previous entry.
    pub fn register<T: MeshType>(&mut self) -> &mut Self {
        self.insert(MeshFileMetadata::of::<T>(), construct::<T>)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<T: MeshType>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Register a constructor under an explicit identity.
    pub fn insert(&mut self, identity: MeshFileMetadata, constructor: Constructor) -> &mut Self {
        self.constructors
            .insert(identity.qualified_name(), constructor);
        self
    }

    /// Whether a constructor is registered for `identity`.
    pub fn contains(&self, identity: &MeshFileMetadata) -> bool {
        self.constructors.contains_key(&identity.qualified_name())
    }

    /// Constructor for `identity`.
    pub fn resolve(&self, identity: &MeshFileMetadata) -> Option<Constructor> {
        self.constructors.get(&identity.qualified_name()).copied()
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_resolve() {
        let registry = MeshRegistry::with_builtin();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&MeshFileMetadata::of::<Mesh>()));
        assert!(registry.contains(&MeshFileMetadata::new("GenericMesh", "meshpack")));
        assert!(!registry.contains(&MeshFileMetadata::new("Mesh", "elsewhere")));
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = MeshRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.resolve(&MeshFileMetadata::of::<Mesh>()).is_none());
    }

    #[test]
    fn constructor_builds_registered_type() {
        let registry = MeshRegistry::new().with::<Mesh>();
        let constructor = registry.resolve(&MeshFileMetadata::of::<Mesh>()).unwrap();

        let mesh = Mesh::new(vec![[0.0; 3]; 3], vec![0, 1, 2]).unwrap();
        let object = constructor(MeshParts::new(mesh.clone(), MeshFileMetadata::of::<Mesh>()))
            .unwrap();
        assert_eq!(object.downcast_ref::<Mesh>(), Some(&mesh));
    }

    #[test]
    fn constructor_validates_core() {
        let bad = Mesh {
            vertices: vec![[0.0; 3]; 2],
            indices: vec![0, 1, 2],
        };
        let err = construct::<Mesh>(MeshParts::new(bad, MeshFileMetadata::of::<Mesh>()))
            .unwrap_err();
        assert!(err.validation().is_some());
    }
}
