//! Static field descriptors for mesh types.
//!
//! A mesh type lists the extra arrays and plain fields it carries as a
//! `&'static [FieldDescriptor]`. Stored parts are checked against that list
//! before the type's constructor runs.

use meshpack_codec::{Array, DType};
use serde_json::Value;

use crate::error::ValidationError;
use crate::mesh::MeshParts;

/// Names extra arrays may not use; they collide with the core entries.
pub const RESERVED_NAMES: [&str; 3] = ["vertices", "indices", "manifest"];

/// Kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Extra array, optionally constrained.
    Array {
        /// Required element type.
        dtype: Option<DType>,
        /// Required number of dimensions.
        ndim: Option<usize>,
    },
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// JSON number without a fractional part.
    Integer,
    /// JSON boolean.
    Bool,
    /// JSON array.
    List,
    /// JSON object.
    Object,
    /// Any JSON value.
    Any,
}

impl FieldKind {
    fn describe(&self) -> String {
        match self {
            FieldKind::Array { dtype, ndim } => {
                let dtype = dtype.map_or("any".to_string(), |d| d.to_string());
                match ndim {
                    Some(n) => format!("{n}-d {dtype} array"),
                    None => format!("{dtype} array"),
                }
            }
            FieldKind::String => "string".into(),
            FieldKind::Number => "number".into(),
            FieldKind::Integer => "integer".into(),
            FieldKind::Bool => "bool".into(),
            FieldKind::List => "list".into(),
            FieldKind::Object => "object".into(),
            FieldKind::Any => "value".into(),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Array { .. } => false,
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::List => value.is_array(),
            FieldKind::Object => value.is_object(),
            FieldKind::Any => true,
        }
    }
}

/// One declared field of a mesh type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Attribute name.
    pub name: &'static str,
    /// Expected kind.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
}

impl FieldDescriptor {
    /// Required field of any kind.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// Array with a fixed element type and number of dimensions.
    pub const fn array(name: &'static str, dtype: DType, ndim: usize) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                dtype: Some(dtype),
                ndim: Some(ndim),
            },
        )
    }

    /// Array of any element type and shape.
    pub const fn any_array(name: &'static str) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                dtype: None,
                ndim: None,
            },
        )
    }

    /// String field.
    pub const fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// Number field.
    pub const fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    /// Integer field.
    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// Bool field.
    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    /// List field.
    pub const fn list(name: &'static str) -> Self {
        Self::new(name, FieldKind::List)
    }

    /// Object field.
    pub const fn object(name: &'static str) -> Self {
        Self::new(name, FieldKind::Object)
    }

    /// Same field, allowed to be absent.
    pub const fn optional(self) -> Self {
        Self {
            required: false,
            ..self
        }
    }

    /// Whether the field is stored as an array.
    pub const fn is_array(&self) -> bool {
        matches!(self.kind, FieldKind::Array { .. })
    }
}

/// Reason `name` cannot be used for an extra array, if any.
pub fn attribute_name_error(name: &str) -> Option<String> {
    if name.is_empty() {
        Some("attribute name is empty".into())
    } else if RESERVED_NAMES.contains(&name) {
        Some(format!("attribute name {name:?} is reserved"))
    } else if name.contains(['/', '\\']) {
        Some(format!("attribute name {name:?} contains a path separator"))
    } else if name == "." || name == ".." {
        Some(format!("attribute name {name:?} is not a valid entry name"))
    } else {
        None
    }
}

fn check_array(field: &FieldDescriptor, array: &Array, err: &mut ValidationError) {
    let FieldKind::Array { dtype, ndim } = field.kind else {
        return;
    };
    if let Some(dtype) = dtype {
        if array.dtype() != dtype {
            err.push(
                field.name,
                format!("expected dtype {dtype}, found {}", array.dtype()),
            );
        }
    }
    if let Some(ndim) = ndim {
        if array.ndim() != ndim {
            err.push(
                field.name,
                format!(
                    "expected {ndim} dimensions, found shape {:?}",
                    array.shape()
                ),
            );
        }
    }
}

/// Check parts against declared fields and the core mesh invariants.
///
/// Returns every violation found; an empty result means the parts are
/// valid. Undeclared arrays and fields are ignored.
pub fn validate_parts(parts: &MeshParts, fields: &[FieldDescriptor]) -> ValidationError {
    let mut err = parts.mesh.check();

    for name in parts.arrays.keys() {
        if let Some(message) = attribute_name_error(name) {
            err.push(name.as_str(), message);
        }
    }

    for field in fields {
        let array = parts.arrays.get(field.name);
        let value = parts.model_data.get(field.name);

        match (field.is_array(), array, value) {
            (true, Some(array), _) => check_array(field, array, &mut err),
            (false, None, Some(value)) => {
                if !field.kind.accepts(value) && !(value.is_null() && !field.required) {
                    err.push(
                        field.name,
                        format!("expected {}, found {value}", field.kind.describe()),
                    );
                }
            }
            (true, None, Some(_)) => err.push(
                field.name,
                format!("expected {}, found a plain value", field.kind.describe()),
            ),
            (false, Some(array), _) => err.push(
                field.name,
                format!(
                    "expected {}, found a {} array",
                    field.kind.describe(),
                    array.dtype()
                ),
            ),
            (_, None, None) => {
                if field.required {
                    let what = if field.is_array() { "array" } else { "field" };
                    err.push(field.name, format!("missing required {what}"));
                }
            }
        }
    }

    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Mesh, MeshFileMetadata};

    const FIELDS: &[FieldDescriptor] = &[
        FieldDescriptor::array("uvs", DType::F32, 2),
        FieldDescriptor::string("material"),
        FieldDescriptor::integer("lod").optional(),
    ];

    fn parts() -> MeshParts {
        let mesh = Mesh::new(vec![[0.0; 3]; 3], vec![0, 1, 2]).unwrap();
        MeshParts::new(mesh, MeshFileMetadata::new("Textured", "tests"))
    }

    #[test]
    fn complete_parts_pass() {
        let mut parts = parts();
        parts
            .arrays
            .insert("uvs".into(), Array::from_vec([3, 2], vec![0.0f32; 6]).unwrap());
        parts
            .model_data
            .insert("material".into(), Value::String("steel".into()));
        assert!(validate_parts(&parts, FIELDS).is_empty());
    }

    #[test]
    fn every_problem_is_listed() {
        let mut parts = parts();
        parts.mesh.indices = vec![0, 1, 7];
        parts
            .arrays
            .insert("uvs".into(), Array::from_vec([6], vec![0u32; 6]).unwrap());
        parts.model_data.insert("lod".into(), Value::from(1.5));

        let err = validate_parts(&parts, FIELDS);
        // indices, uvs dtype, uvs ndim, missing material, lod kind
        assert_eq!(err.violations.len(), 5, "{err}");
        assert!(err.mentions("indices"));
        assert!(err.mentions("uvs"));
        assert!(err.mentions("material"));
        assert!(err.mentions("lod"));
    }

    #[test]
    fn optional_fields_may_be_absent_or_null() {
        let mut parts = parts();
        parts
            .arrays
            .insert("uvs".into(), Array::from_vec([3, 2], vec![0.0f32; 6]).unwrap());
        parts
            .model_data
            .insert("material".into(), Value::String("steel".into()));
        parts.model_data.insert("lod".into(), Value::Null);
        assert!(validate_parts(&parts, FIELDS).is_empty());
    }

    #[test]
    fn array_and_plain_kinds_do_not_mix() {
        let mut parts = parts();
        parts.model_data.insert("uvs".into(), Value::from(vec![0.0, 1.0]));
        parts
            .arrays
            .insert("material".into(), Array::from_values(&[1u8]));
        let err = validate_parts(&parts, FIELDS);
        assert_eq!(err.violations.len(), 2, "{err}");
    }

    #[test]
    fn reserved_attribute_names() {
        assert!(attribute_name_error("uvs").is_none());
        assert!(attribute_name_error("vertices").is_some());
        assert!(attribute_name_error("manifest").is_some());
        assert!(attribute_name_error("a/b").is_some());
        assert!(attribute_name_error("").is_some());
        assert!(attribute_name_error("..").is_some());
    }
}
