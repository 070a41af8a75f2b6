//! Dense, row-major typed arrays.

use crate::dtype::{DType, Element};
use crate::error::{CodecError, Result};

/// Number of elements in `shape`, or `None` if it overflows `usize`.
///
/// An empty shape describes a single scalar.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

/// A shaped buffer of one primitive element type.
///
/// Elements are stored as raw bytes in native byte order (little-endian on
/// every target the archive format is read on). The byte length always
/// equals `element_count(shape) * dtype.size()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Array {
    /// Build an array from typed values.
    pub fn from_vec<T: Element>(shape: impl Into<Vec<usize>>, values: Vec<T>) -> Result<Self> {
        Self::from_slice(shape, &values)
    }

    /// Build an array by copying typed values.
    pub fn from_slice<T: Element>(shape: impl Into<Vec<usize>>, values: &[T]) -> Result<Self> {
        let shape = shape.into();
        let expected = element_count(&shape).ok_or_else(|| CodecError::ShapeOverflow {
            shape: shape.clone(),
        })?;
        if expected != values.len() {
            return Err(CodecError::ShapeMismatch {
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            data: bytemuck::cast_slice(values).to_vec(),
        })
    }

    /// One-dimensional array holding `values`.
    pub fn from_values<T: Element>(values: &[T]) -> Self {
        Self {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            data: bytemuck::cast_slice(values).to_vec(),
        }
    }

    /// Wrap raw element bytes.
    ///
    /// Fails with [`CodecError::CorruptData`] when the byte length does not
    /// match the shape.
    pub fn from_bytes(dtype: DType, shape: impl Into<Vec<usize>>, data: Vec<u8>) -> Result<Self> {
        let shape = shape.into();
        let expected = element_count(&shape)
            .and_then(|n| n.checked_mul(dtype.size()))
            .ok_or_else(|| CodecError::ShapeOverflow {
                shape: shape.clone(),
            })?;
        if expected != data.len() {
            return Err(CodecError::corrupt(format!(
                "{} bytes cannot hold a {dtype} array of shape {shape:?} ({expected} bytes)",
                data.len()
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Dimensions, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the raw element bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Raw element bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw element bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Copy the elements out as `T`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(CodecError::DTypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype,
            });
        }
        // Copy instead of casting in place: the byte buffer is only 1-aligned.
        let mut out = vec![T::zeroed(); self.len()];
        bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(&self.data);
        Ok(out)
    }

    /// Same elements under a new shape with the same element count.
    pub fn reshape(self, shape: impl Into<Vec<usize>>) -> Result<Self> {
        let shape = shape.into();
        let expected = element_count(&shape).ok_or_else(|| CodecError::ShapeOverflow {
            shape: shape.clone(),
        })?;
        if expected != self.len() {
            return Err(CodecError::ShapeMismatch {
                shape,
                expected,
                actual: self.len(),
            });
        }
        Ok(Self { shape, ..self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_roundtrip() {
        let values = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let array = Array::from_vec([2, 3], values.clone()).unwrap();
        assert_eq!(array.dtype(), DType::F32);
        assert_eq!(array.shape(), &[2, 3]);
        assert_eq!(array.ndim(), 2);
        assert_eq!(array.len(), 6);
        assert_eq!(array.nbytes(), 24);
        assert_eq!(array.to_vec::<f32>().unwrap(), values);
    }

    #[test]
    fn shape_must_match_values() {
        let err = Array::from_vec([2, 2], vec![1u16, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ShapeMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn wrong_type_access_fails() {
        let array = Array::from_values(&[1u32, 2, 3]);
        let err = array.to_vec::<i32>().unwrap_err();
        assert!(matches!(
            err,
            CodecError::DTypeMismatch {
                expected: DType::I32,
                actual: DType::U32
            }
        ));
    }

    #[test]
    fn from_bytes_rejects_short_buffer() {
        let err = Array::from_bytes(DType::F64, [2], vec![0u8; 15]).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn empty_and_scalar_shapes() {
        let empty = Array::from_vec([0, 3], Vec::<f32>::new()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.shape(), &[0, 3]);

        let scalar = Array::from_vec(Vec::<usize>::new(), vec![7i8]).unwrap();
        assert_eq!(scalar.len(), 1);
        assert_eq!(scalar.ndim(), 0);
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        let err = Array::from_vec([usize::MAX, 2], vec![0u8]).unwrap_err();
        assert!(matches!(err, CodecError::ShapeOverflow { .. }));
    }

    #[test]
    fn reshape_keeps_bytes() {
        let array = Array::from_values(&[1i16, 2, 3, 4, 5, 6]);
        let bytes = array.as_bytes().to_vec();
        let reshaped = array.reshape([3, 2]).unwrap();
        assert_eq!(reshaped.shape(), &[3, 2]);
        assert_eq!(reshaped.as_bytes(), bytes.as_slice());
        assert!(reshaped.reshape([4]).is_err());
    }
}
