//! Array codec: zlib-compressed element bytes plus recoverable metadata.
//!
//! The payload carries no header. Everything needed to reinterpret it
//! (element type, shape, payload length) lives in [`ArrayMetadata`], which
//! callers store next to the payload, typically in a JSON manifest.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::{Deserialize, Serialize};

use crate::array::{element_count, Array};
use crate::dtype::DType;
use crate::error::{CodecError, Result};

/// Highest zlib compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Upper bound on how many bytes one deflate input byte can expand to.
const MAX_INFLATE_RATIO: usize = 1032;

/// Largest output a zlib stream of `encoded_len` bytes can inflate to.
fn max_inflated_len(encoded_len: usize) -> usize {
    encoded_len.saturating_mul(MAX_INFLATE_RATIO).saturating_add(64)
}

/// Tuning for [`encode_array_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    /// zlib level, 0 (store) to 9 (smallest).
    pub compression_level: u32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

impl CodecOptions {
    /// Validate options.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(CodecError::InvalidOptions(format!(
                "compression_level must be between 0 and {MAX_COMPRESSION_LEVEL}, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}

/// Description of one encoded buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayMetadata {
    /// Element type.
    pub dtype: DType,
    /// Dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Length of the encoded payload in bytes.
    pub encoded_len: usize,
}

impl ArrayMetadata {
    /// Size of one element in bytes.
    pub fn itemsize(&self) -> usize {
        self.dtype.size()
    }

    /// Elements implied by the shape.
    pub fn element_count(&self) -> Option<usize> {
        element_count(&self.shape)
    }

    /// Raw byte length the payload must decode to.
    pub fn decoded_len(&self) -> Option<usize> {
        self.element_count()
            .and_then(|n| n.checked_mul(self.itemsize()))
    }
}

/// Encoded payload together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArray {
    /// Compressed element bytes.
    pub payload: Vec<u8>,
    /// Type, shape and payload length.
    pub metadata: ArrayMetadata,
}

impl EncodedArray {
    /// Decode back into an [`Array`].
    pub fn decode(&self) -> Result<Array> {
        decode_array(&self.payload, &self.metadata)
    }
}

/// Encode an array with default options.
pub fn encode_array(array: &Array) -> Result<EncodedArray> {
    encode_array_with(array, &CodecOptions::default())
}

/// Encode an array.
pub fn encode_array_with(array: &Array, options: &CodecOptions) -> Result<EncodedArray> {
    options.validate()?;

    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(array.nbytes() / 2 + 16),
        Compression::new(options.compression_level),
    );
    encoder.write_all(array.as_bytes())?;
    let payload = encoder.finish()?;

    tracing::trace!(
        dtype = %array.dtype(),
        shape = ?array.shape(),
        raw = array.nbytes(),
        encoded = payload.len(),
        "Encoded array"
    );

    let metadata = ArrayMetadata {
        dtype: array.dtype(),
        shape: array.shape().to_vec(),
        encoded_len: payload.len(),
    };
    Ok(EncodedArray { payload, metadata })
}

/// Decode a payload produced by [`encode_array`].
///
/// The payload must be exactly `metadata.encoded_len` bytes, must hold one
/// complete zlib stream with nothing after it, and must inflate to exactly
/// the byte length implied by dtype and shape. Anything else is reported as
/// [`CodecError::CorruptData`]; the decoder never truncates or pads.
pub fn decode_array(payload: &[u8], metadata: &ArrayMetadata) -> Result<Array> {
    if payload.len() != metadata.encoded_len {
        return Err(CodecError::corrupt(format!(
            "payload is {} bytes, metadata records {}",
            payload.len(),
            metadata.encoded_len
        )));
    }

    let expected = metadata
        .decoded_len()
        .ok_or_else(|| CodecError::ShapeOverflow {
            shape: metadata.shape.clone(),
        })?;

    // Checked before allocating: the shape comes from untrusted metadata.
    if expected > max_inflated_len(payload.len()) {
        return Err(CodecError::corrupt(format!(
            "{} array of shape {:?} needs {expected} bytes, more than a {}-byte payload can hold",
            metadata.dtype,
            metadata.shape,
            payload.len()
        )));
    }

    // One spare byte of capacity so oversized streams show up as extra output.
    let mut data = Vec::with_capacity(expected.saturating_add(1));
    let mut inflater = Decompress::new(true);
    let status = inflater
        .decompress_vec(payload, &mut data, FlushDecompress::Finish)
        .map_err(|e| CodecError::corrupt(format!("inflate failed: {e}")))?;

    if status != Status::StreamEnd || inflater.total_in() != payload.len() as u64 {
        return Err(CodecError::corrupt(format!(
            "compressed stream is incomplete or oversized (consumed {} of {} bytes)",
            inflater.total_in(),
            payload.len()
        )));
    }
    if data.len() != expected {
        return Err(CodecError::corrupt(format!(
            "decoded {} bytes, {} array of shape {:?} needs {expected}",
            data.len(),
            metadata.dtype,
            metadata.shape
        )));
    }

    Array::from_bytes(metadata.dtype, metadata.shape.clone(), data)
}
