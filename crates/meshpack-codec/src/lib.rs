#![warn(missing_docs)]

//! Self-describing array codec for meshpack.
//!
//! An [`Array`] is a dense row-major buffer of one primitive element type.
//! [`encode_array`] turns it into a compact payload plus an [`ArrayMetadata`]
//! record (dtype, shape, payload length); [`decode_array`] reverses that
//! bit for bit and refuses payloads that disagree with their metadata.
//!
//! # Example
//!
//! ```
//! use meshpack_codec::{decode_array, encode_array, Array};
//!
//! let uvs = Array::from_vec([3, 2], vec![0.0f32, 0.0, 1.0, 0.0, 0.5, 1.0])?;
//! let encoded = encode_array(&uvs)?;
//! let restored = decode_array(&encoded.payload, &encoded.metadata)?;
//! assert_eq!(restored, uvs);
//! # Ok::<(), meshpack_codec::CodecError>(())
//! ```

pub mod array;
pub mod codec;
pub mod dtype;
pub mod error;

pub use array::{element_count, Array};
pub use codec::{
    decode_array, encode_array, encode_array_with, ArrayMetadata, CodecOptions, EncodedArray,
    MAX_COMPRESSION_LEVEL,
};
pub use dtype::{DType, Element};
pub use error::{CodecError, Result};
