//! Host-side constant payloads attached to coefficient tensors.

use std::fmt;
use std::sync::Arc;

use half::f16;

use super::{DType, TensorError};

/// Scalar types that can back a [`TensorBuffer`].
///
/// Values are stored little-endian so archives are byte-identical across hosts.
pub trait Element: Copy + Send + Sync + 'static {
    /// The dtype tag recorded for buffers of this element.
    const DTYPE: DType;

    /// Appends the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = $dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element! {
    f64 => DType::F64,
    f32 => DType::F32,
    f16 => DType::F16,
    i64 => DType::I64,
    i32 => DType::I32,
    i16 => DType::I16,
    i8 => DType::I8,
    u64 => DType::U64,
    u32 => DType::U32,
    u16 => DType::U16,
    u8 => DType::U8,
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
}

/// Dense, immutable array of constant data with its own shape and dtype.
///
/// Cloning is cheap: the payload is shared.
#[derive(Clone, PartialEq, Eq)]
pub struct TensorBuffer {
    dims: Vec<usize>,
    dtype: DType,
    bytes: Arc<[u8]>,
}

impl TensorBuffer {
    /// Builds a buffer from typed values, validating the length against `dims`.
    pub fn from_vec<E: Element>(
        dims: impl Into<Vec<usize>>,
        data: Vec<E>,
    ) -> Result<Self, TensorError> {
        let dims = dims.into();
        let expected = element_count(&dims);
        if data.len() != expected {
            return Err(TensorError::BufferLength {
                expected,
                actual: data.len(),
                dims,
            });
        }
        let mut bytes = Vec::with_capacity(data.len() * E::DTYPE.size_in_bytes());
        for value in data {
            value.write_le(&mut bytes);
        }
        Ok(TensorBuffer {
            dims,
            dtype: E::DTYPE,
            bytes: Arc::from(bytes),
        })
    }

    /// Rebuilds a buffer from raw little-endian bytes, e.g. when reading an archive.
    pub fn from_raw(
        dims: impl Into<Vec<usize>>,
        dtype: DType,
        bytes: Vec<u8>,
    ) -> Result<Self, TensorError> {
        let dims = dims.into();
        let expected = element_count(&dims) * dtype.size_in_bytes();
        if bytes.len() != expected {
            return Err(TensorError::BufferLength {
                expected,
                actual: bytes.len(),
                dims,
            });
        }
        Ok(TensorBuffer {
            dims,
            dtype,
            bytes: Arc::from(bytes),
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Raw little-endian payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of scalar elements in the buffer.
    pub fn len(&self) -> usize {
        element_count(&self.dims)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TensorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorBuffer")
            .field("dims", &self.dims)
            .field("dtype", &self.dtype)
            .field("byte_len", &self.bytes.len())
            .finish()
    }
}

fn element_count(dims: &[usize]) -> usize {
    dims.iter().product()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_records_dtype_and_layout() {
        let buffer = TensorBuffer::from_vec([2, 2], vec![1i16, -2, 3, 4]).unwrap();
        assert_eq!(buffer.dtype(), DType::I16);
        assert_eq!(buffer.dims(), &[2, 2]);
        assert_eq!(&buffer.bytes()[..4], &[1, 0, 0xfe, 0xff]);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = TensorBuffer::from_vec([2, 3], vec![0.0f32; 5]).unwrap_err();
        assert!(matches!(
            err,
            TensorError::BufferLength {
                expected: 6,
                actual: 5,
                ..
            }
        ));
    }

    #[test]
    fn scalar_buffer_has_one_element() {
        let buffer = TensorBuffer::from_vec(Vec::<usize>::new(), vec![true]).unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.bytes(), &[1]);
    }
}
