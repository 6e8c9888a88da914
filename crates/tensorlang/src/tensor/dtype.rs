//! Enumerates the semantic element types accepted from graph builders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TensorError;

/// Logical dtype identifier shared by tensors, buffers, and the weight archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DType {
    F64,
    F32,
    F16,
    I64,
    I32,
    I16,
    I8,
    U64,
    U32,
    U16,
    U8,
    Bool,
}

impl DType {
    pub const ALL: [DType; 12] = [
        DType::F64,
        DType::F32,
        DType::F16,
        DType::I64,
        DType::I32,
        DType::I16,
        DType::I8,
        DType::U64,
        DType::U32,
        DType::U16,
        DType::U8,
        DType::Bool,
    ];

    /// Returns the builder-facing vocabulary string (`"float32"`, `"int8"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F64 => "float64",
            DType::F32 => "float32",
            DType::F16 => "float16",
            DType::I64 => "int64",
            DType::I32 => "int32",
            DType::I16 => "int16",
            DType::I8 => "int8",
            DType::U64 => "uint64",
            DType::U32 => "uint32",
            DType::U16 => "uint16",
            DType::U8 => "uint8",
            DType::Bool => "bool",
        }
    }

    /// Returns the number of bytes required per scalar element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F64 | DType::I64 | DType::U64 => 8,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F16 | DType::I16 | DType::U16 => 2,
            DType::I8 | DType::U8 | DType::Bool => 1,
        }
    }

    /// Returns the logical bit-width of one element (`bool` is one bit wide).
    pub fn bit_width(self) -> u32 {
        match self {
            DType::Bool => 1,
            other => (other.size_in_bytes() * 8) as u32,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F64 | DType::F32 | DType::F16)
    }

    /// Integer family, including `bool`.
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Signedness used when the dtype serves as quantized storage.
    ///
    /// Only `int8`, `int16` and `int32` count as signed storage; every other integer
    /// (including `int64`) is treated as unsigned.
    pub fn is_signed_storage(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32)
    }

    /// Produces a stable tag used when serializing archive entries.
    pub fn tag(self) -> u32 {
        match self {
            DType::F32 => 0,
            DType::F16 => 1,
            DType::F64 => 2,
            DType::I32 => 3,
            DType::I64 => 4,
            DType::I16 => 5,
            DType::I8 => 6,
            DType::U64 => 7,
            DType::U32 => 8,
            DType::U16 => 9,
            DType::U8 => 10,
            DType::Bool => 11,
        }
    }

    /// Reconstructs a `DType` from its serialized tag representation.
    pub fn from_tag(tag: u32) -> Option<Self> {
        DType::ALL.into_iter().find(|dtype| dtype.tag() == tag)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        DType::ALL
            .into_iter()
            .find(|dtype| dtype.as_str() == normalized)
            .ok_or_else(|| TensorError::UnknownDType(s.to_string()))
    }
}
