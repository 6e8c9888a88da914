use thiserror::Error;

use crate::ir::ModuleError;
use crate::tensor::{DType, TensorError};

/// Malformed operator parameters supplied by the builder layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttrError {
    #[error("parameter '{name}' is an integer but is tagged with non-integer dtype {dtype}")]
    IntegerDType { name: String, dtype: DType },
    #[error("parameter '{name}' value {value} does not fit its dtype {dtype}")]
    IntegerRange { name: String, value: i64, dtype: DType },
    #[error("parameter '{name}' is a float but is tagged with non-float dtype {dtype}")]
    FloatDType { name: String, dtype: DType },
    #[error("parameter '{name}': field '{field}' of a dict record cannot itself be a dict array")]
    NestedDict { name: String, field: String },
}

/// Failures that abort a lowering run.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("Tensor '{tensor}' is not constant!")]
    NotConstant { tensor: String },
    #[error("Tensor shape is ambiguous! '{declared}' vs '{buffer:?}' (tensor '{tensor}')")]
    ShapeAmbiguous {
        tensor: String,
        declared: String,
        buffer: Vec<usize>,
    },
    #[error("tensor '{tensor}' does not have a quantized type")]
    NotQuantized { tensor: String },
    #[error("tensor '{tensor}' uses {dtype}, which cannot be quantized storage")]
    UnsupportedStorage { tensor: String, dtype: DType },
    #[error("tensor '{tensor}' has {scales} per-axis scales but {zero_points} zero points")]
    AxisLengthMismatch {
        tensor: String,
        scales: usize,
        zero_points: usize,
    },
    #[error("tensor '{tensor}' has an empty per-axis quantization parameter")]
    EmptyAxis { tensor: String },
    #[error("tensor '{tensor}' has scale {scale}, expected a finite positive value")]
    InvalidScale { tensor: String, scale: f64 },
    #[error("two distinct constants are both named '{name}'")]
    DuplicateWeight { name: String },
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error(transparent)]
    Attr(#[from] AttrError),
    #[error(transparent)]
    Module(#[from] ModuleError),
}
