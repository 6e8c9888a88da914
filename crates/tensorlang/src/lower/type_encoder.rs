//! Maps tensor dtypes, quantization and shapes onto IR types.

use crate::ir::{
    ElementType, QuantizedType, StorageType, TensorType, UniformQuantized,
    UniformQuantizedPerAxis, FLAG_SIGNED,
};
use crate::ir::types::{default_storage_max, default_storage_min};
use crate::tensor::{DType, QuantParam, Shape, Tensor, TensorRef};

use super::error::LowerError;

/// Channel axis used for every per-axis quantized type.
pub const QUANT_AXIS: i32 = 1;

const DEFAULT_SCALE: f64 = 1.0;
const DEFAULT_ZERO_POINT: i64 = 0;

/// Primitive IR type of a plain dtype.
pub fn element_type(dtype: DType) -> ElementType {
    match dtype {
        DType::F64 => ElementType::F64,
        DType::F32 => ElementType::F32,
        DType::F16 => ElementType::F16,
        DType::I64 => ElementType::I64,
        DType::I32 => ElementType::Si32,
        DType::I16 => ElementType::Si16,
        DType::I8 => ElementType::Si8,
        DType::U64 => ElementType::Ui64,
        DType::U32 => ElementType::Ui32,
        DType::U16 => ElementType::Ui16,
        DType::U8 => ElementType::Ui8,
        DType::Bool => ElementType::I1,
    }
}

/// Affine quantized type of a quantized tensor.
///
/// Missing parameters default to scale `1.0` and zero point `0`. If either parameter is
/// per-axis the result is a per-axis type on axis 1 with the per-tensor side broadcast.
/// Per-axis parameters must be non-empty and every scale finite and positive.
pub fn quantized_type(tensor: &Tensor) -> Result<QuantizedType, LowerError> {
    if !tensor.is_quantized() {
        return Err(LowerError::NotQuantized {
            tensor: tensor.name().to_string(),
        });
    }

    let dtype = tensor.dtype();
    let signed = dtype.is_signed_storage();
    let width = dtype.bit_width();
    let storage = match dtype {
        DType::I8 | DType::I16 | DType::I32 | DType::U8 | DType::U16 | DType::U32 => {
            ElementType::integer(signed, width)
        }
        _ => None,
    }
    .ok_or_else(|| LowerError::UnsupportedStorage {
        tensor: tensor.name().to_string(),
        dtype,
    })?;

    let flags = if signed { FLAG_SIGNED } else { 0 };
    let storage_min = default_storage_min(signed, width);
    let storage_max = default_storage_max(signed, width);
    let scale = tensor
        .scale()
        .cloned()
        .unwrap_or(QuantParam::PerTensor(DEFAULT_SCALE));
    let zero_point = tensor
        .zero_point()
        .cloned()
        .unwrap_or(QuantParam::PerTensor(DEFAULT_ZERO_POINT));

    if scale.axis_len() == Some(0) || zero_point.axis_len() == Some(0) {
        return Err(LowerError::EmptyAxis {
            tensor: tensor.name().to_string(),
        });
    }
    let scales = match &scale {
        QuantParam::PerTensor(value) => std::slice::from_ref(value),
        QuantParam::PerAxis(values) => values.as_slice(),
    };
    if let Some(&bad) = scales
        .iter()
        .find(|value| !(value.is_finite() && **value > 0.0))
    {
        return Err(LowerError::InvalidScale {
            tensor: tensor.name().to_string(),
            scale: bad,
        });
    }

    let axis_len = match (scale.axis_len(), zero_point.axis_len()) {
        (None, None) => None,
        (Some(len), None) | (None, Some(len)) => Some(len),
        (Some(scales), Some(zero_points)) if scales == zero_points => Some(scales),
        (Some(scales), Some(zero_points)) => {
            return Err(LowerError::AxisLengthMismatch {
                tensor: tensor.name().to_string(),
                scales,
                zero_points,
            })
        }
    };

    let ty = match (axis_len, scale, zero_point) {
        (None, QuantParam::PerTensor(scale), QuantParam::PerTensor(zero_point)) => {
            QuantizedType::PerTensor(UniformQuantized {
                flags,
                storage,
                expressed: ElementType::F32,
                scale,
                zero_point,
                storage_min,
                storage_max,
            })
        }
        (len, scale, zero_point) => {
            let len = len.unwrap_or(1);
            QuantizedType::PerAxis(UniformQuantizedPerAxis {
                flags,
                storage,
                expressed: ElementType::F32,
                scales: scale.broadcast(len),
                zero_points: zero_point.broadcast(len),
                axis: QUANT_AXIS,
                storage_min,
                storage_max,
            })
        }
    };
    Ok(ty)
}

/// Element of the tensor's IR type: quantized when the tensor is quantized.
pub fn storage_type(tensor: &Tensor) -> Result<StorageType, LowerError> {
    if tensor.is_quantized() {
        Ok(StorageType::Quantized(quantized_type(tensor)?))
    } else {
        Ok(StorageType::Element(element_type(tensor.dtype())))
    }
}

/// Full IR type of a tensor, wrapped according to its shape.
pub fn tensor_type(tensor: &Tensor) -> Result<TensorType, LowerError> {
    let ty = match tensor.shape() {
        Shape::Absent => TensorType::None,
        Shape::Unranked => TensorType::Unranked(storage_type(tensor)?),
        Shape::Ranked(dims) => TensorType::Ranked {
            dims: dims.clone(),
            element: storage_type(tensor)?,
        },
    };
    Ok(ty)
}

/// One type per operator output, each encoded independently.
pub fn result_types(outputs: &[TensorRef]) -> Result<Vec<TensorType>, LowerError> {
    outputs.iter().map(|tensor| tensor_type(tensor)).collect()
}
