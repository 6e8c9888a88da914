//! Affine quantization parameters carried by graph tensors.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TensorError;

/// A quantization field: one value for the whole tensor or one value per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuantParam<T> {
    PerTensor(T),
    PerAxis(Vec<T>),
}

impl<T: Copy> QuantParam<T> {
    /// Number of channels described by a per-axis parameter.
    pub fn axis_len(&self) -> Option<usize> {
        match self {
            QuantParam::PerTensor(_) => None,
            QuantParam::PerAxis(values) => Some(values.len()),
        }
    }

    /// Expands the parameter to `len` values, repeating a per-tensor value.
    pub fn broadcast(&self, len: usize) -> Vec<T> {
        match self {
            QuantParam::PerTensor(value) => vec![*value; len],
            QuantParam::PerAxis(values) => values.clone(),
        }
    }
}

impl<T> From<T> for QuantParam<T> {
    fn from(value: T) -> Self {
        QuantParam::PerTensor(value)
    }
}

impl<T> From<Vec<T>> for QuantParam<T> {
    fn from(values: Vec<T>) -> Self {
        QuantParam::PerAxis(values)
    }
}

impl<T: fmt::Debug> fmt::Display for QuantParam<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantParam::PerTensor(value) => write!(f, "{value:?}"),
            QuantParam::PerAxis(values) => write!(f, "{values:?}"),
        }
    }
}

pub type Scale = QuantParam<f64>;
pub type ZeroPoint = QuantParam<i64>;

/// Sticky quantization state of a tensor.
///
/// A tensor becomes quantized the first time a scale or zero point is supplied. After that,
/// unset fields may still be filled in, but a set field only accepts an equal value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    is_quantized: bool,
    scale: Option<Scale>,
    zero_point: Option<ZeroPoint>,
}

impl Quantization {
    pub fn is_quantized(&self) -> bool {
        self.is_quantized
    }

    pub fn scale(&self) -> Option<&Scale> {
        self.scale.as_ref()
    }

    pub fn zero_point(&self) -> Option<&ZeroPoint> {
        self.zero_point.as_ref()
    }

    /// Merges new parameters into the current state; `tensor` names the owner in errors.
    pub fn merge(
        &mut self,
        tensor: &str,
        scale: Option<Scale>,
        zero_point: Option<ZeroPoint>,
    ) -> Result<(), TensorError> {
        if !self.is_quantized {
            self.is_quantized = scale.is_some() || zero_point.is_some();
            self.scale = scale;
            self.zero_point = zero_point;
            return Ok(());
        }

        match (&self.scale, scale) {
            (_, None) => {}
            (None, Some(incoming)) => self.scale = Some(incoming),
            (Some(existing), Some(incoming)) if *existing == incoming => {}
            (Some(existing), Some(incoming)) => {
                return Err(TensorError::QuantizationConflict {
                    tensor: tensor.to_string(),
                    field: "scale",
                    existing: existing.to_string(),
                    incoming: incoming.to_string(),
                })
            }
        }

        match (&self.zero_point, zero_point) {
            (_, None) => {}
            (None, Some(incoming)) => self.zero_point = Some(incoming),
            (Some(existing), Some(incoming)) if *existing == incoming => {}
            (Some(existing), Some(incoming)) => {
                return Err(TensorError::QuantizationConflict {
                    tensor: tensor.to_string(),
                    field: "zero_point",
                    existing: existing.to_string(),
                    incoming: incoming.to_string(),
                })
            }
        }
        Ok(())
    }
}
