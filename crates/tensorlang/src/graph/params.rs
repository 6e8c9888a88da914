//! Tagged operator parameters.
//!
//! Operator factories attach parameters as a closed set of variants so the attribute encoder
//! can match exhaustively. Element dtypes use the same vocabulary as tensors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tensor::DType;

/// A record inside a dict-array parameter. Fields hold scalar or flat-array values.
pub type ParamRecord = BTreeMap<String, Param>;

/// One operator parameter value together with its encoding kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Param {
    Int { value: i64, dtype: DType },
    Float { value: f64, dtype: DType },
    Bool(bool),
    Str(String),
    IntArray { values: Vec<i64>, dtype: DType },
    FloatArray { values: Vec<f64>, dtype: DType },
    BoolArray(Vec<bool>),
    StrArray(Vec<String>),
    /// Ordered list of heterogeneous sub-configurations (custom operators).
    DictArray(Vec<ParamRecord>),
}

impl Param {
    pub fn i64(value: i64) -> Self {
        Param::Int {
            value,
            dtype: DType::I64,
        }
    }

    pub fn i32(value: i32) -> Self {
        Param::Int {
            value: i64::from(value),
            dtype: DType::I32,
        }
    }

    pub fn f64(value: f64) -> Self {
        Param::Float {
            value,
            dtype: DType::F64,
        }
    }

    pub fn f32(value: f32) -> Self {
        Param::Float {
            value: f64::from(value),
            dtype: DType::F32,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Param::Str(value.into())
    }

    pub fn i64_array(values: impl Into<Vec<i64>>) -> Self {
        Param::IntArray {
            values: values.into(),
            dtype: DType::I64,
        }
    }

    pub fn f64_array(values: impl Into<Vec<f64>>) -> Self {
        Param::FloatArray {
            values: values.into(),
            dtype: DType::F64,
        }
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Str(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Str(value)
    }
}
