//! Converts operator parameters into IR attributes.

use std::collections::BTreeMap;

use crate::graph::{Param, ParamRecord};
use crate::ir::Attribute;
use crate::tensor::DType;

use super::error::AttrError;
use super::type_encoder::element_type;

/// Encodes every parameter of an operator, keeping the parameter names.
pub fn encode_params(
    params: &BTreeMap<String, Param>,
) -> Result<BTreeMap<String, Attribute>, AttrError> {
    params
        .iter()
        .map(|(name, param)| Ok((name.clone(), encode_param(name, param)?)))
        .collect()
}

fn encode_param(name: &str, param: &Param) -> Result<Attribute, AttrError> {
    let attr = match param {
        Param::Int { value, dtype } => integer(name, *value, *dtype)?,
        Param::Float { value, dtype } => float(name, *value, *dtype)?,
        Param::Bool(value) => Attribute::Bool(*value),
        Param::Str(value) => Attribute::String(value.clone()),
        Param::IntArray { values, dtype } => Attribute::Array(
            values
                .iter()
                .map(|value| integer(name, *value, *dtype))
                .collect::<Result<_, _>>()?,
        ),
        Param::FloatArray { values, dtype } => Attribute::Array(
            values
                .iter()
                .map(|value| float(name, *value, *dtype))
                .collect::<Result<_, _>>()?,
        ),
        Param::BoolArray(values) => {
            Attribute::Array(values.iter().copied().map(Attribute::Bool).collect())
        }
        Param::StrArray(values) => {
            Attribute::Array(values.iter().cloned().map(Attribute::String).collect())
        }
        Param::DictArray(records) => Attribute::Array(
            records
                .iter()
                .map(|record| encode_record(name, record))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(attr)
}

fn encode_record(name: &str, record: &ParamRecord) -> Result<Attribute, AttrError> {
    let mut fields = BTreeMap::new();
    for (field, param) in record {
        if matches!(param, Param::DictArray(_)) {
            return Err(AttrError::NestedDict {
                name: name.to_string(),
                field: field.clone(),
            });
        }
        fields.insert(field.clone(), encode_param(name, param)?);
    }
    Ok(Attribute::Dict(fields))
}

fn integer(name: &str, value: i64, dtype: DType) -> Result<Attribute, AttrError> {
    let (min, max) = match dtype {
        DType::I64 => (i64::MIN, i64::MAX),
        DType::I32 => (i64::from(i32::MIN), i64::from(i32::MAX)),
        DType::I16 => (i64::from(i16::MIN), i64::from(i16::MAX)),
        DType::I8 => (i64::from(i8::MIN), i64::from(i8::MAX)),
        DType::U64 => (0, i64::MAX),
        DType::U32 => (0, i64::from(u32::MAX)),
        DType::U16 => (0, i64::from(u16::MAX)),
        DType::U8 => (0, i64::from(u8::MAX)),
        DType::Bool => (0, 1),
        DType::F64 | DType::F32 | DType::F16 => {
            return Err(AttrError::IntegerDType {
                name: name.to_string(),
                dtype,
            })
        }
    };
    if !(min..=max).contains(&value) {
        return Err(AttrError::IntegerRange {
            name: name.to_string(),
            value,
            dtype,
        });
    }
    Ok(Attribute::Integer {
        value,
        ty: element_type(dtype),
    })
}

fn float(name: &str, value: f64, dtype: DType) -> Result<Attribute, AttrError> {
    if !dtype.is_float() {
        return Err(AttrError::FloatDType {
            name: name.to_string(),
            dtype,
        });
    }
    Ok(Attribute::Float {
        value,
        ty: element_type(dtype),
    })
}
