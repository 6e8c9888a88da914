//! Typed attributes attached to IR operations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::literal::{format_float_attr, identifier, quote};
use super::types::ElementType;

/// Attribute value in the target IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attribute {
    Integer { value: i64, ty: ElementType },
    Float { value: f64, ty: ElementType },
    Bool(bool),
    String(String),
    Array(Vec<Attribute>),
    Dict(BTreeMap<String, Attribute>),
}

impl Attribute {
    pub fn string(value: impl Into<String>) -> Self {
        Attribute::String(value.into())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Integer { value, ty } => write!(f, "{value} : {ty}"),
            Attribute::Float { value, ty } => {
                write!(f, "{} : {ty}", format_float_attr(*value, *ty))
            }
            Attribute::Bool(value) => write!(f, "{value}"),
            Attribute::String(value) => f.write_str(&quote(value)),
            Attribute::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Attribute::Dict(fields) => write_dict(f, fields),
        }
    }
}

/// Writes `{name = value, ...}` in key order.
pub(crate) fn write_dict(
    f: &mut fmt::Formatter<'_>,
    fields: &BTreeMap<String, Attribute>,
) -> fmt::Result {
    f.write_str("{")?;
    for (index, (name, value)) in fields.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{} = {value}", identifier(name))?;
    }
    f.write_str("}")
}
