//! Type system of the emitted SSA module.
//!
//! Primitive element types, affine quantized storage types (per-tensor and per-axis) and the
//! tensor wrappers that carry a shape. The textual forms follow MLIR conventions so the
//! printed module reads like a `top`-dialect function.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::literal::format_float;

/// Errors raised while parsing the textual form of a type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("{0}")]
    Message(String),
}

impl TypeParseError {
    fn new(msg: impl Into<String>) -> Self {
        TypeParseError::Message(msg.into())
    }
}

/// Primitive element types of the target IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    F64,
    F32,
    F16,
    /// Signless 64-bit integer.
    I64,
    Si32,
    Si16,
    Si8,
    Ui64,
    Ui32,
    Ui16,
    Ui8,
    /// Signless 1-bit integer used for booleans.
    I1,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::F64 => "f64",
            ElementType::F32 => "f32",
            ElementType::F16 => "f16",
            ElementType::I64 => "i64",
            ElementType::Si32 => "si32",
            ElementType::Si16 => "si16",
            ElementType::Si8 => "si8",
            ElementType::Ui64 => "ui64",
            ElementType::Ui32 => "ui32",
            ElementType::Ui16 => "ui16",
            ElementType::Ui8 => "ui8",
            ElementType::I1 => "i1",
        }
    }

    pub fn width(self) -> u32 {
        match self {
            ElementType::F64 | ElementType::I64 | ElementType::Ui64 => 64,
            ElementType::F32 | ElementType::Si32 | ElementType::Ui32 => 32,
            ElementType::F16 | ElementType::Si16 | ElementType::Ui16 => 16,
            ElementType::Si8 | ElementType::Ui8 => 8,
            ElementType::I1 => 1,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F64 | ElementType::F32 | ElementType::F16)
    }

    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Integer type of the given signedness and width, as used for quantized storage.
    pub fn integer(signed: bool, width: u32) -> Option<Self> {
        match (signed, width) {
            (true, 8) => Some(ElementType::Si8),
            (true, 16) => Some(ElementType::Si16),
            (true, 32) => Some(ElementType::Si32),
            (false, 8) => Some(ElementType::Ui8),
            (false, 16) => Some(ElementType::Ui16),
            (false, 32) => Some(ElementType::Ui32),
            (false, 64) => Some(ElementType::Ui64),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [
            ElementType::F64,
            ElementType::F32,
            ElementType::F16,
            ElementType::I64,
            ElementType::Si32,
            ElementType::Si16,
            ElementType::Si8,
            ElementType::Ui64,
            ElementType::Ui32,
            ElementType::Ui16,
            ElementType::Ui8,
            ElementType::I1,
        ]
        .into_iter()
        .find(|ty| ty.as_str() == s)
        .ok_or_else(|| TypeParseError::new(format!("unknown element type `{s}`")))
    }
}

/// Quantized-type flag marking signed storage.
pub const FLAG_SIGNED: u32 = 1;

/// Smallest value representable by an integer of the given signedness and width.
pub fn default_storage_min(signed: bool, width: u32) -> i64 {
    match (signed, width) {
        (false, _) => 0,
        (true, 0) => 0,
        (true, 64..) => i64::MIN,
        (true, width) => -(1i64 << (width - 1)),
    }
}

/// Largest value representable by an integer of the given signedness and width.
///
/// Widths above 32 bits are not valid quantized storage and saturate at `i64::MAX`.
pub fn default_storage_max(signed: bool, width: u32) -> i64 {
    match (signed, width) {
        (_, 0) => 0,
        (true, 64..) | (false, 63..) => i64::MAX,
        (true, width) => (1i64 << (width - 1)) - 1,
        (false, width) => (1i64 << width) - 1,
    }
}

/// Affine quantization with a single scale and zero point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformQuantized {
    pub flags: u32,
    pub storage: ElementType,
    pub expressed: ElementType,
    pub scale: f64,
    pub zero_point: i64,
    pub storage_min: i64,
    pub storage_max: i64,
}

/// Affine quantization with one scale and zero point per slice along `axis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformQuantizedPerAxis {
    pub flags: u32,
    pub storage: ElementType,
    pub expressed: ElementType,
    pub scales: Vec<f64>,
    pub zero_points: Vec<i64>,
    pub axis: i32,
    pub storage_min: i64,
    pub storage_max: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuantizedType {
    PerTensor(UniformQuantized),
    PerAxis(UniformQuantizedPerAxis),
}

impl QuantizedType {
    pub fn flags(&self) -> u32 {
        match self {
            QuantizedType::PerTensor(q) => q.flags,
            QuantizedType::PerAxis(q) => q.flags,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.flags() & FLAG_SIGNED != 0
    }

    pub fn storage(&self) -> ElementType {
        match self {
            QuantizedType::PerTensor(q) => q.storage,
            QuantizedType::PerAxis(q) => q.storage,
        }
    }

    pub fn expressed(&self) -> ElementType {
        match self {
            QuantizedType::PerTensor(q) => q.expressed,
            QuantizedType::PerAxis(q) => q.expressed,
        }
    }

    pub fn storage_range(&self) -> (i64, i64) {
        match self {
            QuantizedType::PerTensor(q) => (q.storage_min, q.storage_max),
            QuantizedType::PerAxis(q) => (q.storage_min, q.storage_max),
        }
    }
}

impl fmt::Display for QuantizedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signed = self.is_signed();
        let width = self.storage().width();
        let (min, max) = self.storage_range();
        write!(f, "!quant.uniform<{}{}", if signed { 'i' } else { 'u' }, width)?;
        if min != default_storage_min(signed, width) || max != default_storage_max(signed, width) {
            write!(f, "<{min}:{max}>")?;
        }
        write!(f, ":{}", self.expressed())?;
        match self {
            QuantizedType::PerTensor(q) => {
                write!(f, ", ")?;
                write_scale_zero_point(f, q.scale, q.zero_point)?;
            }
            QuantizedType::PerAxis(q) => {
                write!(f, ":{}, {{", q.axis)?;
                for (index, (scale, zero_point)) in q.scales.iter().zip(&q.zero_points).enumerate()
                {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write_scale_zero_point(f, *scale, *zero_point)?;
                }
                write!(f, "}}")?;
            }
        }
        write!(f, ">")
    }
}

fn write_scale_zero_point(f: &mut fmt::Formatter<'_>, scale: f64, zero_point: i64) -> fmt::Result {
    f.write_str(&format_float(scale))?;
    if zero_point != 0 {
        write!(f, ":{zero_point}")?;
    }
    Ok(())
}

impl FromStr for QuantizedType {
    type Err = TypeParseError;

    /// Parses the `!quant.uniform<...>` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .trim()
            .strip_prefix("!quant.uniform<")
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| TypeParseError::new("quantized type must be `!quant.uniform<...>`"))?;
        let (head, params) = body
            .split_once(',')
            .ok_or_else(|| TypeParseError::new("missing scale/zero-point section"))?;

        let (head, range) = match (head.find('<'), head.find('>')) {
            (Some(open), Some(close)) if open < close => {
                let range = &head[open + 1..close];
                let (min, max) = range
                    .split_once(':')
                    .ok_or_else(|| TypeParseError::new("storage range must be `<min:max>`"))?;
                let min = parse_int(min)?;
                let max = parse_int(max)?;
                (format!("{}{}", &head[..open], &head[close + 1..]), Some((min, max)))
            }
            _ => (head.to_string(), None),
        };

        let mut parts = head.split(':');
        let storage = parts
            .next()
            .map(str::trim)
            .ok_or_else(|| TypeParseError::new("missing storage type"))?;
        let (signed, width) = parse_storage(storage)?;
        let storage = ElementType::integer(signed, width)
            .ok_or_else(|| TypeParseError::new(format!("unsupported storage `{storage}`")))?;
        let expressed: ElementType = parts
            .next()
            .ok_or_else(|| TypeParseError::new("missing expressed type"))?
            .parse()?;
        let axis = parts
            .next()
            .map(|axis| {
                axis.trim()
                    .parse::<i32>()
                    .map_err(|_| TypeParseError::new(format!("invalid axis `{axis}`")))
            })
            .transpose()?;
        if parts.next().is_some() {
            return Err(TypeParseError::new("unexpected trailing `:` section"));
        }

        let (storage_min, storage_max) = range.unwrap_or((
            default_storage_min(signed, width),
            default_storage_max(signed, width),
        ));
        let flags = if signed { FLAG_SIGNED } else { 0 };
        let params = params.trim();

        match axis {
            Some(axis) => {
                let inner = params
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                    .ok_or_else(|| TypeParseError::new("per-axis parameters must be `{...}`"))?;
                let mut scales = Vec::new();
                let mut zero_points = Vec::new();
                for entry in inner.split(',') {
                    let (scale, zero_point) = parse_scale_zero_point(entry)?;
                    scales.push(scale);
                    zero_points.push(zero_point);
                }
                Ok(QuantizedType::PerAxis(UniformQuantizedPerAxis {
                    flags,
                    storage,
                    expressed,
                    scales,
                    zero_points,
                    axis,
                    storage_min,
                    storage_max,
                }))
            }
            None => {
                let (scale, zero_point) = parse_scale_zero_point(params)?;
                Ok(QuantizedType::PerTensor(UniformQuantized {
                    flags,
                    storage,
                    expressed,
                    scale,
                    zero_point,
                    storage_min,
                    storage_max,
                }))
            }
        }
    }
}

fn parse_storage(src: &str) -> Result<(bool, u32), TypeParseError> {
    let (signed, digits) = if let Some(digits) = src.strip_prefix('i') {
        (true, digits)
    } else if let Some(digits) = src.strip_prefix('u') {
        (false, digits)
    } else {
        return Err(TypeParseError::new(format!(
            "storage type `{src}` must start with `i` or `u`"
        )));
    };
    let width = digits
        .parse::<u32>()
        .map_err(|_| TypeParseError::new(format!("invalid storage width `{digits}`")))?;
    Ok((signed, width))
}

fn parse_scale_zero_point(src: &str) -> Result<(f64, i64), TypeParseError> {
    let src = src.trim();
    let (scale, zero_point) = match src.split_once(':') {
        Some((scale, zero_point)) => (scale, parse_int(zero_point)?),
        None => (src, 0),
    };
    let scale = scale
        .trim()
        .parse::<f64>()
        .map_err(|_| TypeParseError::new(format!("invalid scale `{scale}`")))?;
    Ok((scale, zero_point))
}

fn parse_int(src: &str) -> Result<i64, TypeParseError> {
    src.trim()
        .parse::<i64>()
        .map_err(|_| TypeParseError::new(format!("invalid integer `{src}`")))
}

/// Element type of a tensor: a primitive or a quantized storage type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageType {
    Element(ElementType),
    Quantized(QuantizedType),
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Element(ty) => write!(f, "{ty}"),
            StorageType::Quantized(ty) => write!(f, "{ty}"),
        }
    }
}

/// Type of an SSA value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TensorType {
    Ranked {
        dims: Vec<usize>,
        element: StorageType,
    },
    Unranked(StorageType),
    /// Type of the "no value" marker and of absent optional results.
    None,
}

impl TensorType {
    pub fn element(&self) -> Option<&StorageType> {
        match self {
            TensorType::Ranked { element, .. } | TensorType::Unranked(element) => Some(element),
            TensorType::None => None,
        }
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorType::Ranked { dims, element } => {
                f.write_str("tensor<")?;
                for dim in dims {
                    write!(f, "{dim}x")?;
                }
                write!(f, "{element}>")
            }
            TensorType::Unranked(element) => write!(f, "tensor<*x{element}>"),
            TensorType::None => f.write_str("none"),
        }
    }
}
