//! Graph tensors and the pieces they are made of.
//!
//! A [`Tensor`] is one logical value flowing through a graph: either an activation
//! (`neuron`) or a constant (`coeff`) whose data is known while lowering. Identity is the
//! [`TensorId`] handed out by an explicit [`IdAllocator`]; names are labels only and are never
//! used to deduplicate values.

mod buffer;
mod dtype;
mod quant;
mod shape;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use buffer::{Element, TensorBuffer};
pub use dtype::DType;
pub use quant::{QuantParam, Quantization, Scale, ZeroPoint};
pub use shape::Shape;

/// Shared handle used by graphs and operators to reference the same tensor.
pub type TensorRef = Arc<Tensor>;

/// Invariant violations raised while building tensors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TensorError {
    #[error("unsupported dtype `{0}`")]
    UnknownDType(String),
    #[error("tensor '{tensor}' is declared as {declared} but its buffer holds {buffer}")]
    BufferDTypeMismatch {
        tensor: String,
        declared: DType,
        buffer: DType,
    },
    #[error("buffer with dims {dims:?} needs {expected} elements, got {actual}")]
    BufferLength {
        expected: usize,
        actual: usize,
        dims: Vec<usize>,
    },
    #[error("tensor '{tensor}' already has {field} {existing}, cannot change it to {incoming}")]
    QuantizationConflict {
        tensor: String,
        field: &'static str,
        existing: String,
        incoming: String,
    },
}

/// Identity of a tensor within one allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorId(pub u64);

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source owned by a graph-building context.
///
/// Builders that construct graphs concurrently must each own an allocator or synchronize
/// access to a shared one; the lowering core never allocates ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    seed: u64,
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts numbering at `seed`, which is also where [`reset`](Self::reset) returns to.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, next: seed }
    }

    pub fn next_id(&mut self) -> TensorId {
        let id = TensorId(self.next);
        self.next += 1;
        id
    }

    /// Id that the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> TensorId {
        TensorId(self.next)
    }

    pub fn reset(&mut self) {
        self.next = self.seed;
    }
}

/// Whether a tensor carries data at lowering time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TensorKind {
    /// Activation; its value only exists at run time.
    Neuron,
    /// Constant coefficient with data known while lowering.
    Coeff,
}

impl TensorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TensorKind::Neuron => "neuron",
            TensorKind::Coeff => "coeff",
        }
    }
}

/// One logical value of a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    id: TensorId,
    name: String,
    shape: Shape,
    dtype: DType,
    kind: TensorKind,
    buffer: Option<TensorBuffer>,
    quant: Quantization,
}

impl Tensor {
    /// Creates an activation tensor named `BMTensor<id>`.
    pub fn new(ids: &mut IdAllocator, shape: impl Into<Shape>, dtype: DType) -> Self {
        let id = ids.next_id();
        Tensor {
            id,
            name: format!("BMTensor{}", id.0),
            shape: shape.into(),
            dtype,
            kind: TensorKind::Neuron,
            buffer: None,
            quant: Quantization::default(),
        }
    }

    /// Creates a coefficient tensor whose shape and dtype are taken from `buffer`.
    pub fn coeff(ids: &mut IdAllocator, buffer: TensorBuffer) -> Self {
        let mut tensor = Tensor::new(ids, buffer.dims(), buffer.dtype());
        tensor.kind = TensorKind::Coeff;
        tensor.buffer = Some(buffer);
        tensor
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches constant data; the buffer's dtype must equal the declared dtype.
    ///
    /// The buffer's dims are not checked here: a mismatch is reported when the tensor is
    /// materialized during lowering.
    pub fn with_buffer(mut self, buffer: TensorBuffer) -> Result<Self, TensorError> {
        if buffer.dtype() != self.dtype {
            return Err(TensorError::BufferDTypeMismatch {
                tensor: self.name,
                declared: self.dtype,
                buffer: buffer.dtype(),
            });
        }
        self.buffer = Some(buffer);
        Ok(self)
    }

    /// Builder form of [`quantize`](Self::quantize).
    pub fn with_quantization(
        mut self,
        scale: Option<Scale>,
        zero_point: Option<ZeroPoint>,
    ) -> Result<Self, TensorError> {
        self.quantize(scale, zero_point)?;
        Ok(self)
    }

    /// Merges quantization parameters; see [`Quantization::merge`].
    pub fn quantize(
        &mut self,
        scale: Option<Scale>,
        zero_point: Option<ZeroPoint>,
    ) -> Result<(), TensorError> {
        self.quant.merge(&self.name, scale, zero_point)
    }

    pub fn into_ref(self) -> TensorRef {
        Arc::new(self)
    }

    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn kind(&self) -> TensorKind {
        self.kind
    }

    pub fn buffer(&self) -> Option<&TensorBuffer> {
        self.buffer.as_ref()
    }

    pub fn is_quantized(&self) -> bool {
        self.quant.is_quantized()
    }

    pub fn scale(&self) -> Option<&Scale> {
        self.quant.scale()
    }

    pub fn zero_point(&self) -> Option<&ZeroPoint> {
        self.quant.zero_point()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tensor (")?;
        writeln!(f, "  id: {}", self.id)?;
        writeln!(f, "  name: {}", self.name)?;
        writeln!(f, "  shape: {}", self.shape)?;
        writeln!(f, "  ttype: {}", self.kind.as_str())?;
        writeln!(f, "  dtype: {}", self.dtype)?;
        match &self.buffer {
            Some(buffer) => writeln!(f, "  buffer: {:?} x {}", buffer.dims(), buffer.dtype())?,
            None => writeln!(f, "  buffer: None")?,
        }
        if self.is_quantized() {
            match self.scale() {
                Some(scale) => writeln!(f, "  scale: {scale}")?,
                None => writeln!(f, "  scale: None")?,
            }
            match self.zero_point() {
                Some(zero_point) => writeln!(f, "  zero_point: {zero_point}")?,
                None => writeln!(f, "  zero_point: None")?,
            }
        }
        write!(f, ")")
    }
}
