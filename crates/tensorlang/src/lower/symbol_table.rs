//! Tensor-id keyed map of materialized SSA values.
//!
//! Lookups are split in two: [`SymbolTable::resolve`] inspects a tensor without mutating
//! anything and says whether it is already bound, needs a weight node, or cannot be
//! materialized at all; [`SymbolTable::bind`] records the value once the caller has emitted
//! whatever was needed. Names never participate in the lookup.

use std::collections::HashMap;

use crate::ir::ValueId;
use crate::tensor::{Tensor, TensorBuffer, TensorId};

use super::error::LowerError;

/// Outcome of looking a tensor up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'t> {
    /// The tensor already has an SSA value.
    Bound(ValueId),
    /// The tensor is an unbound constant; emit a weight node for this buffer, then bind it.
    Materialize(&'t TensorBuffer),
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    values: HashMap<TensorId, ValueId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides how `tensor` becomes an SSA value.
    ///
    /// Unbound tensors must carry a buffer whose dims equal the declared shape.
    pub fn resolve<'t>(&self, tensor: &'t Tensor) -> Result<Resolution<'t>, LowerError> {
        if let Some(&value) = self.values.get(&tensor.id()) {
            return Ok(Resolution::Bound(value));
        }
        let buffer = tensor.buffer().ok_or_else(|| LowerError::NotConstant {
            tensor: tensor.name().to_string(),
        })?;
        if !tensor.shape().matches_dims(buffer.dims()) {
            return Err(LowerError::ShapeAmbiguous {
                tensor: tensor.name().to_string(),
                declared: tensor.shape().to_string(),
                buffer: buffer.dims().to_vec(),
            });
        }
        Ok(Resolution::Materialize(buffer))
    }

    /// Records the value of `id`. Rebinding an id replaces the previous value.
    pub fn bind(&mut self, id: TensorId, value: ValueId) {
        self.values.insert(id, value);
    }

    pub fn get(&self, id: TensorId) -> Option<ValueId> {
        self.values.get(&id).copied()
    }

    /// Number of bound tensors.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
