//! Target SSA intermediate representation.
//!
//! A [`Module`] holds one entry function whose parameters are the graph inputs, whose body is
//! a flat list of operations in emission order, and which ends in a single return. Types
//! follow MLIR's builtin and `quant` dialect spellings; operations are generic
//! (`"top.Conv"(...)`) so any namespaced operator name can be emitted.

pub mod attrs;
mod literal;
pub mod module;
pub mod printer;
pub mod types;

pub use attrs::Attribute;
pub use module::{
    Argument, Function, FunctionBuilder, Location, Module, ModuleError, Operand, Operation,
    ValueId,
};
pub use printer::PrintOptions;
pub use types::{
    ElementType, QuantizedType, StorageType, TensorType, TypeParseError, UniformQuantized,
    UniformQuantizedPerAxis, FLAG_SIGNED,
};
