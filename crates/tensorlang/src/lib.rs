//! Lowering of builder-constructed tensor graphs into an MLIR-style SSA module.
//!
//! The pipeline is [`graph::Graph`] → [`lower::GraphLowering`] → [`lower::LoweredModule`],
//! which carries the [`ir::Module`] and the [`io::WeightArchive`] of every constant the module
//! references.

mod env;

pub mod graph;
pub mod io;
pub mod ir;
pub mod lower;
pub mod tensor;

pub use graph::{Graph, Operator, Param};
pub use lower::{lower_graph, GraphLowering, LowerConfig, LowerError, LoweredModule};
pub use tensor::{DType, IdAllocator, Shape, Tensor, TensorBuffer, TensorRef};
