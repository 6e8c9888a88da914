//! Graph-to-SSA lowering.
//!
//! [`GraphLowering`] binds the graph inputs as function arguments, emits one operation per
//! operator in stored order, lazily materializes constants through the [`SymbolTable`] and
//! closes the function with a single return. Any failure aborts the run; there is no partial
//! module.

pub mod attr_encoder;
pub mod config;
pub mod driver;
pub mod error;
pub mod symbol_table;
pub mod type_encoder;

pub use attr_encoder::encode_params;
pub use config::{LowerConfig, LowerMode, ReturnOrder};
pub use driver::{lower_graph, GraphLowering, LoweredModule, LoweringStats};
pub use error::{AttrError, LowerError};
pub use symbol_table::{Resolution, SymbolTable};
pub use type_encoder::{element_type, quantized_type, result_types, storage_type, tensor_type};
