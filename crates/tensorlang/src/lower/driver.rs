//! Walks a graph and emits the entry function of the SSA module.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;
use tracing::{debug, info, instrument, trace};

use crate::graph::{Graph, Operator};
use crate::io::{self, WeightArchive};
use crate::ir::{Attribute, FunctionBuilder, Location, Module, Operand, PrintOptions, ValueId};
use crate::tensor::Tensor;

use super::attr_encoder::encode_params;
use super::config::{LowerConfig, ReturnOrder};
use super::error::LowerError;
use super::symbol_table::{Resolution, SymbolTable};
use super::type_encoder::{result_types, tensor_type};

/// Name of the emitted entry function.
pub const ENTRY_FUNCTION: &str = "main";
/// Operation that materializes a constant from the weight archive.
pub const WEIGHT_OP: &str = "top.Weight";
pub const PLATFORM: &str = "TPULANG";

/// Counters describing one lowering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoweringStats {
    /// Operations in the function body, weight nodes included.
    pub operations: usize,
    /// Distinct tensors that received an SSA value.
    pub bound_tensors: usize,
    /// Constants materialized as weight nodes.
    pub weights: usize,
}

/// Result of lowering a graph: the module plus the constants its weight nodes refer to.
#[derive(Debug, Clone)]
pub struct LoweredModule {
    pub module: Module,
    pub weights: WeightArchive,
    pub stats: LoweringStats,
    print_options: PrintOptions,
}

impl LoweredModule {
    /// Module text, honouring the configured print options.
    pub fn to_text(&self) -> String {
        self.module.to_text_with(self.print_options)
    }

    /// Writes the module text and the weight archive.
    ///
    /// Both files are fully written to temporaries before either is renamed into place, and
    /// the module is published last.
    pub fn write_artifacts(
        &self,
        module_path: impl AsRef<Path>,
        weights_path: impl AsRef<Path>,
    ) -> anyhow::Result<()> {
        let module_path = module_path.as_ref();
        let weights_path = weights_path.as_ref();
        let text = self.to_text();
        let module_file = io::stage(module_path, |writer| {
            writer.write_all(text.as_bytes())?;
            Ok(())
        })
        .with_context(|| format!("failed to write module {}", module_path.display()))?;
        let weights_file = self
            .weights
            .stage(weights_path)
            .with_context(|| format!("failed to write weights {}", weights_path.display()))?;
        weights_file.persist()?;
        module_file.persist()?;
        info!(
            module = %module_path.display(),
            weights = %weights_path.display(),
            weight_count = self.weights.len(),
            "artifacts written"
        );
        Ok(())
    }
}

/// Lowers `graph` with the default configuration.
pub fn lower_graph(graph: &Graph) -> Result<LoweredModule, LowerError> {
    GraphLowering::new(graph, LowerConfig::default()).lower()
}

/// State of one lowering run over a single graph.
///
/// The symbol table and the weight accumulator are private to the run, so independent graphs
/// can be lowered concurrently by independent instances.
pub struct GraphLowering<'g> {
    graph: &'g Graph,
    config: LowerConfig,
    builder: FunctionBuilder,
    symbols: SymbolTable,
    weights: WeightArchive,
}

impl<'g> GraphLowering<'g> {
    pub fn new(graph: &'g Graph, config: LowerConfig) -> Self {
        Self {
            graph,
            config,
            builder: FunctionBuilder::new(),
            symbols: SymbolTable::new(),
            weights: WeightArchive::new(),
        }
    }

    #[instrument(skip_all, fields(graph = %self.graph.name()))]
    pub fn lower(mut self) -> Result<LoweredModule, LowerError> {
        let graph = self.graph;

        for input in graph.inputs() {
            let ty = tensor_type(input)?;
            let value = self.builder.add_argument(ty, Location::name(input.name()));
            self.symbols.bind(input.id(), value);
        }

        let declared = graph
            .outputs()
            .iter()
            .map(|tensor| tensor.name())
            .collect::<HashSet<_>>();
        let mut emitted_returns = Vec::new();
        for operator in graph.operators() {
            let results = self.emit_operator(operator)?;
            if self.config.return_order == ReturnOrder::Emission {
                for (tensor, value) in operator.outputs().iter().zip(&results) {
                    if declared.contains(tensor.name()) {
                        emitted_returns.push(*value);
                    }
                }
            }
        }

        let returns = match self.config.return_order {
            ReturnOrder::Declared => graph
                .outputs()
                .iter()
                .map(|tensor| self.lookup(tensor))
                .collect::<Result<Vec<_>, _>>()?,
            ReturnOrder::Emission => emitted_returns,
        };

        let stats = LoweringStats {
            operations: self.builder.num_operations(),
            bound_tensors: self.symbols.len(),
            weights: self.weights.len(),
        };
        let function = self.builder.finish(ENTRY_FUNCTION, returns)?;
        let module = Module::new(graph.name())
            .with_attribute("module.platform", Attribute::string(PLATFORM))
            .with_attribute("module.state", Attribute::string(self.config.mode.state()))
            .with_attribute(
                "module.weight_file",
                Attribute::string(self.config.weight_file_for(graph.name())),
            )
            .with_function(function);

        info!(
            inputs = graph.inputs().len(),
            operations = stats.operations,
            weights = stats.weights,
            "graph lowered"
        );
        Ok(LoweredModule {
            module,
            weights: self.weights,
            stats,
            print_options: self.config.print_options(),
        })
    }

    fn emit_operator(&mut self, operator: &Operator) -> Result<Vec<ValueId>, LowerError> {
        let attributes = encode_params(operator.params())?;
        let operands = operator
            .inputs()
            .iter()
            .map(|slot| match slot {
                Some(tensor) => self.lookup(tensor).map(Operand::Value),
                None => Ok(Operand::None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let types = result_types(operator.outputs())?;
        let location = Location::fused(operator.outputs().iter().map(|tensor| tensor.name()));

        let results = self
            .builder
            .emit(operator.op_name(), operands, attributes, types, location);
        for (tensor, value) in operator.outputs().iter().zip(&results) {
            self.symbols.bind(tensor.id(), *value);
        }
        debug!(
            op = operator.op_name(),
            operands = operator.inputs().len(),
            results = results.len(),
            "operation emitted"
        );
        Ok(results)
    }

    /// SSA value of `tensor`, emitting a weight node on its first use as a constant.
    fn lookup(&mut self, tensor: &Tensor) -> Result<ValueId, LowerError> {
        match self.symbols.resolve(tensor)? {
            Resolution::Bound(value) => {
                trace!(tensor = tensor.name(), %value, "symbol hit");
                Ok(value)
            }
            Resolution::Materialize(buffer) => {
                let ty = tensor_type(tensor)?;
                if self
                    .weights
                    .insert(tensor.name(), buffer.clone())
                    .is_some()
                {
                    return Err(LowerError::DuplicateWeight {
                        name: tensor.name().to_string(),
                    });
                }
                let value = self.builder.emit_one(
                    WEIGHT_OP,
                    Vec::new(),
                    BTreeMap::new(),
                    ty,
                    Location::name(tensor.name()),
                );
                self.symbols.bind(tensor.id(), value);
                debug!(
                    tensor = tensor.name(),
                    dims = ?buffer.dims(),
                    %value,
                    "weight materialized"
                );
                Ok(value)
            }
        }
    }
}
