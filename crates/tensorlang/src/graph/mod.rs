//! Operators and graphs assembled by the builder layer.
//!
//! A [`Graph`] is handed to the lowering driver whole and treated as read-only from then on.
//! Its operator list is expected to be in topological order: every operand of operator `k` is
//! a graph input, an output of an operator before `k`, or a constant carrying its own buffer.

mod params;

use std::collections::BTreeMap;
use std::fmt;

use crate::tensor::TensorRef;

pub use params::{Param, ParamRecord};

/// One node of the computation.
#[derive(Debug, Clone)]
pub struct Operator {
    op_name: String,
    inputs: Vec<Option<TensorRef>>,
    outputs: Vec<TensorRef>,
    params: BTreeMap<String, Param>,
}

impl Operator {
    /// Creates an operator; `None` inputs are absent optional operands.
    pub fn new(
        op_name: impl Into<String>,
        inputs: Vec<Option<TensorRef>>,
        outputs: Vec<TensorRef>,
    ) -> Self {
        Operator {
            op_name: op_name.into(),
            inputs,
            outputs,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Param) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn op_name(&self) -> &str {
        &self.op_name
    }

    pub fn inputs(&self) -> &[Option<TensorRef>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorRef] {
        &self.outputs
    }

    pub fn params(&self) -> &BTreeMap<String, Param> {
        &self.params
    }
}

/// Named, ordered computation with a positional calling convention.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    inputs: Vec<TensorRef>,
    outputs: Vec<TensorRef>,
    operators: Vec<Operator>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Graph {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            operators: Vec::new(),
        }
    }

    pub fn set_inputs(&mut self, inputs: Vec<TensorRef>) {
        self.inputs = inputs;
    }

    pub fn set_outputs(&mut self, outputs: Vec<TensorRef>) {
        self.outputs = outputs;
    }

    /// Appends an operator; callers append only after all of its operands are available.
    pub fn add_operator(&mut self, operator: Operator) {
        self.operators.push(operator);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[TensorRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorRef] {
        &self.outputs
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (", self.op_name)?;
        writeln!(f, "  inputs (")?;
        for input in &self.inputs {
            match input {
                Some(tensor) => writeln!(f, "{}", indent(&tensor.to_string(), 4))?,
                None => writeln!(f, "    None")?,
            }
        }
        writeln!(f, "  )")?;
        writeln!(f, "  outputs (")?;
        for output in &self.outputs {
            writeln!(f, "{}", indent(&output.to_string(), 4))?;
        }
        writeln!(f, "  )")?;
        write!(f, ")")
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (", self.name)?;
        writeln!(f, "  inputs (")?;
        for input in &self.inputs {
            writeln!(f, "{}", indent(&input.to_string(), 4))?;
        }
        writeln!(f, "  )")?;
        writeln!(f, "  outputs (")?;
        for output in &self.outputs {
            writeln!(f, "{}", indent(&output.to_string(), 4))?;
        }
        writeln!(f, "  )")?;
        writeln!(f, "  body (")?;
        for operator in &self.operators {
            writeln!(f, "{}", indent(&operator.to_string(), 4))?;
        }
        writeln!(f, "  )")?;
        write!(f, ")")
    }
}

fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
