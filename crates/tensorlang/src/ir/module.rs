use std::collections::{BTreeMap, HashMap};
use std::{fmt, fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::attrs::Attribute;
use super::types::TensorType;

/// Unique identifier for SSA values within a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Operand reference in an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    /// Canonical "no value" marker for absent optional operands.
    None,
}

/// Source location attached to arguments and operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Name(String),
    Fused(Vec<String>),
}

impl Location {
    pub fn name(name: impl Into<String>) -> Self {
        Location::Name(name.into())
    }

    pub fn fused<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Location::Fused(names.into_iter().map(Into::into).collect())
    }
}

/// Positional function argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub id: ValueId,
    pub index: usize,
    pub ty: TensorType,
    pub location: Location,
}

/// Single SSA operation with zero or more results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub results: Vec<ValueId>,
    pub operands: Vec<Operand>,
    pub attributes: BTreeMap<String, Attribute>,
    pub result_types: Vec<TensorType>,
    pub location: Location,
}

/// Function with one parameter list, a body, and one terminal return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub body: Vec<Operation>,
    pub returns: Vec<ValueId>,
    pub result_types: Vec<TensorType>,
}

impl Function {
    /// Finds the operation producing `value`, if any.
    pub fn producer(&self, value: ValueId) -> Option<&Operation> {
        self.body.iter().find(|op| op.results.contains(&value))
    }

    /// Iterates over operations with the given name.
    pub fn ops_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Operation> + 'a {
        self.body.iter().filter(move |op| op.name == name)
    }
}

/// Top-level container emitted by lowering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub attributes: BTreeMap<String, Attribute>,
    pub functions: Vec<Function>,
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("value {0} has no recorded type")]
    UnknownValue(ValueId),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            attributes: BTreeMap::new(),
            functions: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Attribute) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn with_function(mut self, function: Function) -> Self {
        self.functions.push(function);
        self
    }

    /// First function of the module; lowering always emits exactly one.
    pub fn entry(&self) -> Option<&Function> {
        self.functions.first()
    }

    pub fn to_json_string(&self) -> Result<String, ModuleError> {
        serde_json::to_string_pretty(self).map_err(ModuleError::from)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ModuleError> {
        serde_json::from_str(src).map_err(ModuleError::from)
    }

    pub fn to_bincode_bytes(&self) -> Result<Vec<u8>, ModuleError> {
        bincode::serialize(self).map_err(ModuleError::from)
    }

    pub fn from_bincode_slice(bytes: &[u8]) -> Result<Self, ModuleError> {
        bincode::deserialize(bytes).map_err(ModuleError::from)
    }

    /// Writes the JSON form to `path`; the file only appears once it is complete.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = self.to_json_string()?;
        crate::io::write_atomically(path.as_ref(), |writer| {
            writer.write_all(contents.as_bytes())?;
            Ok(())
        })
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModuleError> {
        let contents = fs::read_to_string(path)?;
        Module::from_json_str(&contents)
    }
}

/// Incremental builder for a single [`Function`].
///
/// Value ids are shared between arguments and operation results and are handed out in
/// emission order, so two identical emission sequences yield identical functions.
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    next_value_id: u32,
    arguments: Vec<Argument>,
    body: Vec<Operation>,
    value_types: HashMap<ValueId, TensorType>,
}

impl FunctionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_argument(&mut self, ty: TensorType, location: Location) -> ValueId {
        let id = self.allocate_value();
        self.value_types.insert(id, ty.clone());
        let index = self.arguments.len();
        self.arguments.push(Argument {
            id,
            index,
            ty,
            location,
        });
        id
    }

    /// Appends an operation and returns one value id per result type.
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        operands: Vec<Operand>,
        attributes: BTreeMap<String, Attribute>,
        result_types: Vec<TensorType>,
        location: Location,
    ) -> Vec<ValueId> {
        let results = result_types
            .iter()
            .map(|ty| {
                let id = self.allocate_value();
                self.value_types.insert(id, ty.clone());
                id
            })
            .collect::<Vec<_>>();
        self.body.push(Operation {
            name: name.into(),
            results: results.clone(),
            operands,
            attributes,
            result_types,
            location,
        });
        results
    }

    /// Single-result form of [`emit`](Self::emit).
    pub fn emit_one(
        &mut self,
        name: impl Into<String>,
        operands: Vec<Operand>,
        attributes: BTreeMap<String, Attribute>,
        result_type: TensorType,
        location: Location,
    ) -> ValueId {
        let id = self.allocate_value();
        self.value_types.insert(id, result_type.clone());
        self.body.push(Operation {
            name: name.into(),
            results: vec![id],
            operands,
            attributes,
            result_types: vec![result_type],
            location,
        });
        id
    }

    pub fn value_type(&self, id: ValueId) -> Option<&TensorType> {
        self.value_types.get(&id)
    }

    pub fn num_operations(&self) -> usize {
        self.body.len()
    }

    /// Closes the function with a return over `returns`.
    pub fn finish(
        self,
        name: impl Into<String>,
        returns: Vec<ValueId>,
    ) -> Result<Function, ModuleError> {
        let result_types = returns
            .iter()
            .map(|id| {
                self.value_types
                    .get(id)
                    .cloned()
                    .ok_or(ModuleError::UnknownValue(*id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Function {
            name: name.into(),
            arguments: self.arguments,
            body: self.body,
            returns,
            result_types,
        })
    }

    fn allocate_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{ElementType, StorageType};

    fn f32_type(dims: &[usize]) -> TensorType {
        TensorType::Ranked {
            dims: dims.to_vec(),
            element: StorageType::Element(ElementType::F32),
        }
    }

    #[test]
    fn builder_shares_value_numbering_between_args_and_results() {
        let mut builder = FunctionBuilder::new();
        let arg = builder.add_argument(f32_type(&[2]), Location::name("x"));
        let results = builder.emit(
            "top.Split",
            vec![Operand::Value(arg)],
            BTreeMap::new(),
            vec![f32_type(&[1]), TensorType::None],
            Location::fused(["a", "b"]),
        );
        assert_eq!(arg, ValueId(0));
        assert_eq!(results, vec![ValueId(1), ValueId(2)]);

        let function = builder.finish("main", vec![results[0]]).unwrap();
        assert_eq!(function.result_types, vec![f32_type(&[1])]);
        assert_eq!(function.producer(ValueId(2)).map(|op| op.name.as_str()), Some("top.Split"));
    }

    #[test]
    fn finish_rejects_unknown_return_values() {
        let builder = FunctionBuilder::new();
        let err = builder.finish("main", vec![ValueId(7)]).unwrap_err();
        assert!(matches!(err, ModuleError::UnknownValue(ValueId(7))));
    }
}
