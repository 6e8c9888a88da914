//! Textual rendering of modules in an MLIR-flavoured syntax.
//!
//! ```text
//! module @net attributes {module.platform = "TPULANG", module.state = "TOP_F32"} {
//!   func.func @main(%0: tensor<1x3x4x4xf32> loc("in")) -> tensor<1x3x4x4xf32> {
//!     %1 = "top.Relu"(%0) : (tensor<1x3x4x4xf32>) -> tensor<1x3x4x4xf32> loc(fused["out"])
//!     return %1 : tensor<1x3x4x4xf32>
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use super::attrs::write_dict;
use super::literal::{identifier, quote};
use super::module::{Function, Location, Module, Operand, Operation, ValueId};
use super::types::TensorType;

/// Controls optional parts of the printed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOptions {
    /// Emit `loc(...)` annotations after arguments and operations.
    pub locations: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions { locations: true }
    }
}

impl Module {
    pub fn to_text(&self) -> String {
        format!("{self}")
    }

    pub fn to_text_with(&self, options: PrintOptions) -> String {
        format!("{}", ModulePrinter::new(self, options))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&ModulePrinter::new(self, PrintOptions::default()), f)
    }
}

struct ModulePrinter<'a> {
    module: &'a Module,
    options: PrintOptions,
}

impl<'a> ModulePrinter<'a> {
    fn new(module: &'a Module, options: PrintOptions) -> Self {
        Self { module, options }
    }
}

impl fmt::Display for ModulePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module @{}", identifier(&self.module.name))?;
        if !self.module.attributes.is_empty() {
            f.write_str(" attributes ")?;
            write_dict(f, &self.module.attributes)?;
        }
        f.write_str(" {\n")?;
        for function in &self.module.functions {
            fmt_function(function, self.options, f)?;
        }
        f.write_str("}\n")
    }
}

fn fmt_function(
    function: &Function,
    options: PrintOptions,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let mut types: HashMap<ValueId, &TensorType> = HashMap::new();
    for argument in &function.arguments {
        types.insert(argument.id, &argument.ty);
    }
    for op in &function.body {
        for (id, ty) in op.results.iter().zip(&op.result_types) {
            types.insert(*id, ty);
        }
    }

    let arguments = function
        .arguments
        .iter()
        .map(|argument| {
            let mut rendered = format!("{}: {}", argument.id, argument.ty);
            if options.locations {
                rendered.push(' ');
                rendered.push_str(&format_location(&argument.location));
            }
            rendered
        })
        .collect::<Vec<_>>()
        .join(", ");
    write_line(
        f,
        1,
        &format!(
            "func.func @{}({}) -> {} {{",
            function.name,
            arguments,
            format_type_list(&function.result_types)
        ),
    )?;

    for op in &function.body {
        write_line(f, 2, &format_operation(op, &types, options))?;
    }

    let values = function
        .returns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    if values.is_empty() {
        write_line(f, 2, "return")?;
    } else {
        let return_types = function
            .result_types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        write_line(
            f,
            2,
            &format!("return {} : {}", values.join(", "), return_types.join(", ")),
        )?;
    }
    write_line(f, 1, "}")
}

fn format_operation(
    op: &Operation,
    types: &HashMap<ValueId, &TensorType>,
    options: PrintOptions,
) -> String {
    let mut line = String::new();
    if !op.results.is_empty() {
        let results = op
            .results
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        line.push_str(&results.join(", "));
        line.push_str(" = ");
    }

    let operands = op
        .operands
        .iter()
        .map(|operand| match operand {
            Operand::Value(id) => id.to_string(),
            Operand::None => "none".to_string(),
        })
        .collect::<Vec<_>>();
    line.push_str(&format!("{}({})", quote(&op.name), operands.join(", ")));

    if !op.attributes.is_empty() {
        let attrs = op
            .attributes
            .iter()
            .map(|(name, value)| format!("{} = {value}", identifier(name)))
            .collect::<Vec<_>>();
        line.push_str(&format!(" {{{}}}", attrs.join(", ")));
    }

    let operand_types = op
        .operands
        .iter()
        .map(|operand| match operand {
            Operand::Value(id) => types
                .get(id)
                .map(|ty| ty.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            Operand::None => TensorType::None.to_string(),
        })
        .collect::<Vec<_>>();
    line.push_str(&format!(
        " : ({}) -> {}",
        operand_types.join(", "),
        format_type_list(&op.result_types)
    ));

    if options.locations {
        line.push(' ');
        line.push_str(&format_location(&op.location));
    }
    line
}

fn format_type_list(types: &[TensorType]) -> String {
    match types {
        [single] => single.to_string(),
        _ => format!(
            "({})",
            types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn format_location(location: &Location) -> String {
    match location {
        Location::Name(name) => format!("loc({})", quote(name)),
        Location::Fused(names) => {
            let names = names.iter().map(|name| quote(name)).collect::<Vec<_>>();
            format!("loc(fused[{}])", names.join(", "))
        }
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, indent: usize, line: &str) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    writeln!(f, "{line}")
}
