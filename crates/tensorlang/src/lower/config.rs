use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::env;
use crate::ir::PrintOptions;

/// Precision the module is lowered for; recorded as the `module.state` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowerMode {
    #[default]
    F32,
    Quantized,
}

impl LowerMode {
    pub fn state(self) -> &'static str {
        match self {
            LowerMode::F32 => "TOP_F32",
            LowerMode::Quantized => "TOP_QUANTIZED",
        }
    }
}

/// Which values the terminal return carries, and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOrder {
    /// The graph's declared outputs, in declaration order, resolved after the body.
    #[default]
    Declared,
    /// Operator outputs whose name matches a declared output, in the order they are emitted.
    Emission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerConfig {
    pub mode: LowerMode,
    pub return_order: ReturnOrder,
    /// Weight file recorded in the module; defaults to `<graph>_<state>_weight.bin`.
    pub weight_file: Option<String>,
    pub print_locations: bool,
}

impl Default for LowerConfig {
    fn default() -> Self {
        LowerConfig {
            mode: LowerMode::default(),
            return_order: ReturnOrder::default(),
            weight_file: None,
            print_locations: env::print_locations_enabled(),
        }
    }
}

impl LowerConfig {
    pub fn with_mode(mut self, mode: LowerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_return_order(mut self, return_order: ReturnOrder) -> Self {
        self.return_order = return_order;
        self
    }

    pub fn with_weight_file(mut self, weight_file: impl Into<String>) -> Self {
        self.weight_file = Some(weight_file.into());
        self
    }

    pub fn with_print_locations(mut self, print_locations: bool) -> Self {
        self.print_locations = print_locations;
        self
    }

    pub fn from_json_str(src: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(src)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read lowering config {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("failed to parse lowering config {}", path.display()))
    }

    pub fn weight_file_for(&self, graph_name: &str) -> String {
        match &self.weight_file {
            Some(name) => name.clone(),
            None => format!(
                "{}_{}_weight.bin",
                graph_name,
                self.mode.state().to_ascii_lowercase()
            ),
        }
    }

    pub fn print_options(&self) -> PrintOptions {
        PrintOptions {
            locations: self.print_locations,
        }
    }
}
