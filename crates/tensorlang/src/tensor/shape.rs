//! Lightweight wrapper for declared tensor shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared shape of a graph tensor.
///
/// An empty dimension list is unranked. `Absent` marks an optional output that an operator
/// does not produce in a particular call; it lowers to the IR's `none` type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Ranked(Vec<usize>),
    Unranked,
    Absent,
}

impl Shape {
    /// Constructs a shape from the provided dimensions; no dimensions means unranked.
    pub fn new<D: Into<Vec<usize>>>(dims: D) -> Self {
        let dims = dims.into();
        if dims.is_empty() {
            Shape::Unranked
        } else {
            Shape::Ranked(dims)
        }
    }

    /// Borrow the dimensions; unranked and absent shapes report an empty slice.
    pub fn dims(&self) -> &[usize] {
        match self {
            Shape::Ranked(dims) => dims,
            Shape::Unranked | Shape::Absent => &[],
        }
    }

    /// Returns `true` when a concrete buffer with `dims` can back this declaration.
    pub fn matches_dims(&self, dims: &[usize]) -> bool {
        match self {
            Shape::Ranked(declared) => declared.as_slice() == dims,
            Shape::Unranked => dims.is_empty(),
            Shape::Absent => false,
        }
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Ranked(dims) => write!(f, "{dims:?}"),
            Shape::Unranked => f.write_str("[]"),
            Shape::Absent => f.write_str("None"),
        }
    }
}
