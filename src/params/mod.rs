//! Model parameter sets and their shape signatures.
//!
//! A [`ParameterSet`] is the full trainable state of the shared classifier:
//! an ordered list of named tensors. Its [`ShapeSignature`] is fixed for the
//! lifetime of an aggregator, and every local copy must match it.

use std::fmt;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::math::norms::l2_distance;

/// Dense tensor of model parameters.
pub type Tensor = ArrayD<f32>;

/// Ordered list of tensor dimensions defining a valid [`ParameterSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeSignature(Vec<Vec<usize>>);

impl ShapeSignature {
    /// Create a signature from per-tensor dimensions.
    pub fn new(dims: Vec<Vec<usize>>) -> Self {
        Self(dims)
    }

    /// Per-tensor dimensions, in order.
    pub fn dims(&self) -> &[Vec<usize>] {
        &self.0
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the signature has no tensors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of scalar parameters.
    pub fn num_params(&self) -> usize {
        self.0.iter().map(|d| d.iter().product::<usize>()).sum()
    }
}

impl fmt::Display for ShapeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A tensor with its layer-qualified name (e.g. `dense_1/kernel`).
#[derive(Clone, Debug, PartialEq)]
pub struct NamedTensor {
    /// Informative name; shape comparison is positional
    pub name: String,
    /// Tensor values
    pub value: Tensor,
}

/// Ordered sequence of named tensors representing one model's trainable state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSet {
    tensors: Vec<NamedTensor>,
}

impl ParameterSet {
    /// Create an empty (uninitialized) parameter set.
    pub fn new() -> Self {
        Self {
            tensors: Vec::new(),
        }
    }

    /// Build a parameter set from unnamed tensors, naming them `tensor_{i}`.
    pub fn from_tensors(tensors: Vec<Tensor>) -> Self {
        Self {
            tensors: tensors
                .into_iter()
                .enumerate()
                .map(|(i, value)| NamedTensor {
                    name: format!("tensor_{}", i),
                    value,
                })
                .collect(),
        }
    }

    /// Append a named tensor.
    pub fn push(&mut self, name: impl Into<String>, value: Tensor) {
        self.tensors.push(NamedTensor {
            name: name.into(),
            value,
        });
    }

    /// Builder form of [`push`](Self::push).
    pub fn with_tensor(mut self, name: impl Into<String>, value: Tensor) -> Self {
        self.push(name, value);
        self
    }

    /// Whether the set holds no tensors (first-ever round).
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Named tensors, in order.
    pub fn tensors(&self) -> &[NamedTensor] {
        &self.tensors
    }

    /// Iterate over tensor values, in order.
    pub fn values(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.iter().map(|t| &t.value)
    }

    /// Consume the set, returning its named tensors.
    pub fn into_tensors(self) -> Vec<NamedTensor> {
        self.tensors
    }

    /// Shape signature of this set.
    pub fn signature(&self) -> ShapeSignature {
        ShapeSignature(self.tensors.iter().map(|t| t.value.shape().to_vec()).collect())
    }

    /// All values flattened in tensor order, row-major within each tensor.
    pub fn flatten(&self) -> Vec<f32> {
        self.values().flat_map(|t| t.iter().copied()).collect()
    }

    /// Whether every value is finite.
    pub fn is_finite(&self) -> bool {
        self.values().all(|t| t.iter().all(|v| v.is_finite()))
    }

    /// First tensor holding a non-finite value, if any.
    pub fn first_non_finite(&self) -> Option<&str> {
        self.tensors
            .iter()
            .find(|t| t.value.iter().any(|v| !v.is_finite()))
            .map(|t| t.name.as_str())
    }

    /// L2 distance to another set, or `None` when signatures differ.
    pub fn l2_distance(&self, other: &ParameterSet) -> Option<f32> {
        if self.signature() != other.signature() {
            return None;
        }
        l2_distance(&self.flatten(), &other.flatten())
    }
}
