use serde::{Serialize, Deserialize};

use crate::autograd::{Tape, Var};
use crate::math::matrix::Matrix;

/// Ordered, named parameter tensors of one trainable sub-network.
///
/// This is the network's serializable state: layers refer to their tensors
/// by index, and optimizers keep one moment buffer per index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    names: Vec<String>,
    tensors: Vec<Matrix>,
}

impl ParamSet {
    pub fn new() -> ParamSet {
        ParamSet::default()
    }

    /// Appends a tensor and returns its index.
    pub fn push(&mut self, name: impl Into<String>, tensor: Matrix) -> usize {
        self.names.push(name.into());
        self.tensors.push(tensor);
        self.tensors.len() - 1
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn tensors(&self) -> &[Matrix] {
        &self.tensors
    }

    pub fn tensors_mut(&mut self) -> &mut [Matrix] {
        &mut self.tensors
    }

    pub fn get(&self, index: usize) -> &Matrix {
        &self.tensors[index]
    }

    /// Total number of scalar parameters.
    pub fn count(&self) -> usize {
        self.tensors.iter().map(Matrix::len).sum()
    }

    /// Records every tensor as a tape leaf, in index order.
    pub fn bind(&self, tape: &mut Tape) -> Vec<Var> {
        self.tensors.iter().map(|t| tape.leaf(t.clone())).collect()
    }

    /// Checks that every name has a tensor and every buffer fills its shape.
    pub fn check_consistent(&self) -> Result<(), String> {
        if self.names.len() != self.tensors.len() {
            return Err(format!("{} names for {} tensors", self.names.len(), self.tensors.len()));
        }
        for (name, tensor) in self.names.iter().zip(self.tensors.iter()) {
            if tensor.data.len() != tensor.rows * tensor.cols {
                return Err(format!(
                    "tensor '{}' has {} values for shape {}x{}",
                    name,
                    tensor.data.len(),
                    tensor.rows,
                    tensor.cols
                ));
            }
        }
        Ok(())
    }

    /// Checks that `other` has the same names and shapes, in the same order.
    pub fn check_compatible(&self, other: &ParamSet) -> Result<(), String> {
        if self.len() != other.len() || other.names.len() != other.tensors.len() {
            return Err(format!(
                "expected {} tensors, found {} ({} names)",
                self.len(),
                other.len(),
                other.names.len()
            ));
        }
        for (i, (name, tensor)) in self.names.iter().zip(self.tensors.iter()).enumerate() {
            if &other.names[i] != name {
                return Err(format!("tensor {} is named '{}', expected '{}'", i, other.names[i], name));
            }
            if other.tensors[i].shape() != tensor.shape() {
                return Err(format!(
                    "tensor '{}' has shape {:?}, expected {:?}",
                    name,
                    other.tensors[i].shape(),
                    tensor.shape()
                ));
            }
            if other.tensors[i].data.len() != other.tensors[i].rows * other.tensors[i].cols {
                return Err(format!("tensor '{}' has a truncated buffer", name));
            }
        }
        Ok(())
    }
}
