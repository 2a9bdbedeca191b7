// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::module::{Layer, Parameter};
use crate::tensor::Matrix;
use crate::{NnError, NnResult};

/// Copy of every parameter matrix of a network, in visiting order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    tensors: Vec<Matrix>,
}

impl ParameterSnapshot {
    pub fn tensors(&self) -> &[Matrix] {
        &self.tensors
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Largest entry-wise distance to `other`, `None` if the layouts differ.
    pub fn max_abs_diff(&self, other: &ParameterSnapshot) -> Option<f32> {
        if self.tensors.len() != other.tensors.len() {
            return None;
        }
        self.tensors
            .iter()
            .zip(other.tensors.iter())
            .try_fold(0.0f32, |acc, (lhs, rhs)| {
                lhs.max_abs_diff(rhs).map(|diff| acc.max(diff))
            })
    }
}

/// Ordered chain of layers where each layer's output length equals the next
/// layer's input length. The chaining invariant is checked when layers are
/// added, so a network that exists is always well formed.
pub struct Network {
    name: String,
    layers: Vec<Box<dyn Layer>>,
}

impl core::fmt::Debug for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kinds: Vec<String> = self
            .layers
            .iter()
            .map(|layer| format!("{}({}->{})", layer.kind(), layer.input_len(), layer.output_len()))
            .collect();
        write!(f, "Network(name={}, layers=[{}])", self.name, kinds.join(", "))
    }
}

impl Network {
    /// Creates an empty network.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    /// Assembles a network from pre-boxed layers, failing on the first
    /// chaining mismatch.
    pub fn from_layers(
        name: impl Into<String>,
        layers: Vec<Box<dyn Layer>>,
    ) -> NnResult<Self> {
        let mut network = Self::new(name);
        for layer in layers {
            network.push_boxed(layer)?;
        }
        if network.is_empty() {
            return Err(NnError::EmptyNetwork);
        }
        Ok(network)
    }

    /// Appends a layer and returns the network, for builder-style assembly.
    pub fn with<L>(mut self, layer: L) -> NnResult<Self>
    where
        L: Layer + 'static,
    {
        self.push(layer)?;
        Ok(self)
    }

    /// Appends a new layer to the chain.
    pub fn push<L>(&mut self, layer: L) -> NnResult<()>
    where
        L: Layer + 'static,
    {
        self.push_boxed(Box::new(layer))
    }

    /// Appends a pre-boxed layer to the chain.
    pub fn push_boxed(&mut self, layer: Box<dyn Layer>) -> NnResult<()> {
        if let Some(previous) = self.layers.last() {
            if previous.output_len() != layer.input_len() {
                return Err(NnError::LayerChain {
                    index: self.layers.len(),
                    produced: previous.output_len(),
                    expected: layer.input_len(),
                });
            }
        }
        debug!(
            network = %self.name,
            index = self.layers.len(),
            kind = %layer.kind(),
            inputs = layer.input_len(),
            outputs = layer.output_len(),
            "appended layer"
        );
        self.layers.push(layer);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of layers registered in the network.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` when the network does not hold any layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Width of the first layer's input, 0 for an empty network.
    pub fn input_len(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.input_len())
    }

    /// Width of the last layer's output, 0 for an empty network.
    pub fn output_len(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.output_len())
    }

    /// Output of the last forward pass.
    pub fn output(&self) -> &[f32] {
        self.layers.last().map_or(&[], |layer| layer.output())
    }

    /// Feeds `input` through every layer and returns the last layer's output.
    pub fn forward(&mut self, input: &[f32]) -> NnResult<&[f32]> {
        let first = self.layers.first_mut().ok_or(NnError::EmptyNetwork)?;
        if input.len() != first.input_len() {
            return Err(NnError::InputLength {
                expected: first.input_len(),
                got: input.len(),
            });
        }
        first.input_mut().copy_from_slice(input);
        first.forward_pass();
        for idx in 1..self.layers.len() {
            let (head, tail) = self.layers.split_at_mut(idx);
            let layer = &mut tail[0];
            layer.input_mut().copy_from_slice(head[idx - 1].output());
            layer.forward_pass();
        }
        Ok(self.output())
    }

    /// Propagates an objective-wrt-output vector from the last layer to the
    /// first and returns the objective-wrt-input of the network.
    ///
    /// Valid only immediately after the forward pass whose intermediates the
    /// layers still cache.
    pub fn backward(&mut self, grad_output: &[f32]) -> NnResult<&[f32]> {
        let last = self.layers.last_mut().ok_or(NnError::EmptyNetwork)?;
        if grad_output.len() != last.output_len() {
            return Err(NnError::GradientLength {
                expected: last.output_len(),
                got: grad_output.len(),
            });
        }
        last.grad_output_mut().copy_from_slice(grad_output);
        last.backward_pass();
        for idx in (0..self.layers.len() - 1).rev() {
            let (head, tail) = self.layers.split_at_mut(idx + 1);
            let layer = &mut head[idx];
            layer.grad_output_mut().copy_from_slice(tail[0].grad_input());
            layer.backward_pass();
        }
        Ok(self.layers[0].grad_input())
    }

    /// `parameter += scalar * gradient` across every layer.
    pub fn apply_gradient(&mut self, scalar: f32) -> NnResult<()> {
        for layer in &mut self.layers {
            layer.apply_gradient(scalar)?;
        }
        Ok(())
    }

    /// Commits recurrent state in every layer that carries any.
    pub fn update_state(&mut self) {
        for layer in &mut self.layers {
            layer.update_state();
        }
    }

    /// Clears recurrent state in every layer that carries any.
    pub fn reset_state(&mut self) {
        for layer in &mut self.layers {
            layer.reset_state();
        }
    }

    pub fn visit_parameters(
        &self,
        visitor: &mut dyn FnMut(&Parameter) -> NnResult<()>,
    ) -> NnResult<()> {
        for layer in &self.layers {
            layer.visit_parameters(visitor)?;
        }
        Ok(())
    }

    pub fn visit_parameters_mut(
        &mut self,
        visitor: &mut dyn FnMut(&mut Parameter) -> NnResult<()>,
    ) -> NnResult<()> {
        for layer in &mut self.layers {
            layer.visit_parameters_mut(visitor)?;
        }
        Ok(())
    }

    /// Total number of scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    fn tensor_count(&self) -> usize {
        let mut count = 0;
        let _ = self.visit_parameters(&mut |_| {
            count += 1;
            Ok(())
        });
        count
    }

    /// Copies every parameter matrix.
    pub fn snapshot(&self) -> ParameterSnapshot {
        let mut tensors = Vec::new();
        let _ = self.visit_parameters(&mut |param| {
            tensors.push(param.value().clone());
            Ok(())
        });
        ParameterSnapshot { tensors }
    }

    /// Loads every parameter matrix from `snapshot`, pairing them one-to-one in
    /// visiting order. Nothing is modified when the tensor count differs.
    pub fn restore(&mut self, snapshot: &ParameterSnapshot) -> NnResult<()> {
        let expected = self.tensor_count();
        if snapshot.len() != expected {
            return Err(NnError::SnapshotLength {
                expected,
                got: snapshot.len(),
            });
        }
        let mut tensors = snapshot.tensors.iter();
        self.visit_parameters_mut(&mut |param| match tensors.next() {
            Some(value) => param.load_value(value),
            None => Err(NnError::SnapshotLength {
                expected,
                got: snapshot.len(),
            }),
        })
    }

    /// Adds independent `U[-delta, +delta]` noise to every parameter entry.
    pub fn perturb(&mut self, delta: f32, rng: &mut dyn RngCore) -> NnResult<()> {
        self.visit_parameters_mut(&mut |param| param.perturb(delta, rng))
    }
}
