// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use core::fmt;

use rand::RngCore;

use crate::tensor::Matrix;
use crate::{NnError, NnResult};

/// Trainable parameter matrix paired with a shape-parallel gradient buffer.
///
/// The gradient is overwritten by every backward pass of the owning layer and
/// is never accumulated across passes.
pub struct Parameter {
    name: String,
    value: Matrix,
    gradient: Matrix,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.value.shape();
        write!(f, "Parameter(name={},shape=({},{}))", self.name, rows, cols)
    }
}

impl Parameter {
    /// Creates a new parameter with a zeroed gradient of the same shape.
    pub fn new(name: impl Into<String>, value: Matrix) -> Self {
        let gradient = Matrix::zeros_like(&value);
        Self {
            name: name.into(),
            value,
            gradient,
        }
    }

    /// Returns the identifier assigned to the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Matrix {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Matrix {
        &mut self.value
    }

    pub fn gradient(&self) -> &Matrix {
        &self.gradient
    }

    pub fn gradient_mut(&mut self) -> &mut Matrix {
        &mut self.gradient
    }

    pub fn shape(&self) -> (usize, usize) {
        self.value.shape()
    }

    /// Number of scalar entries.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// `value += scalar * gradient`. The caller folds both the learning rate and
    /// the ascent/descent direction into `scalar`.
    pub fn apply_gradient(&mut self, scalar: f32) {
        for (value, grad) in self
            .value
            .data_mut()
            .iter_mut()
            .zip(self.gradient.data().iter())
        {
            *value += scalar * grad;
        }
    }

    /// Clears the gradient buffer.
    pub fn zero_gradient(&mut self) {
        self.gradient.fill(0.0);
    }

    /// Overwrites the value with a copy of `value`, which must match in shape.
    pub fn load_value(&mut self, value: &Matrix) -> NnResult<()> {
        if value.shape() != self.value.shape() {
            return Err(NnError::ShapeMismatch {
                left: self.value.shape(),
                right: value.shape(),
            });
        }
        self.value.data_mut().copy_from_slice(value.data());
        Ok(())
    }

    /// Adds independent `U[-delta, +delta]` noise to every entry.
    pub fn perturb(&mut self, delta: f32, rng: &mut dyn RngCore) -> NnResult<()> {
        self.value.perturb_uniform(delta, rng)
    }
}

/// Tag naming the concrete layer behind a [`Layer`] trait object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    DenseLinear,
    DenseTanh,
    Lstm,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::DenseLinear => write!(f, "dense_linear"),
            LayerKind::DenseTanh => write!(f, "dense_tanh"),
            LayerKind::Lstm => write!(f, "lstm"),
        }
    }
}

/// Input, output and derivative vectors owned by every layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerBuffers {
    /// Vector read by the forward pass.
    pub input: Vec<f32>,
    /// Vector written by the forward pass.
    pub output: Vec<f32>,
    /// Objective-wrt-input, written by the backward pass.
    pub grad_input: Vec<f32>,
    /// Objective-wrt-output, read by the backward pass.
    pub grad_output: Vec<f32>,
}

impl LayerBuffers {
    pub fn new(input_len: usize, output_len: usize) -> Self {
        Self {
            input: vec![0.0; input_len],
            output: vec![0.0; output_len],
            grad_input: vec![0.0; input_len],
            grad_output: vec![0.0; output_len],
        }
    }
}

/// Differentiable function block with manual forward and backward passes.
///
/// `backward_pass` is only valid immediately after the `forward_pass` that
/// produced the cached intermediates for the current input. Calling it again
/// overwrites the gradients instead of accumulating them.
pub trait Layer: fmt::Debug {
    /// Identifies the concrete layer.
    fn kind(&self) -> LayerKind;

    fn buffers(&self) -> &LayerBuffers;

    fn buffers_mut(&mut self) -> &mut LayerBuffers;

    /// Reads the input buffer and writes the output buffer, caching whatever
    /// the backward pass needs.
    fn forward_pass(&mut self);

    /// Reads objective-wrt-output, overwrites every parameter gradient and the
    /// objective-wrt-input buffer.
    fn backward_pass(&mut self);

    /// Visits immutable parameters in a fixed order.
    fn visit_parameters(
        &self,
        visitor: &mut dyn FnMut(&Parameter) -> NnResult<()>,
    ) -> NnResult<()>;

    /// Visits mutable parameters in the same order as [`Layer::visit_parameters`].
    fn visit_parameters_mut(
        &mut self,
        visitor: &mut dyn FnMut(&mut Parameter) -> NnResult<()>,
    ) -> NnResult<()>;

    /// Commits recurrent state computed by the last forward pass. Stateless
    /// layers ignore it.
    fn update_state(&mut self) {}

    /// Clears recurrent state. Stateless layers ignore it.
    fn reset_state(&mut self) {}

    fn input_len(&self) -> usize {
        self.buffers().input.len()
    }

    fn output_len(&self) -> usize {
        self.buffers().output.len()
    }

    fn input(&self) -> &[f32] {
        &self.buffers().input
    }

    fn input_mut(&mut self) -> &mut [f32] {
        &mut self.buffers_mut().input
    }

    fn output(&self) -> &[f32] {
        &self.buffers().output
    }

    fn grad_input(&self) -> &[f32] {
        &self.buffers().grad_input
    }

    fn grad_output(&self) -> &[f32] {
        &self.buffers().grad_output
    }

    fn grad_output_mut(&mut self) -> &mut [f32] {
        &mut self.buffers_mut().grad_output
    }

    /// `parameter += scalar * gradient` for every parameter entry.
    fn apply_gradient(&mut self, scalar: f32) -> NnResult<()> {
        self.visit_parameters_mut(&mut |param| {
            param.apply_gradient(scalar);
            Ok(())
        })
    }

    /// Total number of scalar parameters.
    fn parameter_count(&self) -> usize {
        let mut count = 0;
        let _ = self.visit_parameters(&mut |param| {
            count += param.len();
            Ok(())
        });
        count
    }
}
