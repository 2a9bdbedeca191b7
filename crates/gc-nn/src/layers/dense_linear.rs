// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use rand::RngCore;

use crate::module::{Layer, LayerBuffers, LayerKind, Parameter};
use crate::tensor::Matrix;
use crate::NnResult;

/// Half-width of the uniform range used to initialise affine parameters.
pub const DENSE_LINEAR_INIT: f32 = 1e-3;

/// Affine layer: `output = weight · input + bias`.
#[derive(Debug)]
pub struct DenseLinear {
    weight: Parameter,
    bias: Parameter,
    buffers: LayerBuffers,
}

impl DenseLinear {
    /// Creates a layer with parameters drawn from `U[-1e-3, 1e-3]`.
    pub fn new(
        name: impl Into<String>,
        input_dim: usize,
        output_dim: usize,
        rng: &mut dyn RngCore,
    ) -> NnResult<Self> {
        let name = name.into();
        let weight = Matrix::random_uniform(
            output_dim,
            input_dim,
            -DENSE_LINEAR_INIT,
            DENSE_LINEAR_INIT,
            rng,
        )?;
        let bias =
            Matrix::random_uniform(output_dim, 1, -DENSE_LINEAR_INIT, DENSE_LINEAR_INIT, rng)?;
        Ok(Self {
            weight: Parameter::new(format!("{name}::weight"), weight),
            bias: Parameter::new(format!("{name}::bias"), bias),
            buffers: LayerBuffers::new(input_dim, output_dim),
        })
    }

    /// Zeroes weight and bias so the output is identically zero.
    pub fn zeroed(mut self) -> Self {
        self.weight.value_mut().fill(0.0);
        self.bias.value_mut().fill(0.0);
        self
    }

    /// Returns a reference to the weight parameter.
    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    /// Returns a reference to the bias parameter.
    pub fn bias(&self) -> &Parameter {
        &self.bias
    }
}

impl Layer for DenseLinear {
    fn kind(&self) -> LayerKind {
        LayerKind::DenseLinear
    }

    fn buffers(&self) -> &LayerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut LayerBuffers {
        &mut self.buffers
    }

    fn forward_pass(&mut self) {
        let LayerBuffers { input, output, .. } = &mut self.buffers;
        output.copy_from_slice(self.bias.value().data());
        self.weight.value().matvec_acc(input, output);
    }

    fn backward_pass(&mut self) {
        let LayerBuffers {
            input,
            grad_input,
            grad_output,
            ..
        } = &mut self.buffers;
        self.weight.gradient_mut().assign_outer(grad_output, input);
        self.bias
            .gradient_mut()
            .data_mut()
            .copy_from_slice(grad_output);
        grad_input.fill(0.0);
        self.weight
            .value()
            .transpose_matvec_acc(grad_output, grad_input);
    }

    fn visit_parameters(
        &self,
        visitor: &mut dyn FnMut(&Parameter) -> NnResult<()>,
    ) -> NnResult<()> {
        visitor(&self.weight)?;
        visitor(&self.bias)?;
        Ok(())
    }

    fn visit_parameters_mut(
        &mut self,
        visitor: &mut dyn FnMut(&mut Parameter) -> NnResult<()>,
    ) -> NnResult<()> {
        visitor(&mut self.weight)?;
        visitor(&mut self.bias)?;
        Ok(())
    }
}
