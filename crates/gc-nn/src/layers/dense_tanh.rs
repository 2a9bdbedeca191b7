// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use rand::RngCore;

use crate::activation::tanh_prime;
use crate::module::{Layer, LayerBuffers, LayerKind, Parameter};
use crate::tensor::Matrix;
use crate::NnResult;

/// Half-width of the uniform range used to initialise tanh layers.
pub const DENSE_TANH_INIT: f32 = 1e-6;

/// Affine map followed by an elementwise `tanh`.
#[derive(Debug)]
pub struct DenseTanh {
    weight: Parameter,
    bias: Parameter,
    /// Pre-activation sums from the last forward pass.
    sums: Vec<f32>,
    /// `grad_output ⊙ tanh'(sums)`, reused across the backward pass.
    delta: Vec<f32>,
    buffers: LayerBuffers,
}

impl DenseTanh {
    /// Creates a layer with parameters drawn from `U[-1e-6, 1e-6]`.
    pub fn new(
        name: impl Into<String>,
        input_dim: usize,
        output_dim: usize,
        rng: &mut dyn RngCore,
    ) -> NnResult<Self> {
        let name = name.into();
        let weight =
            Matrix::random_uniform(output_dim, input_dim, -DENSE_TANH_INIT, DENSE_TANH_INIT, rng)?;
        let bias = Matrix::random_uniform(output_dim, 1, -DENSE_TANH_INIT, DENSE_TANH_INIT, rng)?;
        Ok(Self {
            weight: Parameter::new(format!("{name}::weight"), weight),
            bias: Parameter::new(format!("{name}::bias"), bias),
            sums: vec![0.0; output_dim],
            delta: vec![0.0; output_dim],
            buffers: LayerBuffers::new(input_dim, output_dim),
        })
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn bias(&self) -> &Parameter {
        &self.bias
    }

    /// Pre-activation sums cached by the last forward pass.
    pub fn sums(&self) -> &[f32] {
        &self.sums
    }
}

impl Layer for DenseTanh {
    fn kind(&self) -> LayerKind {
        LayerKind::DenseTanh
    }

    fn buffers(&self) -> &LayerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut LayerBuffers {
        &mut self.buffers
    }

    fn forward_pass(&mut self) {
        let LayerBuffers { input, output, .. } = &mut self.buffers;
        self.sums.copy_from_slice(self.bias.value().data());
        self.weight.value().matvec_acc(input, &mut self.sums);
        for (out, sum) in output.iter_mut().zip(self.sums.iter()) {
            *out = sum.tanh();
        }
    }

    fn backward_pass(&mut self) {
        let LayerBuffers {
            input,
            grad_input,
            grad_output,
            ..
        } = &mut self.buffers;
        for ((delta, sum), d_out) in self
            .delta
            .iter_mut()
            .zip(self.sums.iter())
            .zip(grad_output.iter())
        {
            *delta = d_out * tanh_prime(*sum);
        }
        self.weight.gradient_mut().assign_outer(&self.delta, input);
        self.bias.gradient_mut().data_mut().copy_from_slice(&self.delta);
        grad_input.fill(0.0);
        self.weight
            .value()
            .transpose_matvec_acc(&self.delta, grad_input);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradcheck::{assert_gradients_match, randomise_parameters, random_vec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fresh_layer_is_nearly_silent() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut layer = DenseTanh::new("hidden", 8, 4, &mut rng).unwrap();
        layer.input_mut().fill(1.0);
        layer.forward_pass();
        assert!(layer.output().iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn output_is_tanh_of_cached_sums() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut layer = DenseTanh::new("hidden", 3, 3, &mut rng).unwrap();
        randomise_parameters(&mut layer, 12, 1.0);
        layer.input_mut().copy_from_slice(&[0.5, -0.25, 2.0]);
        layer.forward_pass();
        for (out, sum) in layer.output().iter().zip(layer.sums()) {
            assert_eq!(*out, sum.tanh());
        }
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut layer = DenseTanh::new("hidden", 4, 3, &mut rng).unwrap();
        randomise_parameters(&mut layer, 14, 0.6);
        let input = random_vec(&mut rng, 4, 0.8);
        let weights = random_vec(&mut rng, 3, 1.0);
        assert_gradients_match(&mut layer, &input, &weights);
    }

    #[test]
    fn bias_gradient_carries_the_tanh_factor() {
        let mut rng = StdRng::seed_from_u64(15);
        let mut layer = DenseTanh::new("hidden", 2, 2, &mut rng).unwrap();
        randomise_parameters(&mut layer, 16, 1.0);
        layer.input_mut().copy_from_slice(&[1.0, 1.0]);
        layer.forward_pass();
        layer.grad_output_mut().copy_from_slice(&[1.0, 1.0]);
        layer.backward_pass();
        for (grad, sum) in layer.bias().gradient().data().iter().zip(layer.sums()) {
            assert!((grad - tanh_prime(*sum)).abs() < 1e-7);
        }
    }
}
