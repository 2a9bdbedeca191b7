// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Finite-difference helpers shared by the layer tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::module::Layer;
use crate::tensor::dot;

pub(crate) const EPS: f32 = 1e-2;
pub(crate) const TOLERANCE: f32 = 1e-3;

pub(crate) fn random_vec(rng: &mut StdRng, len: usize, scale: f32) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-scale..=scale)).collect()
}

/// Replaces every parameter with values drawn from `U[-scale, scale]`.
pub(crate) fn randomise_parameters(layer: &mut dyn Layer, seed: u64, scale: f32) {
    let mut rng = StdRng::seed_from_u64(seed);
    layer
        .visit_parameters_mut(&mut |param| {
            for value in param.value_mut().data_mut() {
                *value = rng.gen_range(-scale..=scale);
            }
            Ok(())
        })
        .unwrap();
}

/// Objective `J = Σ weights[r] * output[r]` for the current input.
pub(crate) fn objective(layer: &mut dyn Layer, weights: &[f32]) -> f32 {
    layer.forward_pass();
    dot(layer.output(), weights)
}

fn nudge(layer: &mut dyn Layer, target: usize, entry: usize, delta: f32) {
    let mut idx = 0;
    layer
        .visit_parameters_mut(&mut |param| {
            if idx == target {
                param.value_mut().data_mut()[entry] += delta;
            }
            idx += 1;
            Ok(())
        })
        .unwrap();
}

fn analytic_gradients(layer: &dyn Layer) -> Vec<Vec<f32>> {
    let mut grads = Vec::new();
    layer
        .visit_parameters(&mut |param| {
            grads.push(param.gradient().data().to_vec());
            Ok(())
        })
        .unwrap();
    grads
}

/// Compares analytic parameter and input gradients of `J` against central
/// differences.
pub(crate) fn assert_gradients_match(layer: &mut dyn Layer, input: &[f32], weights: &[f32]) {
    layer.input_mut().copy_from_slice(input);
    layer.forward_pass();
    layer.grad_output_mut().copy_from_slice(weights);
    layer.backward_pass();
    let grads = analytic_gradients(layer);
    let grad_input = layer.grad_input().to_vec();

    for (p, grad) in grads.iter().enumerate() {
        for (entry, &analytic) in grad.iter().enumerate() {
            nudge(layer, p, entry, EPS);
            let plus = objective(layer, weights);
            nudge(layer, p, entry, -2.0 * EPS);
            let minus = objective(layer, weights);
            nudge(layer, p, entry, EPS);
            let numeric = (plus - minus) / (2.0 * EPS);
            assert!(
                (numeric - analytic).abs() < TOLERANCE,
                "parameter {p} entry {entry}: analytic {analytic} vs numeric {numeric}"
            );
        }
    }

    for (i, &analytic) in grad_input.iter().enumerate() {
        layer.input_mut()[i] += EPS;
        let plus = objective(layer, weights);
        layer.input_mut()[i] -= 2.0 * EPS;
        let minus = objective(layer, weights);
        layer.input_mut()[i] += EPS;
        let numeric = (plus - minus) / (2.0 * EPS);
        assert!(
            (numeric - analytic).abs() < TOLERANCE,
            "input {i}: analytic {analytic} vs numeric {numeric}"
        );
    }
}
