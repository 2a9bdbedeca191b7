// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

#[inline]
pub fn sigmoid(value: f32) -> f32 {
    1.0 / (1.0 + (-value).exp())
}

/// `1 - tanh²(value)`.
#[inline]
pub fn tanh_prime(value: f32) -> f32 {
    let t = value.tanh();
    1.0 - t * t
}

/// Softmax with the maximum logit subtracted before exponentiating.
///
/// Falls back to a uniform distribution if the normaliser degenerates, which
/// only happens when the logits themselves are not finite.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut exps: Vec<f32> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if !sum.is_finite() || sum <= f32::EPSILON {
        let uniform = 1.0 / logits.len() as f32;
        return vec![uniform; logits.len()];
    }
    for value in exps.iter_mut() {
        *value /= sum;
    }
    exps
}

/// Derivative of `softmax(logits)[index]` with respect to every logit, given
/// the already computed probabilities: `p_index * (δ_index,j - p_j)`.
pub fn softmax_jacobian_row(probs: &[f32], index: usize) -> Vec<f32> {
    let chosen = probs[index];
    probs
        .iter()
        .enumerate()
        .map(|(j, &p)| {
            let indicator = if j == index { 1.0 } else { 0.0 };
            chosen * (indicator - p)
        })
        .collect()
}

/// Samples an index from `probs` using a uniform draw `draw ∈ [0, 1)`.
///
/// Walks the distribution subtracting each probability from the draw and
/// returns the first index where the remainder reaches zero. Rounding that
/// leaves mass unclaimed falls back to index 0.
pub fn select_action(probs: &[f32], draw: f32) -> usize {
    let mut remaining = draw;
    for (idx, p) in probs.iter().enumerate() {
        remaining -= p;
        if remaining <= 0.0 {
            return idx;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn softmax_survives_large_logits() {
        for logits in [
            vec![1000.0, -1000.0, 500.0],
            vec![88.5, 88.7],
            vec![-300.0, -301.0, -299.5, -1.0e4],
            vec![0.0, 0.0],
        ] {
            let probs = softmax(&logits);
            assert_eq!(probs.len(), logits.len());
            for p in &probs {
                assert!((0.0..=1.0).contains(p), "probability out of range: {p}");
            }
            assert_abs_diff_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn uniform_logits_give_uniform_probabilities() {
        let probs = softmax(&[0.0, 0.0]);
        assert_eq!(probs, vec![0.5, 0.5]);
    }

    #[test]
    fn jacobian_row_matches_finite_differences() {
        let logits = [0.3f32, -1.2, 0.8];
        let probs = softmax(&logits);
        let eps = 1e-3f32;
        for index in 0..logits.len() {
            let row = softmax_jacobian_row(&probs, index);
            for j in 0..logits.len() {
                let mut plus = logits;
                let mut minus = logits;
                plus[j] += eps;
                minus[j] -= eps;
                let numeric = (softmax(&plus)[index] - softmax(&minus)[index]) / (2.0 * eps);
                assert_abs_diff_eq!(row[j], numeric, epsilon = 1e-3);
            }
            assert_abs_diff_eq!(row.iter().sum::<f32>(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn select_action_walks_cumulative_mass() {
        assert_eq!(select_action(&[0.3, 0.7], 0.2), 0);
        assert_eq!(select_action(&[0.3, 0.7], 0.5), 1);
        assert_eq!(select_action(&[0.3, 0.7], 0.3), 0);
    }

    #[test]
    fn select_action_falls_back_to_first_index() {
        assert_eq!(select_action(&[0.2, 0.2], 0.9), 0);
    }

    #[test]
    fn derivatives_of_squashing_functions() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        assert_abs_diff_eq!(tanh_prime(0.0), 1.0);
        assert!(tanh_prime(10.0) < 1e-6);
    }
}
