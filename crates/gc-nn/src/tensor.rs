// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{NnError, NnResult};

/// Dense row-major matrix of `f32` values with a shape fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Creates a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> NnResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(NnError::InvalidDimensions { rows, cols });
        }
        Ok(Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        })
    }

    /// Creates a zero-filled matrix with the same shape as `other`.
    pub fn zeros_like(other: &Matrix) -> Self {
        Self {
            rows: other.rows,
            cols: other.cols,
            data: vec![0.0; other.data.len()],
        }
    }

    /// Wraps raw row-major data. The vector must hold `rows * cols` elements.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> NnResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(NnError::InvalidDimensions { rows, cols });
        }
        let expected = rows * cols;
        if data.len() != expected {
            return Err(NnError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix by evaluating `f(row, col)` for every entry.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> NnResult<Self>
    where
        F: FnMut(usize, usize) -> f32,
    {
        if rows == 0 || cols == 0 {
            return Err(NnError::InvalidDimensions { rows, cols });
        }
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Ok(Self { rows, cols, data })
    }

    /// Samples every entry independently from `U[min, max]`.
    pub fn random_uniform(
        rows: usize,
        cols: usize,
        min: f32,
        max: f32,
        rng: &mut dyn RngCore,
    ) -> NnResult<Self> {
        check_range(min, max)?;
        Self::from_fn(rows, cols, |_, _| rng.gen_range(min..=max))
    }

    /// Returns `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns row `r` as a slice.
    #[inline]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: f32) {
        self.data[r * self.cols + c] = value;
    }

    /// Overwrites every entry with `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|entry| *entry = value);
    }

    /// Adds an independent `U[-delta, +delta]` offset to every entry.
    pub fn perturb_uniform(&mut self, delta: f32, rng: &mut dyn RngCore) -> NnResult<()> {
        check_range(-delta, delta)?;
        for value in self.data.iter_mut() {
            *value += rng.gen_range(-delta..=delta);
        }
        Ok(())
    }

    /// Accumulates `out[r] += Σ_c self[r][c] * x[c]`.
    pub fn matvec_acc(&self, x: &[f32], out: &mut [f32]) {
        debug_assert_eq!(x.len(), self.cols);
        debug_assert_eq!(out.len(), self.rows);
        for (r, slot) in out.iter_mut().enumerate() {
            *slot += dot(self.row(r), x);
        }
    }

    /// Accumulates `out[c] += Σ_r self[r][c] * d[r]`.
    pub fn transpose_matvec_acc(&self, d: &[f32], out: &mut [f32]) {
        debug_assert_eq!(d.len(), self.rows);
        debug_assert_eq!(out.len(), self.cols);
        for (r, &scale) in d.iter().enumerate() {
            if scale == 0.0 {
                continue;
            }
            for (slot, weight) in out.iter_mut().zip(self.row(r)) {
                *slot += weight * scale;
            }
        }
    }

    /// Overwrites `self[r][c] = left[r] * right[c]`.
    pub fn assign_outer(&mut self, left: &[f32], right: &[f32]) {
        debug_assert_eq!(left.len(), self.rows);
        debug_assert_eq!(right.len(), self.cols);
        let cols = self.cols;
        for (r, &scale) in left.iter().enumerate() {
            let row = &mut self.data[r * cols..(r + 1) * cols];
            for (slot, value) in row.iter_mut().zip(right) {
                *slot = scale * value;
            }
        }
    }

    /// Largest absolute entry-wise difference, `None` when the shapes differ.
    pub fn max_abs_diff(&self, other: &Matrix) -> Option<f32> {
        if self.shape() != other.shape() {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max),
        )
    }
}

#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_range(min: f32, max: f32) -> NnResult<()> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(NnError::InvalidRange { min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_empty_axes_and_bad_lengths() {
        assert_eq!(
            Matrix::zeros(0, 3),
            Err(NnError::InvalidDimensions { rows: 0, cols: 3 })
        );
        assert_eq!(
            Matrix::from_vec(2, 2, vec![1.0; 3]),
            Err(NnError::DataLength {
                expected: 4,
                got: 3
            })
        );
    }

    #[test]
    fn matvec_helpers_follow_row_major_layout() {
        let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut out = vec![0.5, 0.0];
        m.matvec_acc(&[1.0, 0.0, -1.0], &mut out);
        assert_eq!(out, vec![-1.5, -2.0]);

        let mut back = vec![0.0; 3];
        m.transpose_matvec_acc(&[1.0, -1.0], &mut back);
        assert_eq!(back, vec![-3.0, -3.0, -3.0]);

        let mut outer = Matrix::zeros(2, 3).unwrap();
        outer.assign_outer(&[2.0, -1.0], &[1.0, 2.0, 3.0]);
        assert_eq!(outer.row(1), &[-1.0, -2.0, -3.0]);
    }

    #[test]
    fn perturbation_stays_within_delta() {
        let mut rng = StdRng::seed_from_u64(3);
        let base = Matrix::from_fn(4, 5, |r, c| (r * 5 + c) as f32).unwrap();
        let mut moved = base.clone();
        moved.perturb_uniform(0.25, &mut rng).unwrap();
        let diff = moved.max_abs_diff(&base).unwrap();
        assert!(diff <= 0.25);
        assert!(diff > 0.0);
        assert!(moved.perturb_uniform(-1.0, &mut rng).is_err());
    }
}
