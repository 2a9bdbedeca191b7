// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::collections::VecDeque;

/// Sliding-window mean over the last `capacity` samples.
#[derive(Clone, Debug)]
pub struct MovingAverage {
    capacity: usize,
    samples: VecDeque<f32>,
    sum: f64,
}

impl MovingAverage {
    /// Creates an empty window. A zero capacity is raised to one. Storage
    /// grows with the samples actually held, never up front.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::new(),
            sum: 0.0,
        }
    }

    pub fn add_sample(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= f64::from(oldest);
            }
        }
        self.samples.push_back(value);
        self.sum += f64::from(value);
    }

    /// Mean of the retained samples, `0.0` when empty.
    pub fn mean(&self) -> f32 {
        if self.samples.is_empty() {
            0.0
        } else {
            (self.sum / self.samples.len() as f64) as f32
        }
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Drops every sample, keeping the capacity.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn window_evicts_oldest_samples() {
        let mut avg = MovingAverage::new(3);
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            avg.add_sample(value);
        }
        assert_eq!(avg.num_samples(), 3);
        assert!(avg.is_full());
        assert_abs_diff_eq!(avg.mean(), 4.0);
    }

    #[test]
    fn reset_empties_but_keeps_capacity() {
        let mut avg = MovingAverage::new(3);
        avg.add_sample(7.0);
        avg.reset();
        assert_eq!(avg.mean(), 0.0);
        assert_eq!(avg.num_samples(), 0);
        assert_eq!(avg.capacity(), 3);
    }

    #[test]
    fn partial_window_averages_what_it_holds() {
        let mut avg = MovingAverage::new(10);
        avg.add_sample(-1.0);
        avg.add_sample(-3.0);
        assert_abs_diff_eq!(avg.mean(), -2.0);
    }

    #[test]
    fn huge_windows_allocate_lazily() {
        let mut avg = MovingAverage::new(usize::MAX);
        assert_eq!(avg.capacity(), usize::MAX);
        avg.add_sample(2.0);
        avg.add_sample(4.0);
        assert!(!avg.is_full());
        assert_abs_diff_eq!(avg.mean(), 3.0);
    }

    #[test]
    fn long_streams_do_not_drift() {
        let mut avg = MovingAverage::new(4);
        for step in 0..100_000 {
            avg.add_sample(if step % 2 == 0 { 0.1 } else { 1e4 });
        }
        assert_abs_diff_eq!(avg.mean(), (0.1 + 1e4) / 2.0, epsilon = 1e-2);
    }
}
