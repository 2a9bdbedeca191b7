// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

pub mod dense_linear;
pub mod dense_tanh;
pub mod lstm;

pub use dense_linear::DenseLinear;
pub use dense_tanh::DenseTanh;
pub use lstm::{Gate, Lstm};
