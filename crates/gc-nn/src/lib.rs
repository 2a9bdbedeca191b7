// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Minimal differentiable-network engine with manual forward and backward
//! passes.
//!
//! Every layer owns fixed-size input/output vectors, its parameter matrices
//! and shape-parallel gradient matrices. A [`Network`] chains layers by
//! copying each layer's output into the next layer's input, and runs the
//! backward pass in reverse by copying objective-wrt-input buffers into the
//! preceding layer's objective-wrt-output buffer. Gradients are overwritten
//! on every backward pass, never accumulated.

pub mod activation;
pub mod layers;
pub mod module;
pub mod network;
pub mod tensor;

#[cfg(test)]
pub(crate) mod gradcheck;

pub use activation::{select_action, sigmoid, softmax, softmax_jacobian_row, tanh_prime};
pub use layers::dense_linear::DenseLinear;
pub use layers::dense_tanh::DenseTanh;
pub use layers::lstm::{Gate, Lstm};
pub use module::{Layer, LayerBuffers, LayerKind, Parameter};
pub use network::{Network, ParameterSnapshot};
pub use tensor::Matrix;

/// Errors emitted while assembling or driving layers and networks.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum NnError {
    /// A matrix constructor received an empty axis.
    #[error("invalid matrix dimensions ({rows} x {cols}); both axes must be non-zero")]
    InvalidDimensions { rows: usize, cols: usize },
    /// Raw data did not match the requested matrix shape.
    #[error("data length mismatch: expected {expected}, got {got}")]
    DataLength { expected: usize, got: usize },
    /// Two matrices that must agree in shape did not.
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
    /// A layer was appended whose input width differs from the previous output width.
    #[error("layer {index} expects {expected} inputs but the previous layer produces {produced}")]
    LayerChain {
        index: usize,
        produced: usize,
        expected: usize,
    },
    /// The vector fed into a network has the wrong length.
    #[error("network input has length {got}, expected {expected}")]
    InputLength { expected: usize, got: usize },
    /// The objective-wrt-output vector fed into a backward pass has the wrong length.
    #[error("objective gradient has length {got}, expected {expected}")]
    GradientLength { expected: usize, got: usize },
    /// The network holds no layers.
    #[error("network has no layers")]
    EmptyNetwork,
    /// A parameter snapshot does not line up with the network it is restored into.
    #[error("snapshot holds {got} tensors but the network owns {expected}")]
    SnapshotLength { expected: usize, got: usize },
    /// A uniform sampling range was empty or non-finite.
    #[error("invalid sampling range [{min}, {max}]")]
    InvalidRange { min: f32, max: f32 },
}

/// Result alias used throughout the engine.
pub type NnResult<T> = Result<T, NnError>;
