// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use rand::RngCore;

use crate::activation::sigmoid;
use crate::module::{Layer, LayerBuffers, LayerKind, Parameter};
use crate::tensor::Matrix;
use crate::NnResult;

/// Half-width of the uniform range used to initialise LSTM parameters.
pub const LSTM_INIT: f32 = 0.1;

/// Gates in the order their parameters are visited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    Forget,
    Input,
    Output,
    Candidate,
}

impl Gate {
    pub const ALL: [Gate; 4] = [Gate::Forget, Gate::Input, Gate::Output, Gate::Candidate];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            Gate::Forget => "forget",
            Gate::Input => "input",
            Gate::Output => "output",
            Gate::Candidate => "candidate",
        }
    }
}

/// Parameters and per-step cache of one gate.
#[derive(Debug)]
struct GateBlock {
    input_weight: Parameter,
    hidden_weight: Parameter,
    bias: Parameter,
    /// Pre-activation sums from the last forward pass.
    sum: Vec<f32>,
    /// Activations (sigmoid or tanh of `sum`).
    activation: Vec<f32>,
    /// Objective-wrt-pre-activation from the last backward pass.
    delta: Vec<f32>,
}

impl GateBlock {
    fn new(
        name: &str,
        gate: Gate,
        input_dim: usize,
        units: usize,
        rng: &mut dyn RngCore,
    ) -> NnResult<Self> {
        let label = gate.label();
        let input_weight = Matrix::random_uniform(units, input_dim, -LSTM_INIT, LSTM_INIT, rng)?;
        let hidden_weight = Matrix::random_uniform(units, units, -LSTM_INIT, LSTM_INIT, rng)?;
        let bias = Matrix::random_uniform(units, 1, -LSTM_INIT, LSTM_INIT, rng)?;
        Ok(Self {
            input_weight: Parameter::new(format!("{name}::{label}::input_weight"), input_weight),
            hidden_weight: Parameter::new(format!("{name}::{label}::hidden_weight"), hidden_weight),
            bias: Parameter::new(format!("{name}::{label}::bias"), bias),
            sum: vec![0.0; units],
            activation: vec![0.0; units],
            delta: vec![0.0; units],
        })
    }

    fn accumulate_sum(&mut self, input: &[f32], hidden: &[f32]) {
        self.sum.copy_from_slice(self.bias.value().data());
        self.input_weight.value().matvec_acc(input, &mut self.sum);
        self.hidden_weight.value().matvec_acc(hidden, &mut self.sum);
    }

    fn write_gradients(&mut self, input: &[f32], hidden: &[f32]) {
        self.input_weight
            .gradient_mut()
            .assign_outer(&self.delta, input);
        self.hidden_weight
            .gradient_mut()
            .assign_outer(&self.delta, hidden);
        self.bias.gradient_mut().data_mut().copy_from_slice(&self.delta);
    }
}

/// Single-step LSTM cell with persistent cell and hidden state.
///
/// Each forward pass computes the four gates from the current input and the
/// committed hidden state, then derives the next cell state
/// `f ⊙ c + i ⊙ g` and the next hidden state `o ⊙ tanh(c)` from the committed
/// cell state. The emitted output is the committed hidden state, so it lags
/// the freshly derived one by a step. [`Layer::update_state`] commits the
/// pending cell/hidden pair.
///
/// The backward pass attributes the objective-wrt-output to the freshly
/// derived hidden state and reaches the forget, input and candidate gates
/// through the cell path linearised at the committed cell state:
/// `∂h/∂c' = o ⊙ tanh'(c)`.
#[derive(Debug)]
pub struct Lstm {
    units: usize,
    gates: [GateBlock; 4],
    cell_state: Vec<f32>,
    hidden_state: Vec<f32>,
    next_cell_state: Vec<f32>,
    next_hidden_state: Vec<f32>,
    buffers: LayerBuffers,
}

impl Lstm {
    /// Creates a cell with parameters drawn from `U[-0.1, 0.1]` and zeroed state.
    pub fn new(
        name: impl Into<String>,
        input_dim: usize,
        units: usize,
        rng: &mut dyn RngCore,
    ) -> NnResult<Self> {
        let name = name.into();
        let gates = [
            GateBlock::new(&name, Gate::Forget, input_dim, units, rng)?,
            GateBlock::new(&name, Gate::Input, input_dim, units, rng)?,
            GateBlock::new(&name, Gate::Output, input_dim, units, rng)?,
            GateBlock::new(&name, Gate::Candidate, input_dim, units, rng)?,
        ];
        Ok(Self {
            units,
            gates,
            cell_state: vec![0.0; units],
            hidden_state: vec![0.0; units],
            next_cell_state: vec![0.0; units],
            next_hidden_state: vec![0.0; units],
            buffers: LayerBuffers::new(input_dim, units),
        })
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Committed cell state.
    pub fn cell_state(&self) -> &[f32] {
        &self.cell_state
    }

    /// Committed hidden state, which is also what the layer emits.
    pub fn hidden_state(&self) -> &[f32] {
        &self.hidden_state
    }

    /// Cell state derived by the last forward pass, not yet committed.
    pub fn pending_cell_state(&self) -> &[f32] {
        &self.next_cell_state
    }

    /// Hidden state derived by the last forward pass, not yet committed.
    pub fn pending_hidden_state(&self) -> &[f32] {
        &self.next_hidden_state
    }

    /// Gate activations cached by the last forward pass.
    pub fn gate_activation(&self, gate: Gate) -> &[f32] {
        &self.gates[gate.index()].activation
    }

    /// Parameters of one gate as `(input_weight, hidden_weight, bias)`.
    pub fn gate_parameters(&self, gate: Gate) -> (&Parameter, &Parameter, &Parameter) {
        let block = &self.gates[gate.index()];
        (&block.input_weight, &block.hidden_weight, &block.bias)
    }
}

impl Layer for Lstm {
    fn kind(&self) -> LayerKind {
        LayerKind::Lstm
    }

    fn buffers(&self) -> &LayerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut LayerBuffers {
        &mut self.buffers
    }

    fn forward_pass(&mut self) {
        let LayerBuffers { input, output, .. } = &mut self.buffers;
        for (block, gate) in self.gates.iter_mut().zip(Gate::ALL) {
            block.accumulate_sum(input, &self.hidden_state);
            for (act, sum) in block.activation.iter_mut().zip(block.sum.iter()) {
                *act = match gate {
                    Gate::Candidate => sum.tanh(),
                    _ => sigmoid(*sum),
                };
            }
        }

        let [forget, input_gate, output_gate, candidate] = &self.gates;
        for unit in 0..self.units {
            let c = self.cell_state[unit];
            self.next_cell_state[unit] = forget.activation[unit] * c
                + input_gate.activation[unit] * candidate.activation[unit];
            self.next_hidden_state[unit] = output_gate.activation[unit] * c.tanh();
        }
        output.copy_from_slice(&self.hidden_state);
    }

    fn backward_pass(&mut self) {
        let LayerBuffers {
            input,
            grad_input,
            grad_output,
            ..
        } = &mut self.buffers;
        let [forget, input_gate, output_gate, candidate] = &mut self.gates;
        for unit in 0..self.units {
            let d = grad_output[unit];
            let c = self.cell_state[unit];
            let tanh_c = c.tanh();
            let f = forget.activation[unit];
            let i = input_gate.activation[unit];
            let o = output_gate.activation[unit];
            let g = candidate.activation[unit];

            output_gate.delta[unit] = d * tanh_c * o * (1.0 - o);
            let d_cell = d * o * (1.0 - tanh_c * tanh_c);
            forget.delta[unit] = d_cell * c * f * (1.0 - f);
            input_gate.delta[unit] = d_cell * g * i * (1.0 - i);
            candidate.delta[unit] = d_cell * i * (1.0 - g * g);
        }

        grad_input.fill(0.0);
        for block in self.gates.iter_mut() {
            block.write_gradients(input, &self.hidden_state);
            block
                .input_weight
                .value()
                .transpose_matvec_acc(&block.delta, grad_input);
        }
    }

    fn visit_parameters(
        &self,
        visitor: &mut dyn FnMut(&Parameter) -> NnResult<()>,
    ) -> NnResult<()> {
        for block in &self.gates {
            visitor(&block.input_weight)?;
            visitor(&block.hidden_weight)?;
            visitor(&block.bias)?;
        }
        Ok(())
    }

    fn visit_parameters_mut(
        &mut self,
        visitor: &mut dyn FnMut(&mut Parameter) -> NnResult<()>,
    ) -> NnResult<()> {
        for block in &mut self.gates {
            visitor(&mut block.input_weight)?;
            visitor(&mut block.hidden_weight)?;
            visitor(&mut block.bias)?;
        }
        Ok(())
    }

    fn update_state(&mut self) {
        self.cell_state.copy_from_slice(&self.next_cell_state);
        self.hidden_state.copy_from_slice(&self.next_hidden_state);
    }

    fn reset_state(&mut self) {
        for buffer in [
            &mut self.cell_state,
            &mut self.hidden_state,
            &mut self.next_cell_state,
            &mut self.next_hidden_state,
        ] {
            buffer.fill(0.0);
        }
    }
}
