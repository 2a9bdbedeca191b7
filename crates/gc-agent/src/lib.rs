// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Online actor-critic controller deciding when to request a garbage
//! collection from the host runtime.
//!
//! The agent learns in place: every [`GcAgent::invoke`] call observes the
//! host, scores the previous decision by the time elapsed since the last
//! invocation, nudges its policy and value networks along the TD-error and
//! picks the next action. Periodically the state-encoder network is searched
//! by greedy hill climbing instead of gradients.

pub mod agent;
pub mod config;
pub mod host;
pub mod moving_average;
pub mod report;
pub mod statistics;

pub use agent::{AgentPhase, GcAgent, MetaUpdateReport, StepOutcome, ACTION_COUNT};
pub use config::{AgentConfig, UpdateCell};
pub use host::{
    Clock, CountingTrigger, FixedTelemetry, FnTelemetry, GcTrigger, GcTriggerError,
    MonotonicClock, NoopTrigger, Observation, ObservationSlot, SteppedClock, Telemetry,
    observation_from_slice, OBSERVATION_SIZE,
};
pub use moving_average::MovingAverage;
pub use report::{MemoryReporter, ReportError, ReportRow, ReportTable, Reporter, REPORT_HEADER};
pub use statistics::AgentStatistics;

use gc_nn::NnError;

/// Errors surfaced while building or driving the controller.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Wrapped engine failure bubbling up from the networks.
    #[error(transparent)]
    Nn(#[from] NnError),
    /// A configuration field holds a value the agent cannot run with.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    /// Telemetry produced a vector of the wrong width.
    #[error("observation has length {got}, expected {expected}")]
    ObservationLength { expected: usize, got: usize },
    /// A JSON configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenient result alias for controller operations.
pub type AgentResult<T> = Result<T, AgentError>;
