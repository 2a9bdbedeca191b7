// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{AgentError, AgentResult};

/// Topology of the state-encoder network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateCell {
    /// Three stacked tanh layers.
    #[default]
    Dense,
    /// A recurrent cell followed by a tanh projection.
    Lstm,
}

/// Tunables of the controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Width of the latent state produced by the update network.
    pub state_size: usize,
    pub policy_hidden: usize,
    pub value_hidden: usize,
    pub update_hidden: usize,
    pub policy_learning_rate: f32,
    pub value_learning_rate: f32,
    /// Half-width of the uniform perturbation applied by the meta-update.
    pub update_delta: f32,
    pub discount: f32,
    /// Reward samples required before a meta-update may run. Also the reward
    /// window size.
    pub min_update_interval: usize,
    /// Mean confidence the policy must exceed before a meta-update may run.
    pub confidence_stop_threshold: f32,
    /// SteadySteps between report rows; `<= 0` disables reporting.
    pub debug_interval: i64,
    /// Externally measured time interval used to normalise reported intervals.
    pub reward_baseline: Option<f32>,
    pub update_cell: UpdateCell,
    pub seed: Option<u64>,
    pub report_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_size: 200,
            policy_hidden: 64,
            value_hidden: 64,
            update_hidden: 64,
            policy_learning_rate: 1e-4,
            value_learning_rate: 1e-3,
            update_delta: 1e-3,
            discount: 0.9999,
            min_update_interval: 10_000,
            confidence_stop_threshold: 0.98,
            debug_interval: -1,
            reward_baseline: None,
            update_cell: UpdateCell::Dense,
            seed: None,
            report_path: None,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> AgentError {
    AgentError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

impl AgentConfig {
    pub fn from_json_str(text: &str) -> AgentResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> AgentResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Whether periodic report rows are emitted.
    pub fn reporting_enabled(&self) -> bool {
        self.debug_interval > 0
    }

    /// Window size used for the reporting statistics.
    pub fn statistics_window(&self) -> usize {
        if self.reporting_enabled() {
            self.debug_interval as usize
        } else {
            self.min_update_interval
        }
    }

    pub fn validate(&self) -> AgentResult<()> {
        for (field, value) in [
            ("state_size", self.state_size),
            ("policy_hidden", self.policy_hidden),
            ("value_hidden", self.value_hidden),
            ("update_hidden", self.update_hidden),
            ("min_update_interval", self.min_update_interval),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be non-zero"));
            }
        }
        for (field, rate) in [
            ("policy_learning_rate", self.policy_learning_rate),
            ("value_learning_rate", self.value_learning_rate),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(invalid(field, format!("must be positive and finite, got {rate}")));
            }
        }
        if !self.update_delta.is_finite() || self.update_delta < 0.0 {
            return Err(invalid(
                "update_delta",
                format!("must be non-negative and finite, got {}", self.update_delta),
            ));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(invalid(
                "discount",
                format!("must lie in [0, 1], got {}", self.discount),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_stop_threshold) {
            return Err(invalid(
                "confidence_stop_threshold",
                format!("must lie in [0, 1], got {}", self.confidence_stop_threshold),
            ));
        }
        if let Some(baseline) = self.reward_baseline {
            if !baseline.is_finite() {
                return Err(invalid("reward_baseline", "must be finite"));
            }
        }
        Ok(())
    }
}
