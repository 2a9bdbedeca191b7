// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::config::AgentConfig;
use crate::moving_average::MovingAverage;
use crate::report::ReportRow;

/// Running diagnostics of the controller.
///
/// Reward and confidence drive the meta-update and use a window of
/// `min_update_interval` samples. The remaining averages only feed the
/// report table and use the statistics window of the configuration.
#[derive(Clone, Debug)]
pub struct AgentStatistics {
    reward: MovingAverage,
    confidence: MovingAverage,
    action_probability: MovingAverage,
    time_interval: MovingAverage,
    time_ratio: MovingAverage,
    absolute_td_error: MovingAverage,
    reward_baseline: Option<f32>,
    steady_steps: u64,
    rows_emitted: u64,
}

impl AgentStatistics {
    pub fn new(config: &AgentConfig) -> Self {
        let window = config.statistics_window();
        Self {
            reward: MovingAverage::new(config.min_update_interval),
            confidence: MovingAverage::new(config.min_update_interval),
            action_probability: MovingAverage::new(window),
            time_interval: MovingAverage::new(window),
            time_ratio: MovingAverage::new(window),
            absolute_td_error: MovingAverage::new(window),
            reward_baseline: config.reward_baseline,
            steady_steps: 0,
            rows_emitted: 0,
        }
    }

    /// Confidence of a two-way choice, `max(p, 1 - p)`.
    pub(crate) fn record_confidence(&mut self, probability: f32) {
        self.confidence.add_sample(probability.max(1.0 - probability));
    }

    pub(crate) fn record_steady_step(
        &mut self,
        reward: f32,
        interval_secs: f32,
        probability: f32,
        td_error: f32,
    ) {
        self.steady_steps += 1;
        self.reward.add_sample(reward);
        self.action_probability.add_sample(probability);
        self.time_interval.add_sample(interval_secs);
        let ratio = match self.reward_baseline {
            Some(baseline) if interval_secs > 0.0 => baseline / interval_secs,
            _ => 0.0,
        };
        self.time_ratio.add_sample(ratio);
        self.absolute_td_error.add_sample(td_error.abs());
    }

    pub(crate) fn reset_reward(&mut self) {
        self.reward.reset();
    }

    pub(crate) fn set_reward_baseline(&mut self, baseline: Option<f32>) {
        self.reward_baseline = baseline;
    }

    pub(crate) fn next_row(&mut self) -> ReportRow {
        let row = ReportRow {
            index: self.rows_emitted,
            mean_action_probability: self.mean_action_probability(),
            mean_time_interval: self.mean_time_interval(),
            mean_time_ratio: self.mean_time_ratio(),
            mean_absolute_td_error: self.mean_absolute_td_error(),
        };
        self.rows_emitted += 1;
        row
    }

    pub fn mean_reward(&self) -> f32 {
        self.reward.mean()
    }

    /// Reward samples collected since the last meta-update.
    pub fn reward_samples(&self) -> usize {
        self.reward.num_samples()
    }

    pub fn mean_confidence(&self) -> f32 {
        self.confidence.mean()
    }

    pub fn mean_action_probability(&self) -> f32 {
        self.action_probability.mean()
    }

    /// Mean seconds between consecutive invocations.
    pub fn mean_time_interval(&self) -> f32 {
        self.time_interval.mean()
    }

    /// Mean of `baseline / interval`, `0.0` without a baseline.
    pub fn mean_time_ratio(&self) -> f32 {
        self.time_ratio.mean()
    }

    pub fn mean_absolute_td_error(&self) -> f32 {
        self.absolute_td_error.mean()
    }

    pub fn reward_baseline(&self) -> Option<f32> {
        self.reward_baseline
    }

    pub fn steady_steps(&self) -> u64 {
        self.steady_steps
    }

    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }
}
