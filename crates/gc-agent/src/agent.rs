// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::fmt;
use std::time::Duration;

use gc_nn::{
    select_action, softmax, softmax_jacobian_row, DenseLinear, DenseTanh, Lstm, Network,
    ParameterSnapshot,
};
use rand::rngs::StdRng;
use rand::{Rng, RngCore};
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, UpdateCell};
use crate::host::{Clock, GcTrigger, MonotonicClock, Observation, Telemetry, OBSERVATION_SIZE};
use crate::report::{ReportTable, Reporter};
use crate::statistics::AgentStatistics;
use crate::AgentResult;

/// Number of discrete actions: `0` leaves collection to the host, `1`
/// requests a collection.
pub const ACTION_COUNT: usize = 2;

const COLLECT_ACTION: usize = 1;

/// Encoder input value marking "no previous state or action".
const NO_PREVIOUS: f32 = -1.0;

/// Which half of the TD loop the next [`GcAgent::invoke`] runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentPhase {
    /// Encode a fresh trajectory without learning.
    FirstStep,
    /// Score the previous action, learn and act again.
    SteadyStep,
}

/// Result of a hill-climbing step over the update network.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetaUpdateReport {
    /// Best mean reward after this step.
    pub best_mean_reward: f32,
    /// Mean reward realised by the parameters that were just evaluated.
    pub candidate_mean_reward: f32,
    /// Whether the evaluated parameters became the new best.
    pub improved: bool,
}

/// Summary of one [`GcAgent::invoke`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub phase: AgentPhase,
    pub action: usize,
    /// Probability the policy assigned to `action`.
    pub probability: f32,
    /// Only set for steady steps.
    pub reward: Option<f32>,
    /// Only set for steady steps.
    pub td_error: Option<f32>,
    pub meta_update: Option<MetaUpdateReport>,
}

impl StepOutcome {
    pub fn requested_collection(&self) -> bool {
        self.action == COLLECT_ACTION
    }
}

/// One-step trajectory carried between invocations.
#[derive(Clone, Debug)]
struct Trajectory {
    state: Vec<f32>,
    action: usize,
    probability: f32,
    observation: Observation,
    observed_at: Duration,
}

/// Online actor-critic controller.
///
/// Owns the policy, value and update (state-encoder) networks, the single
/// random source and the host collaborators. Every call to [`invoke`] runs
/// one step of the loop; nothing happens between calls.
///
/// [`invoke`]: GcAgent::invoke
pub struct GcAgent<T, G> {
    config: AgentConfig,
    telemetry: T,
    trigger: G,
    clock: Box<dyn Clock>,
    reporter: Option<Box<dyn Reporter>>,
    rng: StdRng,
    policy: Network,
    value: Network,
    update: Network,
    encoder_input: Vec<f32>,
    phase: AgentPhase,
    trajectory: Option<Trajectory>,
    best_mean_reward: f32,
    best_update_params: ParameterSnapshot,
    statistics: AgentStatistics,
}

impl<T, G> fmt::Debug for GcAgent<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcAgent")
            .field("phase", &self.phase)
            .field("policy", &self.policy)
            .field("value", &self.value)
            .field("update", &self.update)
            .field("best_mean_reward", &self.best_mean_reward)
            .finish()
    }
}

fn build_policy(config: &AgentConfig, rng: &mut dyn RngCore) -> AgentResult<Network> {
    let hidden = config.policy_hidden;
    // A zero head makes the initial distribution uniform for every state.
    let network = Network::new("policy")
        .with(DenseTanh::new("policy.hidden0", config.state_size, hidden, rng)?)?
        .with(DenseTanh::new("policy.hidden1", hidden, hidden, rng)?)?
        .with(DenseLinear::new("policy.out", hidden, ACTION_COUNT, rng)?.zeroed())?;
    Ok(network)
}

fn build_value(config: &AgentConfig, rng: &mut dyn RngCore) -> AgentResult<Network> {
    let hidden = config.value_hidden;
    let network = Network::new("value")
        .with(DenseTanh::new("value.hidden0", config.state_size, hidden, rng)?)?
        .with(DenseTanh::new("value.hidden1", hidden, hidden, rng)?)?
        .with(DenseLinear::new("value.out", hidden, 1, rng)?)?;
    Ok(network)
}

fn build_update(config: &AgentConfig, rng: &mut dyn RngCore) -> AgentResult<Network> {
    let hidden = config.update_hidden;
    let inputs = encoder_width(config);
    let network = match config.update_cell {
        UpdateCell::Dense => Network::new("update")
            .with(DenseTanh::new("update.hidden0", inputs, hidden, rng)?)?
            .with(DenseTanh::new("update.hidden1", hidden, hidden, rng)?)?
            .with(DenseTanh::new("update.out", hidden, config.state_size, rng)?)?,
        UpdateCell::Lstm => Network::new("update")
            .with(Lstm::new("update.cell", inputs, hidden, rng)?)?
            .with(DenseTanh::new("update.out", hidden, config.state_size, rng)?)?,
    };
    Ok(network)
}

/// `[previous state | previous action one-hot | observation]`.
fn encoder_width(config: &AgentConfig) -> usize {
    config.state_size + ACTION_COUNT + OBSERVATION_SIZE
}

impl<T, G> GcAgent<T, G>
where
    T: Telemetry,
    G: GcTrigger,
{
    /// Builds an agent whose random source comes from `config.seed`, or from
    /// the process-wide determinism settings when no seed is given.
    pub fn new(config: AgentConfig, telemetry: T, trigger: G) -> AgentResult<Self> {
        let rng = gc_config::rng_from_optional(config.seed, "gc-agent");
        Self::with_rng(config, telemetry, trigger, rng)
    }

    /// Builds an agent drawing initialisation, sampling and perturbation
    /// noise from `rng`.
    pub fn with_rng(
        config: AgentConfig,
        telemetry: T,
        trigger: G,
        mut rng: StdRng,
    ) -> AgentResult<Self> {
        config.validate()?;
        let policy = build_policy(&config, &mut rng)?;
        let value = build_value(&config, &mut rng)?;
        let update = build_update(&config, &mut rng)?;
        let best_update_params = update.snapshot();
        let reporter: Option<Box<dyn Reporter>> = match &config.report_path {
            Some(path) if config.reporting_enabled() => Some(Box::new(ReportTable::new(path))),
            _ => None,
        };
        debug!(
            state_size = config.state_size,
            policy_parameters = policy.parameter_count(),
            value_parameters = value.parameter_count(),
            update_parameters = update.parameter_count(),
            update_cell = ?config.update_cell,
            "built gc agent"
        );
        Ok(Self {
            encoder_input: vec![0.0; encoder_width(&config)],
            statistics: AgentStatistics::new(&config),
            config,
            telemetry,
            trigger,
            clock: Box::new(MonotonicClock::new()),
            reporter,
            rng,
            policy,
            value,
            update,
            phase: AgentPhase::FirstStep,
            trajectory: None,
            best_mean_reward: f32::NEG_INFINITY,
            best_update_params,
        })
    }

    /// Replaces the time source the reward is measured with.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the sink receiving report rows.
    pub fn with_reporter<R>(mut self, reporter: R) -> Self
    where
        R: Reporter + 'static,
    {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Supplies the externally measured interval reported rows are
    /// normalised against.
    pub fn set_reward_baseline(&mut self, baseline: Option<f32>) {
        self.config.reward_baseline = baseline;
        self.statistics.set_reward_baseline(baseline);
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn statistics(&self) -> &AgentStatistics {
        &self.statistics
    }

    pub fn policy_network(&self) -> &Network {
        &self.policy
    }

    pub fn value_network(&self) -> &Network {
        &self.value
    }

    pub fn update_network(&self) -> &Network {
        &self.update
    }

    /// Parameters of the update network with the best mean reward so far.
    pub fn best_update_parameters(&self) -> &ParameterSnapshot {
        &self.best_update_params
    }

    /// `-inf` until the first meta-update.
    pub fn best_mean_reward(&self) -> f32 {
        self.best_mean_reward
    }

    /// Latent state of the current trajectory, if one is in progress.
    pub fn latent_state(&self) -> Option<&[f32]> {
        self.trajectory.as_ref().map(|t| t.state.as_slice())
    }

    /// Observation the current trajectory was last advanced with.
    pub fn last_observation(&self) -> Option<&Observation> {
        self.trajectory.as_ref().map(|t| &t.observation)
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }

    pub fn trigger(&self) -> &G {
        &self.trigger
    }

    /// Runs one step of the control loop.
    pub fn invoke(&mut self) -> AgentResult<StepOutcome> {
        match (self.phase, self.trajectory.take()) {
            (AgentPhase::SteadyStep, Some(previous)) => self.steady_step(previous),
            _ => self.first_step(),
        }
    }

    fn first_step(&mut self) -> AgentResult<StepOutcome> {
        let observation = self.telemetry.observe();
        let observed_at = self.clock.now();

        self.update.reset_state();
        let marker = self.config.state_size + ACTION_COUNT;
        self.encoder_input[..marker].fill(NO_PREVIOUS);
        self.encoder_input[marker..].copy_from_slice(&observation);
        let state = self.encode()?;

        let (action, probability) = self.act(&state)?;
        self.statistics.record_confidence(probability);
        debug!(action, probability, "first step");

        self.trajectory = Some(Trajectory {
            state,
            action,
            probability,
            observation,
            observed_at,
        });
        self.phase = AgentPhase::SteadyStep;
        Ok(StepOutcome {
            phase: AgentPhase::FirstStep,
            action,
            probability,
            reward: None,
            td_error: None,
            meta_update: None,
        })
    }

    fn steady_step(&mut self, previous: Trajectory) -> AgentResult<StepOutcome> {
        let observation = self.telemetry.observe();
        let observed_at = self.clock.now();
        let interval = observed_at.saturating_sub(previous.observed_at).as_secs_f32();
        let reward = -interval;

        let state_size = self.config.state_size;
        self.encoder_input[..state_size].copy_from_slice(&previous.state);
        let one_hot = &mut self.encoder_input[state_size..state_size + ACTION_COUNT];
        one_hot.fill(0.0);
        one_hot[previous.action] = 1.0;
        self.encoder_input[state_size + ACTION_COUNT..].copy_from_slice(&observation);
        let next_state = self.encode()?;

        // The current state is evaluated last so the value network's caches
        // belong to it when the gradient is taken.
        let next_value = self.value.forward(&next_state)?[0];
        let value = self.value.forward(&previous.state)?[0];
        let td_error = reward + self.config.discount * next_value - value;

        self.value.backward(&[1.0])?;
        self.value
            .apply_gradient(td_error * self.config.value_learning_rate)?;

        let probs = softmax(self.policy.forward(&previous.state)?);
        let objective = softmax_jacobian_row(&probs, previous.action);
        self.policy.backward(&objective)?;
        self.policy
            .apply_gradient(td_error * self.config.policy_learning_rate)?;

        let (action, probability) = self.act(&next_state)?;
        self.statistics.record_confidence(probability);
        self.statistics
            .record_steady_step(reward, interval, probability, td_error);
        debug!(action, probability, reward, td_error, "steady step");

        self.trajectory = Some(Trajectory {
            state: next_state,
            action,
            probability,
            observation,
            observed_at,
        });
        self.phase = AgentPhase::SteadyStep;

        let meta_update = self.maybe_meta_update()?;
        self.maybe_report();
        Ok(StepOutcome {
            phase: AgentPhase::SteadyStep,
            action,
            probability,
            reward: Some(reward),
            td_error: Some(td_error),
            meta_update,
        })
    }

    /// Runs the update network on `encoder_input` and commits any recurrent
    /// state.
    fn encode(&mut self) -> AgentResult<Vec<f32>> {
        let state = self.update.forward(&self.encoder_input)?.to_vec();
        self.update.update_state();
        Ok(state)
    }

    /// Samples an action from the policy at `state` and performs it.
    fn act(&mut self, state: &[f32]) -> AgentResult<(usize, f32)> {
        let probs = softmax(self.policy.forward(state)?);
        let draw: f32 = self.rng.gen();
        let action = select_action(&probs, draw);
        if action == COLLECT_ACTION {
            if let Err(err) = self.trigger.collect_now() {
                warn!(error = %err, "garbage collection request failed");
            }
        }
        Ok((action, probs[action]))
    }

    /// Greedy hill climbing over the update network.
    ///
    /// Once enough rewards have been collected under the current update
    /// parameters and the policy is confident, the parameters are kept if
    /// their mean reward beats the best so far. The live network then restarts
    /// from the best parameters plus uniform noise and the trajectory restarts
    /// from a first step.
    fn maybe_meta_update(&mut self) -> AgentResult<Option<MetaUpdateReport>> {
        if self.statistics.reward_samples() < self.config.min_update_interval
            || self.statistics.mean_confidence() <= self.config.confidence_stop_threshold
        {
            return Ok(None);
        }

        let candidate = self.statistics.mean_reward();
        let improved = candidate > self.best_mean_reward;
        if improved {
            self.best_mean_reward = candidate;
            self.best_update_params = self.update.snapshot();
            info!(
                best_mean_reward = self.best_mean_reward,
                "update network improved"
            );
        } else {
            debug!(
                candidate_mean_reward = candidate,
                best_mean_reward = self.best_mean_reward,
                "update network candidate rejected"
            );
        }

        self.update.restore(&self.best_update_params)?;
        self.update.perturb(self.config.update_delta, &mut self.rng)?;
        self.statistics.reset_reward();
        self.trajectory = None;
        self.phase = AgentPhase::FirstStep;

        Ok(Some(MetaUpdateReport {
            best_mean_reward: self.best_mean_reward,
            candidate_mean_reward: candidate,
            improved,
        }))
    }

    fn maybe_report(&mut self) {
        if !self.config.reporting_enabled() {
            return;
        }
        let interval = self.config.debug_interval as u64;
        if self.statistics.steady_steps() % interval != 0 {
            return;
        }
        let Some(reporter) = self.reporter.as_mut() else {
            return;
        };
        let row = self.statistics.next_row();
        if let Err(err) = reporter.write_row(&row) {
            warn!(error = %err, index = row.index, "failed to write report row");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CountingTrigger, FixedTelemetry, GcTriggerError, NoopTrigger, SteppedClock};
    use crate::report::{ReportRow, ReportError};
    use approx::assert_abs_diff_eq;
    use gc_nn::{Layer, LayerKind};
    use rand::SeedableRng;

    fn small_config() -> AgentConfig {
        AgentConfig {
            state_size: 6,
            policy_hidden: 5,
            value_hidden: 5,
            update_hidden: 4,
            ..AgentConfig::default()
        }
    }

    fn telemetry() -> FixedTelemetry {
        let mut obs = [0.0; OBSERVATION_SIZE];
        for (idx, value) in obs.iter_mut().enumerate() {
            *value = 0.1 * idx as f32;
        }
        FixedTelemetry::new(obs)
    }

    fn agent<G: GcTrigger>(config: AgentConfig, trigger: G) -> GcAgent<FixedTelemetry, G> {
        GcAgent::with_rng(config, telemetry(), trigger, StdRng::seed_from_u64(7))
            .unwrap()
            .with_clock(SteppedClock::new(Duration::from_millis(500)))
    }

    #[test]
    fn networks_follow_the_configured_topology() {
        let agent = agent(small_config(), NoopTrigger);
        assert_eq!(agent.policy_network().input_len(), 6);
        assert_eq!(agent.policy_network().output_len(), ACTION_COUNT);
        assert_eq!(agent.value_network().output_len(), 1);
        assert_eq!(agent.update_network().input_len(), 6 + 2 + OBSERVATION_SIZE);
        assert_eq!(agent.update_network().output_len(), 6);
        assert_eq!(agent.update_network().len(), 3);
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let config = AgentConfig {
            state_size: 0,
            ..small_config()
        };
        assert!(GcAgent::new(config, telemetry(), NoopTrigger).is_err());
    }

    #[test]
    fn initial_policy_is_uniform() {
        let mut agent = agent(small_config(), NoopTrigger);
        let outcome = agent.invoke().unwrap();
        assert_eq!(outcome.phase, AgentPhase::FirstStep);
        assert_eq!(outcome.probability, 0.5);
        assert!(outcome.reward.is_none());
        assert_eq!(agent.phase(), AgentPhase::SteadyStep);
    }

    #[test]
    fn first_step_marks_missing_history() {
        let mut agent = agent(small_config(), NoopTrigger);
        agent.invoke().unwrap();
        let input = agent.update_network().layers()[0].input();
        assert!(input[..8].iter().all(|&v| v == NO_PREVIOUS));
        assert_eq!(&input[8..], &telemetry().observe());
    }

    #[test]
    fn steady_step_encodes_previous_state_and_action() {
        let mut agent = agent(small_config(), NoopTrigger);
        let first = agent.invoke().unwrap();
        let state = agent.latent_state().unwrap().to_vec();
        agent.invoke().unwrap();
        let input = agent.update_network().layers()[0].input();
        assert_eq!(&input[..6], state.as_slice());
        let mut one_hot = [0.0; ACTION_COUNT];
        one_hot[first.action] = 1.0;
        assert_eq!(&input[6..8], &one_hot);
    }

    #[test]
    fn reward_is_negative_elapsed_seconds() {
        let mut agent = agent(small_config(), NoopTrigger);
        agent.invoke().unwrap();
        let outcome = agent.invoke().unwrap();
        assert_abs_diff_eq!(outcome.reward.unwrap(), -0.5);
        assert_abs_diff_eq!(agent.statistics().mean_time_interval(), 0.5);
    }

    #[test]
    fn value_moves_along_the_td_error() {
        let mut agent = agent(small_config(), NoopTrigger);
        agent.invoke().unwrap();
        let state = agent.latent_state().unwrap().to_vec();
        let before = agent.value.forward(&state).unwrap()[0];
        let outcome = agent.invoke().unwrap();
        let after = agent.value.forward(&state).unwrap()[0];
        let td_error = outcome.td_error.unwrap();
        assert!(td_error < 0.0);
        assert!(after < before);
    }

    #[test]
    fn collection_requests_follow_sampled_actions() {
        let mut agent = agent(small_config(), CountingTrigger::default());
        let mut collects = 0;
        for _ in 0..40 {
            if agent.invoke().unwrap().requested_collection() {
                collects += 1;
            }
        }
        assert_eq!(agent.trigger().requests(), collects);
        assert!(collects > 0 && collects < 40);
    }

    struct FailingTrigger;

    impl GcTrigger for FailingTrigger {
        fn collect_now(&mut self) -> Result<(), GcTriggerError> {
            Err(GcTriggerError::Unavailable("host refused".into()))
        }
    }

    #[test]
    fn trigger_failures_are_not_fatal() {
        let mut agent = agent(small_config(), FailingTrigger);
        for _ in 0..20 {
            agent.invoke().unwrap();
        }
        assert_eq!(agent.statistics().steady_steps(), 19);
    }

    struct BrokenReporter;

    impl Reporter for BrokenReporter {
        fn write_row(&mut self, _row: &ReportRow) -> Result<(), ReportError> {
            Err(ReportError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    #[test]
    fn report_failures_are_not_fatal() {
        let config = AgentConfig {
            debug_interval: 2,
            ..small_config()
        };
        let mut agent = agent(config, NoopTrigger).with_reporter(BrokenReporter);
        for _ in 0..7 {
            agent.invoke().unwrap();
        }
        assert_eq!(agent.statistics().rows_emitted(), 3);
    }

    #[test]
    fn rows_are_only_numbered_when_a_reporter_listens() {
        let config = AgentConfig {
            debug_interval: 2,
            ..small_config()
        };
        let mut agent = agent(config, NoopTrigger);
        for _ in 0..7 {
            agent.invoke().unwrap();
        }
        assert_eq!(agent.statistics().rows_emitted(), 0);

        let mut agent = agent.with_reporter(BrokenReporter);
        agent.invoke().unwrap();
        agent.invoke().unwrap();
        assert_eq!(agent.statistics().steady_steps(), 8);
        assert_eq!(agent.statistics().rows_emitted(), 1);
    }

    #[test]
    fn oversized_windows_build_without_preallocating() {
        let mut config = AgentConfig::from_json_str(&format!(
            r#"{{ "min_update_interval": {}, "debug_interval": {} }}"#,
            usize::MAX,
            i64::MAX
        ))
        .unwrap();
        config.state_size = 6;
        config.policy_hidden = 5;
        config.value_hidden = 5;
        config.update_hidden = 4;
        let mut agent = agent(config, NoopTrigger);
        for _ in 0..4 {
            assert!(agent.invoke().unwrap().meta_update.is_none());
        }
        assert_eq!(agent.statistics().reward_samples(), 3);
    }

    #[test]
    fn meta_update_waits_for_confidence() {
        let config = AgentConfig {
            min_update_interval: 2,
            confidence_stop_threshold: 0.99,
            ..small_config()
        };
        let mut agent = agent(config, NoopTrigger);
        for _ in 0..10 {
            assert!(agent.invoke().unwrap().meta_update.is_none());
        }
        assert_eq!(agent.best_mean_reward(), f32::NEG_INFINITY);
    }

    #[test]
    fn rejected_candidates_restart_from_the_best_parameters() {
        let config = AgentConfig {
            min_update_interval: 2,
            confidence_stop_threshold: 0.0,
            ..small_config()
        };
        let mut agent = agent(config, NoopTrigger);
        let mut reports = Vec::new();
        for _ in 0..9 {
            if let Some(report) = agent.invoke().unwrap().meta_update {
                reports.push(report);
            }
        }
        // Constant intervals give every candidate the same mean reward.
        assert_eq!(reports.len(), 3);
        assert!(reports[0].improved);
        assert!(reports[1..].iter().all(|r| !r.improved));
        let drift = agent
            .best_update_parameters()
            .max_abs_diff(&agent.update_network().snapshot())
            .unwrap();
        assert!(drift <= agent.config().update_delta);
    }

    #[test]
    fn recurrent_update_cell_runs_and_resets() {
        let config = AgentConfig {
            update_cell: UpdateCell::Lstm,
            min_update_interval: 3,
            confidence_stop_threshold: 0.0,
            ..small_config()
        };
        let mut agent = agent(config, NoopTrigger);
        assert_eq!(agent.update_network().layers()[0].kind(), LayerKind::Lstm);
        let first = agent.invoke().unwrap();
        assert_eq!(first.phase, AgentPhase::FirstStep);
        let mut saw_meta = false;
        for _ in 0..8 {
            saw_meta |= agent.invoke().unwrap().meta_update.is_some();
        }
        assert!(saw_meta);
    }
}
