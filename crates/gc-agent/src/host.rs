// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Seams towards the host runtime: memory telemetry, the explicit collection
//! request and the clock the reward is measured with.

use std::fmt;
use std::time::{Duration, Instant};

use crate::{AgentError, AgentResult};

/// Width of the telemetry vector.
pub const OBSERVATION_SIZE: usize = 12;

/// One telemetry sample, laid out as described by [`ObservationSlot`].
pub type Observation = [f32; OBSERVATION_SIZE];

/// Position of every metric inside an [`Observation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum ObservationSlot {
    UsedMemoryGb = 0,
    MaxMemoryGb,
    UsedFraction,
    /// Available processors divided by 128.
    ProcessorShare,
    HeapInitGb,
    HeapCommittedGb,
    HeapUsedGb,
    HeapMaxGb,
    NonHeapInitGb,
    NonHeapCommittedGb,
    NonHeapUsedGb,
    NonHeapMaxGb,
}

impl ObservationSlot {
    pub const ALL: [ObservationSlot; OBSERVATION_SIZE] = [
        ObservationSlot::UsedMemoryGb,
        ObservationSlot::MaxMemoryGb,
        ObservationSlot::UsedFraction,
        ObservationSlot::ProcessorShare,
        ObservationSlot::HeapInitGb,
        ObservationSlot::HeapCommittedGb,
        ObservationSlot::HeapUsedGb,
        ObservationSlot::HeapMaxGb,
        ObservationSlot::NonHeapInitGb,
        ObservationSlot::NonHeapCommittedGb,
        ObservationSlot::NonHeapUsedGb,
        ObservationSlot::NonHeapMaxGb,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn read(self, observation: &Observation) -> f32 {
        observation[self.index()]
    }

    pub fn write(self, observation: &mut Observation, value: f32) {
        observation[self.index()] = value;
    }
}

/// Copies a telemetry vector gathered as a slice into an [`Observation`].
pub fn observation_from_slice(values: &[f32]) -> AgentResult<Observation> {
    Observation::try_from(values).map_err(|_| AgentError::ObservationLength {
        expected: OBSERVATION_SIZE,
        got: values.len(),
    })
}

/// Source of host memory telemetry.
pub trait Telemetry {
    fn observe(&mut self) -> Observation;
}

/// Telemetry that always reports the same sample.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedTelemetry {
    observation: Observation,
}

impl FixedTelemetry {
    pub fn new(observation: Observation) -> Self {
        Self { observation }
    }

    pub fn set(&mut self, observation: Observation) {
        self.observation = observation;
    }
}

impl Default for FixedTelemetry {
    fn default() -> Self {
        Self::new([0.0; OBSERVATION_SIZE])
    }
}

impl Telemetry for FixedTelemetry {
    fn observe(&mut self) -> Observation {
        self.observation
    }
}

/// Adapts a closure into a telemetry source.
pub struct FnTelemetry<F>(pub F);

impl<F> Telemetry for FnTelemetry<F>
where
    F: FnMut() -> Observation,
{
    fn observe(&mut self) -> Observation {
        (self.0)()
    }
}

impl<F> fmt::Debug for FnTelemetry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnTelemetry(..)")
    }
}

impl<T: Telemetry + ?Sized> Telemetry for Box<T> {
    fn observe(&mut self) -> Observation {
        (**self).observe()
    }
}

/// Failure of the explicit collection request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GcTriggerError {
    #[error("garbage collection request unavailable: {0}")]
    Unavailable(String),
}

/// Host hook that asks the runtime to collect now.
pub trait GcTrigger {
    fn collect_now(&mut self) -> Result<(), GcTriggerError>;
}

/// Trigger that ignores every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTrigger;

impl GcTrigger for NoopTrigger {
    fn collect_now(&mut self) -> Result<(), GcTriggerError> {
        Ok(())
    }
}

/// Trigger that only counts requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountingTrigger {
    requests: u64,
}

impl CountingTrigger {
    pub fn requests(&self) -> u64 {
        self.requests
    }
}

impl GcTrigger for CountingTrigger {
    fn collect_now(&mut self) -> Result<(), GcTriggerError> {
        self.requests += 1;
        Ok(())
    }
}

impl<T: GcTrigger + ?Sized> GcTrigger for Box<T> {
    fn collect_now(&mut self) -> Result<(), GcTriggerError> {
        (**self).collect_now()
    }
}

/// Monotonic time source. Readings are offsets from an arbitrary origin.
pub trait Clock {
    fn now(&mut self) -> Duration;
}

/// Wall-clock time measured with [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// Deterministic clock advancing by a fixed step on every reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SteppedClock {
    current: Duration,
    step: Duration,
}

impl SteppedClock {
    pub fn new(step: Duration) -> Self {
        Self {
            current: Duration::ZERO,
            step,
        }
    }

    pub fn set_step(&mut self, step: Duration) {
        self.step = step;
    }
}

impl Clock for SteppedClock {
    fn now(&mut self) -> Duration {
        self.current += self.step;
        self.current
    }
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now(&mut self) -> Duration {
        (**self).now()
    }
}
