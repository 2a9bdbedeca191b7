//! Process-wide configuration shared by the gc-pilot crates.
//!
//! Two concerns live here: the deterministic seeding policy every randomized
//! component draws its generator from, and the tracing subscriber setup used
//! by drivers and tests.

pub mod determinism;
pub mod tracing;

pub use determinism::{rng_from_label, rng_from_optional, DeterminismConfig};
pub use self::tracing::{ensure_tracing, init_tracing, InitError};
