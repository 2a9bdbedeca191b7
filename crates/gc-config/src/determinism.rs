use rand::{rngs::StdRng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Seeding policy for every randomized component of the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterminismConfig {
    /// Whether label-derived seeds replace operating-system entropy.
    pub enabled: bool,
    /// Base seed that per-component seeds are derived from.
    pub base_seed: u64,
}

impl Default for DeterminismConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_seed: 42,
        }
    }
}

impl DeterminismConfig {
    /// Builds a configuration snapshot from `GC_PILOT_DETERMINISTIC` and
    /// `GC_PILOT_SEED`.
    pub fn from_env() -> Self {
        let enabled = std::env::var("GC_PILOT_DETERMINISTIC")
            .ok()
            .map(|v| !matches!(v.as_str(), "0" | "false" | "False" | "off" | "OFF"))
            .unwrap_or(false);

        let base_seed = std::env::var("GC_PILOT_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(42);

        Self { enabled, base_seed }
    }

    /// Derives a deterministic seed for a given component label.
    pub fn seed_for<L: Hash>(&self, label: L) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.base_seed.hash(&mut hasher);
        label.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns a generator for `label` under this policy.
    pub fn rng_for(&self, label: &str) -> StdRng {
        if self.enabled {
            StdRng::seed_from_u64(self.seed_for(label))
        } else {
            StdRng::from_entropy()
        }
    }
}

static CONFIG: OnceLock<DeterminismConfig> = OnceLock::new();

/// Returns the lazily initialised process configuration.
pub fn config() -> &'static DeterminismConfig {
    CONFIG.get_or_init(DeterminismConfig::from_env)
}

/// Returns a RNG derived from the provided label. When determinism is disabled
/// this falls back to a random seed from the operating system.
pub fn rng_from_label(label: &str) -> StdRng {
    config().rng_for(label)
}

/// Returns a RNG seeded from an optional explicit seed, respecting deterministic
/// overrides when the seed is not provided.
pub fn rng_from_optional(seed: Option<u64>, label: &str) -> StdRng {
    match seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => rng_from_label(label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
    use std::sync::{Mutex, OnceLock};

    fn with_env(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let _lock = GUARD.get_or_init(|| Mutex::new(())).lock().unwrap();

        let snapshot: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let previous = std::env::var(key).ok();
                match value {
                    Some(val) => std::env::set_var(key, val),
                    None => std::env::remove_var(key),
                }
                ((*key).to_string(), previous)
            })
            .collect();

        let result = catch_unwind(AssertUnwindSafe(test));

        for (key, value) in snapshot {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }

        if let Err(err) = result {
            resume_unwind(err);
        }
    }

    #[test]
    fn defaults_disable_determinism() {
        with_env(
            &[("GC_PILOT_DETERMINISTIC", None), ("GC_PILOT_SEED", None)],
            || {
                let cfg = DeterminismConfig::from_env();
                assert!(!cfg.enabled);
                assert_eq!(cfg.base_seed, 42);
                assert_eq!(cfg, DeterminismConfig::default());
            },
        );
    }

    #[test]
    fn explicit_enables_override_defaults() {
        with_env(
            &[
                ("GC_PILOT_DETERMINISTIC", Some("1")),
                ("GC_PILOT_SEED", Some("1337")),
            ],
            || {
                let cfg = DeterminismConfig::from_env();
                assert!(cfg.enabled);
                assert_eq!(cfg.base_seed, 1337);
            },
        );
    }

    #[test]
    fn textual_false_values_disable_flags() {
        with_env(&[("GC_PILOT_DETERMINISTIC", Some("off"))], || {
            let cfg = DeterminismConfig::from_env();
            assert!(!cfg.enabled);
        });
    }

    #[test]
    fn derived_seeds_are_stable_per_label() {
        let cfg = DeterminismConfig {
            enabled: true,
            base_seed: 99,
        };
        assert_eq!(cfg.seed_for("alpha"), cfg.seed_for("alpha"));
        assert_ne!(cfg.seed_for("alpha"), cfg.seed_for("beta"));

        let mut first = cfg.rng_for("agent");
        let mut second = cfg.rng_for("agent");
        let a: Vec<f32> = (0..4).map(|_| first.gen()).collect();
        let b: Vec<f32> = (0..4).map(|_| second.gen()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_seed_wins_over_policy() {
        let mut lhs = rng_from_optional(Some(7), "left");
        let mut rhs = rng_from_optional(Some(7), "right");
        assert_eq!(lhs.gen::<u64>(), rhs.gen::<u64>());
    }
}
