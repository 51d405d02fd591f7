//! Jittered gaussian sleep intervals.
//!
//! Three policies: idle poll (nothing open), post-notification poll (slots
//! open, avoid spamming) and crash backoff (before restarting the browser).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use slotwatch_core::config::{DelayConfig, DelayPolicy};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    Idle,
    AfterNotify,
    CrashBackoff,
}

impl std::fmt::Display for DelayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayKind::Idle => write!(f, "idle"),
            DelayKind::AfterNotify => write!(f, "after-notify"),
            DelayKind::CrashBackoff => write!(f, "crash-backoff"),
        }
    }
}

/// Gaussian sample plus uniform jitter, truncated to whole seconds and never
/// below `floor_secs`.
pub fn jittered_delay<R: Rng + ?Sized>(
    rng: &mut R,
    policy: DelayPolicy,
    jitter_secs: f64,
    floor_secs: u64,
) -> Duration {
    let gauss = Normal::new(policy.mean_secs, policy.std_secs.abs())
        .map(|n| n.sample(rng))
        .unwrap_or(policy.mean_secs);
    // The range width must stay finite or `gen_range` panics.
    let jitter = if jitter_secs > 0.0 && (2.0 * jitter_secs).is_finite() {
        rng.gen_range(-jitter_secs..=jitter_secs)
    } else {
        0.0
    };

    // `as` saturates and maps NaN to 0, so the floor always applies.
    let secs = (gauss + jitter).trunc() as i64;
    Duration::from_secs(secs.max(floor_secs as i64) as u64)
}

/// Owns the RNG and the configured policies.
pub struct DelayGenerator {
    config: DelayConfig,
    rng: StdRng,
}

impl DelayGenerator {
    pub fn new(config: DelayConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and replays.
    pub fn with_seed(config: DelayConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn policy(&self, kind: DelayKind) -> DelayPolicy {
        match kind {
            DelayKind::Idle => self.config.idle,
            DelayKind::AfterNotify => self.config.after_notify,
            DelayKind::CrashBackoff => self.config.crash,
        }
    }

    pub fn next(&mut self, kind: DelayKind) -> Duration {
        let policy = self.policy(kind);
        jittered_delay(
            &mut self.rng,
            policy,
            self.config.jitter_secs,
            self.config.floor_secs,
        )
    }
}
