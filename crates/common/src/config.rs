//! Session configuration (serde, loadable from TOML).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Length-prefix width assumed until extradata says otherwise.
pub const DEFAULT_LENGTH_SIZE: u8 = 4;

/// How many worker threads the engine is asked to start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPolicy {
    /// Threads per available processing unit.
    pub multiplier: u32,
    /// Upper bound on the derived count.
    pub max: u32,
    /// Exact count, overriding the heuristic. `Some(0)` disables workers.
    pub fixed: Option<u32>,
}

impl Default for WorkerPolicy {
    fn default() -> Self {
        Self {
            multiplier: 2,
            max: 32,
            fixed: None,
        }
    }
}

impl WorkerPolicy {
    /// Worker count for a machine with `available` processing units.
    pub fn thread_count(&self, available: usize) -> u32 {
        if let Some(fixed) = self.fixed {
            return fixed;
        }
        let available = u32::try_from(available).unwrap_or(u32::MAX);
        available.saturating_mul(self.multiplier).min(self.max)
    }
}

/// Late-frame admission thresholds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatenessPolicy {
    /// Once frames have been late for longer than this, every block is dropped.
    pub drop_always_after_ms: u64,
    /// Above this many late frames, decoded pictures are not displayed.
    pub soft_threshold: u32,
    /// Above this many late frames, blocks are not decoded at all.
    pub hard_threshold: u32,
}

impl Default for LatenessPolicy {
    fn default() -> Self {
        Self {
            drop_always_after_ms: 5_000,
            soft_threshold: 4,
            hard_threshold: 12,
        }
    }
}

impl LatenessPolicy {
    pub fn drop_always_after(&self) -> Duration {
        Duration::from_millis(self.drop_always_after_ms)
    }
}

/// Per-session decoder configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// NAL length-prefix width (1..=4) used when extradata does not carry one.
    pub default_length_size: u8,
    pub workers: WorkerPolicy,
    pub lateness: LatenessPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_length_size: DEFAULT_LENGTH_SIZE,
            workers: WorkerPolicy::default(),
            lateness: LatenessPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(1..=4).contains(&self.default_length_size) {
            return Err(SessionError::InvalidConfig(format!(
                "default_length_size must be 1..=4, got {}",
                self.default_length_size
            )));
        }
        if self.lateness.soft_threshold > self.lateness.hard_threshold {
            return Err(SessionError::InvalidConfig(format!(
                "soft_threshold ({}) exceeds hard_threshold ({})",
                self.lateness.soft_threshold, self.lateness.hard_threshold
            )));
        }
        Ok(())
    }
}
