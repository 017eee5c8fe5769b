//! Per-page retry policies
//!
//! These sit above the transport's own retry budget: a page request that
//! still fails after the transport gave up is retried here.

use crate::types::{BackoffConfig, BackoffType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How failed page requests are retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// At most `max_attempts` attempts, with backoff between them
    Bounded {
        #[serde(default = "default_max_attempts")]
        max_attempts: u32,
        #[serde(default)]
        backoff: BackoffConfig,
    },
    /// Delays cycle through `delays_ms`; `max_attempts: None` retries forever
    Cyclic {
        #[serde(default = "default_cycle")]
        delays_ms: Vec<u64>,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cycle() -> Vec<u64> {
    vec![0, 100, 200]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded(default_max_attempts())
    }
}

impl RetryPolicy {
    /// Bounded policy with exponential backoff from 1s to 30s
    pub fn bounded(max_attempts: u32) -> Self {
        Self::Bounded {
            max_attempts,
            backoff: BackoffConfig::new(BackoffType::Exponential, 1000, 30000),
        }
    }

    /// Retry forever with delays of 0, 100 and 200 ms in turn
    pub fn cyclic() -> Self {
        Self::Cyclic {
            delays_ms: default_cycle(),
            max_attempts: None,
        }
    }

    /// Cyclic policy with a custom cycle and ceiling
    pub fn cyclic_with(delays_ms: Vec<u64>, max_attempts: Option<u32>) -> Self {
        Self::Cyclic {
            delays_ms,
            max_attempts,
        }
    }

    /// Whether another attempt may follow `attempts` failed ones
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        match self {
            Self::Bounded { max_attempts, .. } => attempts < *max_attempts,
            Self::Cyclic { max_attempts, .. } => max_attempts.map_or(true, |max| attempts < max),
        }
    }

    /// Delay before the retry that follows `failures` failed attempts
    ///
    /// For a cyclic policy the k-th retry (k = `failures`, starting at 1)
    /// waits `delays_ms[(k - 1) % len]`.
    pub fn delay(&self, failures: u32) -> Duration {
        match self {
            Self::Bounded { backoff, .. } => backoff.delay(failures.saturating_sub(1)),
            Self::Cyclic { delays_ms, .. } => {
                if delays_ms.is_empty() {
                    return Duration::ZERO;
                }
                let index = failures.saturating_sub(1) as usize % delays_ms.len();
                Duration::from_millis(delays_ms[index])
            }
        }
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Bounded { max_attempts: 0, .. } => {
                Err("bounded retry policy needs max_attempts >= 1".to_string())
            }
            Self::Cyclic { delays_ms, .. } if delays_ms.is_empty() => {
                Err("cyclic retry policy needs at least one delay".to_string())
            }
            Self::Cyclic {
                max_attempts: Some(0),
                ..
            } => Err("cyclic retry policy needs max_attempts >= 1".to_string()),
            _ => Ok(()),
        }
    }
}

/// Failure counter for one page request
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    failures: u32,
    retries: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed attempt
    ///
    /// Returns the delay before the next attempt, or `None` once the policy
    /// is exhausted.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        self.failures += 1;
        if !policy.allows_attempt(self.failures) {
            return None;
        }
        self.retries += 1;
        Some(policy.delay(self.failures))
    }

    /// Failures recorded so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Retries granted so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Attempts made so far, including the one in progress
    pub fn attempts(&self) -> u32 {
        self.failures + 1
    }
}
