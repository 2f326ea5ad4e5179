//! Registry configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Settings for the singleton registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Overall budget for a top-level construction, dependencies included
    pub construction_timeout_secs: u64,

    /// Rebuild policy applied by recovery wrappers
    pub recovery: RecoveryPolicy,
}

impl RegistryConfig {
    /// Construction budget as a [`Duration`]
    pub fn construction_timeout(&self) -> Duration {
        Duration::from_secs(self.construction_timeout_secs)
    }

    /// Set the construction budget
    pub fn with_construction_timeout(mut self, timeout: Duration) -> Self {
        self.construction_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the recovery policy
    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            construction_timeout_secs: DEFAULT_CONSTRUCTION_TIMEOUT_SECS,
            recovery: RecoveryPolicy::default(),
        }
    }
}

/// Bounded rebuild with a single fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Rebuild attempts after a failed liveness check
    pub max_attempts: u32,

    /// Delay between two attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl RecoveryPolicy {
    /// Policy with the given attempts and delay
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay_ms: u64::try_from(retry_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Delay between two attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RECOVERY_DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: RECOVERY_DEFAULT_RETRY_DELAY_MS,
        }
    }
}
