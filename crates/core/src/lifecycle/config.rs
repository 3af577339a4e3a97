//! Lifecycle configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Upper bound on one identification call (seconds).
    #[serde(default = "default_identification_timeout")]
    pub identification_timeout_secs: u64,

    /// Upper bound on one valuation call (seconds).
    #[serde(default = "default_valuation_timeout")]
    pub valuation_timeout_secs: u64,

    /// Close submissions left in a processing status at startup.
    #[serde(default = "default_true")]
    pub reconcile_on_startup: bool,

    /// Only reconcile submissions untouched for at least this long (seconds).
    /// 0 reconciles everything unfinished, which is right for a single instance.
    #[serde(default)]
    pub reconcile_after_secs: u64,
}

fn default_identification_timeout() -> u64 {
    60
}

fn default_valuation_timeout() -> u64 {
    90
}

fn default_true() -> bool {
    true
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            identification_timeout_secs: default_identification_timeout(),
            valuation_timeout_secs: default_valuation_timeout(),
            reconcile_on_startup: true,
            reconcile_after_secs: 0,
        }
    }
}

impl LifecycleConfig {
    pub fn identification_timeout(&self) -> Duration {
        Duration::from_secs(self.identification_timeout_secs)
    }

    pub fn valuation_timeout(&self) -> Duration {
        Duration::from_secs(self.valuation_timeout_secs)
    }

    pub fn reconcile_after(&self) -> Duration {
        Duration::from_secs(self.reconcile_after_secs)
    }
}
