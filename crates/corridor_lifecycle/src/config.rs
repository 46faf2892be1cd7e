//! Supervisor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential back-off between recovery attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// First delay
    pub initial_ms: u64,
    /// Growth factor per attempt
    pub multiplier: u32,
    /// Delay cap
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 100,
            multiplier: 2,
            max_ms: 1_600,
        }
    }
}

impl BackoffPolicy {
    /// Delay before attempt `attempt` (zero-based)
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(attempt);
        Duration::from_millis(self.initial_ms.saturating_mul(factor).min(self.max_ms))
    }
}

/// Lifecycle supervisor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Throughput of one optical lane
    pub lane_rate_gbps: u64,
    /// Degraded longer than this escalates to Failed
    pub escalation_timeout_ms: u64,
    /// Healthy telemetry must hold this long before Degraded returns to Ready
    pub recovery_window_ms: u64,
    /// Back-off between recovery attempts
    pub backoff: BackoffPolicy,
    /// BER above `ratio * target` counts as drift
    pub ber_drift_ratio: f64,
    /// Default corridor target BER
    pub target_ber: f64,
    /// BER assumed for a corridor before its first calibration
    pub initial_ber: f64,
    /// Ambient profile used at admission
    pub ambient_profile: String,
    /// Move bundles off dropped devices to the nearest tier
    pub failover: bool,
    /// Modelled duration of a latency class migration
    pub migration_ms: u64,
    /// Events kept in the journal history
    pub event_history: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            lane_rate_gbps: 52,
            escalation_timeout_ms: 60_000,
            recovery_window_ms: 5_000,
            backoff: BackoffPolicy::default(),
            ber_drift_ratio: 10.0,
            target_ber: 1e-12,
            initial_ber: 1e-9,
            ambient_profile: "lab_default".to_string(),
            failover: true,
            migration_ms: 50,
            event_history: 1024,
        }
    }
}

impl SupervisorConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the escalation timeout
    #[must_use]
    pub fn with_escalation_timeout(mut self, timeout_ms: u64) -> Self {
        self.escalation_timeout_ms = timeout_ms;
        self
    }

    /// Set the recovery window
    #[must_use]
    pub fn with_recovery_window(mut self, window_ms: u64) -> Self {
        self.recovery_window_ms = window_ms;
        self
    }

    /// Set the back-off policy
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Enable or disable failover of bundles
    #[must_use]
    pub fn with_failover(mut self, enabled: bool) -> Self {
        self.failover = enabled;
        self
    }

    /// Set the modelled migration duration
    #[must_use]
    pub fn with_migration_time(mut self, migration_ms: u64) -> Self {
        self.migration_ms = migration_ms;
        self
    }

    /// Escalation timeout as a duration
    #[must_use]
    pub fn escalation_timeout(&self) -> Duration {
        Duration::from_millis(self.escalation_timeout_ms)
    }

    /// Recovery window as a duration
    #[must_use]
    pub fn recovery_window(&self) -> Duration {
        Duration::from_millis(self.recovery_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u64> = (0..7).map(|i| policy.delay(i).as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 1600, 1600]);
        assert_eq!(policy.delay(200).as_millis(), 1600);
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: SupervisorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SupervisorConfig::default());
        assert_eq!(config.escalation_timeout(), Duration::from_secs(60));
        assert_eq!(config.lane_rate_gbps, 52);
    }
}
