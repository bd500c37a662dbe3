//! Counter maintenance policy

use crate::{ConfigError, TallyError, TallyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound for a single store call.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

/// Policy shared by the hooks and the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterPolicy {
    /// Include equipment names that match no catalog entry in reports.
    pub report_orphans: bool,
    /// Upper bound for each individual store call.
    pub query_timeout: Duration,
}

impl Default for CounterPolicy {
    fn default() -> Self {
        Self {
            report_orphans: true,
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
        }
    }
}

impl CounterPolicy {
    /// Create a policy from environment variables.
    ///
    /// # Environment Variables
    /// - `TALLY_REPORT_ORPHANS`: "false" disables orphan listing (default: true)
    /// - `TALLY_QUERY_TIMEOUT_MS`: per-call store timeout (default: 5000)
    pub fn from_env() -> Self {
        let report_orphans = std::env::var("TALLY_REPORT_ORPHANS")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let query_timeout = Duration::from_millis(
            std::env::var("TALLY_QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_QUERY_TIMEOUT_MS),
        );

        Self {
            report_orphans,
            query_timeout,
        }
    }

    /// Validate the policy.
    pub fn validate(&self) -> TallyResult<()> {
        if self.query_timeout.is_zero() {
            return Err(TallyError::Config(ConfigError::InvalidValue {
                field: "query_timeout".to_string(),
                value: format!("{:?}", self.query_timeout),
                reason: "query_timeout must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }
}
