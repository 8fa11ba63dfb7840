//! Expiry reaper configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::handlers::ExpiryReaperConfig;

/// Background reaper settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    /// Run the background loop
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_failed_intent_retention")]
    pub failed_intent_retention_days: i64,

    #[serde(default = "default_failed_transaction_retention")]
    pub failed_transaction_retention_days: i64,
}

impl ReaperConfig {
    pub fn to_reaper_config(&self) -> ExpiryReaperConfig {
        ExpiryReaperConfig {
            interval: Duration::from_secs(self.interval_secs),
            failed_intent_retention_days: self.failed_intent_retention_days,
            failed_transaction_retention_days: self.failed_transaction_retention_days,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::MustBePositive("reaper interval_secs"));
        }
        if self.failed_intent_retention_days <= 0 {
            return Err(ValidationError::MustBePositive("failed_intent_retention_days"));
        }
        if self.failed_transaction_retention_days <= 0 {
            return Err(ValidationError::MustBePositive(
                "failed_transaction_retention_days",
            ));
        }
        Ok(())
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            failed_intent_retention_days: default_failed_intent_retention(),
            failed_transaction_retention_days: default_failed_transaction_retention(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    3_600
}

fn default_failed_intent_retention() -> i64 {
    7
}

fn default_failed_transaction_retention() -> i64 {
    30
}
