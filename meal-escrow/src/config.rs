//! Escrow Layer Configuration
//!
//! Supports loading from environment variables with the `MEAL_` prefix.

use meal_core::IssueSeverity;
use serde::{Deserialize, Serialize};
use std::env;

/// Delivery lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// How many days in the past a new delivery date may lie
    #[serde(default = "default_grace_days")]
    pub past_date_grace_days: i64,
}

fn default_grace_days() -> i64 {
    1
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            past_date_grace_days: default_grace_days(),
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - MEAL_PAST_DATE_GRACE_DAYS: Accepted age of a delivery date, in days
    pub fn from_env() -> Self {
        Self {
            past_date_grace_days: env::var("MEAL_PAST_DATE_GRACE_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_grace_days),
        }
    }
}

/// Escrow custody configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Payer reference handed to the settlement rail on lock
    pub payer_ref: String,
    /// Unresolved issues with these severities hold a release
    pub blocking_severities: Vec<IssueSeverity>,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            payer_ref: "gov-meal-program".to_string(),
            blocking_severities: vec![IssueSeverity::High, IssueSeverity::Critical],
        }
    }
}

impl EscrowConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - MEAL_ESCROW_PAYER_REF: Payer reference on the settlement rail
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            payer_ref: env::var("MEAL_ESCROW_PAYER_REF").unwrap_or(defaults.payer_ref),
            blocking_severities: defaults.blocking_severities,
        }
    }

    /// Whether a severity holds a release
    pub fn is_blocking(&self, severity: IssueSeverity) -> bool {
        self.blocking_severities.contains(&severity)
    }
}

/// Settlement rail HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRailConfig {
    /// Rail endpoint URL
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_rail_timeout")]
    pub timeout_secs: u64,
}

fn default_rail_timeout() -> u64 {
    30
}

impl Default for SettlementRailConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8545".to_string(),
            api_key: None,
            timeout_secs: default_rail_timeout(),
        }
    }
}

impl SettlementRailConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - MEAL_RAIL_URL: Rail endpoint URL
    /// - MEAL_RAIL_API_KEY: Bearer token (optional)
    /// - MEAL_RAIL_TIMEOUT: Request timeout in seconds
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("MEAL_RAIL_URL").unwrap_or(defaults.base_url),
            api_key: env::var("MEAL_RAIL_API_KEY").ok(),
            timeout_secs: env::var("MEAL_RAIL_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Combined configuration for the whole escrow layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub lifecycle: LifecycleConfig,
    pub escrow: EscrowConfig,
}

impl ProgramConfig {
    pub fn from_env() -> Self {
        Self {
            lifecycle: LifecycleConfig::from_env(),
            escrow: EscrowConfig::from_env(),
        }
    }
}
