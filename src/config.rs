//! Engine configuration
//!
//! The tunables callers may adjust. Segmentation and feasibility thresholds are
//! fixed constants in their modules and are not configurable.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::ovulation::DEFAULT_LUTEAL_PHASE_DAYS;
use crate::policy::{is_valid_cycle_length, is_valid_period_length};

/// Cycle length used when neither history nor baseline provides one
pub const DEFAULT_CYCLE_LENGTH: i64 = 28;

/// Period length used when neither history nor baseline provides one
pub const DEFAULT_PERIOD_LENGTH: i64 = 5;

/// Default number of trailing points in a cycle-length trend
pub const DEFAULT_MAX_TREND_POINTS: usize = 12;

/// Configuration shared by every engine stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Days between ovulation and the next period
    #[serde(default = "default_luteal_phase_days")]
    pub luteal_phase_days: i64,
    /// Global fallback cycle length
    #[serde(default = "default_cycle_length")]
    pub default_cycle_length: i64,
    /// Global fallback period length
    #[serde(default = "default_period_length")]
    pub default_period_length: i64,
    /// Trailing points kept in a cycle-length trend
    #[serde(default = "default_max_trend_points")]
    pub max_trend_points: usize,
}

fn default_luteal_phase_days() -> i64 {
    DEFAULT_LUTEAL_PHASE_DAYS
}

fn default_cycle_length() -> i64 {
    DEFAULT_CYCLE_LENGTH
}

fn default_period_length() -> i64 {
    DEFAULT_PERIOD_LENGTH
}

fn default_max_trend_points() -> usize {
    DEFAULT_MAX_TREND_POINTS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            luteal_phase_days: DEFAULT_LUTEAL_PHASE_DAYS,
            default_cycle_length: DEFAULT_CYCLE_LENGTH,
            default_period_length: DEFAULT_PERIOD_LENGTH,
            max_trend_points: DEFAULT_MAX_TREND_POINTS,
        }
    }
}

impl EngineConfig {
    /// Check that the defaults lie inside the onboarding ranges
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.luteal_phase_days <= 0 {
            return Err(EngineError::InvalidConfig(format!(
                "luteal_phase_days must be positive, got {}",
                self.luteal_phase_days
            )));
        }
        if !is_valid_cycle_length(self.default_cycle_length) {
            return Err(EngineError::InvalidConfig(format!(
                "default_cycle_length {} outside 15-90",
                self.default_cycle_length
            )));
        }
        if !is_valid_period_length(self.default_period_length) {
            return Err(EngineError::InvalidConfig(format!(
                "default_period_length {} outside 1-14",
                self.default_period_length
            )));
        }
        Ok(())
    }

    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{"luteal_phase_days": 13}"#).unwrap();
        assert_eq!(config.luteal_phase_days, 13);
        assert_eq!(config.default_cycle_length, DEFAULT_CYCLE_LENGTH);
        assert_eq!(config.max_trend_points, DEFAULT_MAX_TREND_POINTS);
    }

    #[test]
    fn test_out_of_range_default_is_rejected() {
        let result = EngineConfig::from_json(r#"{"default_cycle_length": 120}"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_serialization() {
        let config = EngineConfig::default();
        let loaded = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, loaded);
    }
}
