//! Runtime configuration shared by the control plane and the agent loops.

use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lower bound for every poll interval.
pub const MIN_INTERVAL_MS: u64 = 1000;

const DEFAULT_INTERVAL_MS: u64 = 10_000;

/// Tunables that can change while a session runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Remote platform variant of the active (or last) session.
    pub platform: String,
    pub farm_check_interval_ms: u64,
    pub friend_check_interval_ms: u64,
    /// Always plant the lowest-level crop available.
    pub force_lowest_level_crop: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            platform: "qq".to_string(),
            farm_check_interval_ms: DEFAULT_INTERVAL_MS,
            friend_check_interval_ms: DEFAULT_INTERVAL_MS,
            force_lowest_level_crop: false,
        }
    }
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    pub farm_check_interval_ms: Option<u64>,
    pub friend_check_interval_ms: Option<u64>,
    pub force_lowest_level_crop: Option<bool>,
}

/// Config validation error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least {MIN_INTERVAL_MS} ms, got {value}")]
    IntervalTooShort { field: &'static str, value: u64 },
}

fn check_interval(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    match value {
        Some(value) if value < MIN_INTERVAL_MS => Err(ConfigError::IntervalTooShort { field, value }),
        _ => Ok(()),
    }
}

impl RuntimeConfig {
    /// Apply a partial update.
    ///
    /// # Errors
    /// Returns error if any interval is below [`MIN_INTERVAL_MS`]; the
    /// config is left untouched in that case.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        check_interval("farmCheckIntervalMs", update.farm_check_interval_ms)?;
        check_interval("friendCheckIntervalMs", update.friend_check_interval_ms)?;

        if let Some(ms) = update.farm_check_interval_ms {
            self.farm_check_interval_ms = ms;
        }
        if let Some(ms) = update.friend_check_interval_ms {
            self.friend_check_interval_ms = ms;
        }
        if let Some(force) = update.force_lowest_level_crop {
            self.force_lowest_level_crop = force;
        }
        Ok(())
    }

    #[must_use]
    pub const fn farm_check_interval(&self) -> Duration {
        Duration::from_millis(self.farm_check_interval_ms)
    }

    #[must_use]
    pub const fn friend_check_interval(&self) -> Duration {
        Duration::from_millis(self.friend_check_interval_ms)
    }
}

/// Process-wide handle to the runtime config.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<RuntimeConfig>>);

impl SharedConfig {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Copy of the current config.
    #[must_use]
    pub fn get(&self) -> RuntimeConfig {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Validate and apply a partial update, returning the new config.
    ///
    /// # Errors
    /// Returns error if validation fails.
    pub fn update(&self, update: &ConfigUpdate) -> Result<RuntimeConfig, ConfigError> {
        let mut config = self.0.write().unwrap_or_else(PoisonError::into_inner);
        config.apply(update)?;
        Ok(config.clone())
    }

    pub fn set_platform(&self, platform: impl Into<String>) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).platform = platform.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update() {
        let shared = SharedConfig::default();
        let update = ConfigUpdate {
            friend_check_interval_ms: Some(2500),
            force_lowest_level_crop: Some(true),
            ..ConfigUpdate::default()
        };

        let config = shared.update(&update).unwrap();
        assert_eq!(config.friend_check_interval(), Duration::from_millis(2500));
        assert_eq!(config.farm_check_interval_ms, DEFAULT_INTERVAL_MS);
        assert!(config.force_lowest_level_crop);
        assert_eq!(shared.get(), config);
    }

    #[test]
    fn test_short_interval_rejects_whole_update() {
        let shared = SharedConfig::default();
        let update = ConfigUpdate {
            farm_check_interval_ms: Some(999),
            force_lowest_level_crop: Some(true),
            ..ConfigUpdate::default()
        };

        let err = shared.update(&update).unwrap_err();
        assert_eq!(
            err,
            ConfigError::IntervalTooShort {
                field: "farmCheckIntervalMs",
                value: 999
            }
        );
        assert_eq!(shared.get(), RuntimeConfig::default());
    }

    #[test]
    fn test_minimum_is_inclusive() {
        let mut config = RuntimeConfig::default();
        let update: ConfigUpdate =
            serde_json::from_str(r#"{"farmCheckIntervalMs": 1000}"#).unwrap();
        config.apply(&update).unwrap();
        assert_eq!(config.farm_check_interval_ms, MIN_INTERVAL_MS);
    }
}
