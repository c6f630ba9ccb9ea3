//! Executor settings: session build-time configuration.
//!
//! The scheduling policy and its parallel option are fixed for the lifetime
//! of a session; changing them means stopping and starting a new session
//! with new settings. Settings round-trip through TOML for configuration
//! files.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flujo_core::SchedulePolicy;

use crate::bridge::DEFAULT_QUEUE_CAPACITY;

/// Build-time configuration for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutorSettings {
    /// How the execution order is derived from the edge set.
    pub scheduling: SchedulePolicy,
    /// Run independent node subsets on worker threads. Static policies only.
    pub parallel: bool,
    /// Capacity of each command bridge ring, in commands.
    pub queue_capacity: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            scheduling: SchedulePolicy::default(),
            parallel: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ExecutorSettings {
    /// Checks the settings for contradictions.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.queue_capacity == 0 {
            return Err(SettingsError::ZeroQueueCapacity);
        }
        if self.parallel && self.scheduling == SchedulePolicy::Dynamic {
            return Err(SettingsError::ParallelDynamic);
        }
        Ok(())
    }

    /// Parses settings from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes the settings to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Errors from settings validation or (de)serialization.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A zero-capacity bridge cannot carry any mutation.
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
    /// The parallel option has no defined semantics with dynamic ordering.
    #[error("parallel execution requires a static scheduling policy")]
    ParallelDynamic,
    /// Failed to parse TOML.
    #[error("failed to parse settings: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// Failed to serialize TOML.
    #[error("failed to serialize settings: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
