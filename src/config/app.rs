//! Application configuration structures.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pipeline::{
    Backpressure, BackpressureMode, DEFAULT_PUBLISH_TIMEOUT, DEFAULT_QUEUE_CAPACITY,
};
use crate::store::{
    DEFAULT_MAX_COMPENSATION, DEFAULT_MIN_COMPENSATION, Department, EmployeeDraft, EmployeeId,
    StoreLimits,
};

use super::validation::ConfigError;

// =============================================================================
// Store Configuration
// =============================================================================

/// Record store validation bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Smallest accepted employee id (default: 1).
    pub min_id: EmployeeId,

    /// Inclusive minimum compensation (default: 20000).
    pub min_compensation: f64,

    /// Inclusive maximum compensation (default: 2000000).
    pub max_compensation: f64,

    /// Whether employees may be removed (default: true).
    pub allow_removal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_id: 1,
            min_compensation: DEFAULT_MIN_COMPENSATION,
            max_compensation: DEFAULT_MAX_COMPENSATION,
            allow_removal: true,
        }
    }
}

impl StoreConfig {
    pub fn limits(&self) -> StoreLimits {
        StoreLimits {
            min_id: self.min_id,
            min_compensation: self.min_compensation,
            max_compensation: self.max_compensation,
            allow_removal: self.allow_removal,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

/// Aggregation pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Change-event queue capacity (default: 100).
    pub queue_capacity: usize,

    /// Policy when the queue is full: `timeout`, `drop` or `block` (default: timeout).
    pub backpressure: BackpressureMode,

    /// Maximum wait for queue space under `timeout` (default: "100ms").
    #[serde(with = "humantime_serde")]
    pub publish_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: BackpressureMode::default(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    pub fn policy(&self) -> Backpressure {
        Backpressure::from_mode(self.backpressure, self.publish_timeout)
    }
}

// =============================================================================
// Seed Roster
// =============================================================================

/// An employee loaded at startup, with optional initial ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedEmployee {
    pub id: EmployeeId,
    pub name: String,
    pub position: String,
    pub compensation: f64,
    #[serde(default)]
    pub department: Option<Department>,
    /// Join date as `YYYY-MM-DD`.
    #[serde(default)]
    pub join_date: Option<NaiveDate>,
    #[serde(default)]
    pub ratings: Vec<f64>,
}

impl SeedEmployee {
    pub fn draft(&self) -> EmployeeDraft {
        EmployeeDraft {
            department: self.department,
            join_date: self.join_date,
            ..EmployeeDraft::new(
                self.id,
                self.name.clone(),
                self.position.clone(),
                self.compensation,
            )
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Configuration file read when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "configs/roster.yaml";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Aggregation pipeline configuration.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Employees created at startup.
    #[serde(default)]
    pub seed: Vec<SeedEmployee>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Load an explicitly requested file, or `default_path` when none was
    /// requested.
    ///
    /// Only a missing default file falls back to built-in defaults; a missing
    /// explicit file is an error.
    pub fn load_or_default(
        explicit: Option<&Path>,
        default_path: &Path,
    ) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None if default_path.exists() => Self::load(default_path),
            None => {
                tracing::warn!(
                    path = %default_path.display(),
                    "Config file not found, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.store;
        if store.min_id < 1 {
            return Err(ConfigError::ValidationError(
                "store min_id must be positive".to_string(),
            ));
        }

        if !store.min_compensation.is_finite()
            || !store.max_compensation.is_finite()
            || store.min_compensation < 0.0
            || store.min_compensation > store.max_compensation
        {
            return Err(ConfigError::ValidationError(format!(
                "store compensation bounds are invalid: {} - {}",
                store.min_compensation, store.max_compensation
            )));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline queue_capacity must be positive".to_string(),
            ));
        }

        if self.pipeline.backpressure == BackpressureMode::Timeout
            && self.pipeline.publish_timeout.is_zero()
        {
            return Err(ConfigError::ValidationError(
                "pipeline publish_timeout must be non-zero with timeout backpressure".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for seed in &self.seed {
            if !seen.insert(seed.id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate seed employee id: {}",
                    seed.id
                )));
            }
        }

        Ok(())
    }
}
