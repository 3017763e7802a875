//! Configuration module for the roster service.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Store settings (id floor, compensation bounds, removal)
//! - Pipeline settings (queue capacity, backpressure policy, publish timeout)
//! - Seed roster loaded at startup

mod app;
mod validation;

pub use app::{AppConfig, DEFAULT_CONFIG_PATH, PipelineConfig, SeedEmployee, StoreConfig};
pub use validation::{ConfigError, parse_duration};
