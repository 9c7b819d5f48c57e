//! Configuration module for the munin-poll service.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Output channel capacity
//! - Node definitions (name, host, port, interval, timeout)

mod app;
mod validation;

pub use app::{AppConfig, DEFAULT_CHANNEL_CAPACITY};
pub use validation::{ConfigError, expand_env_vars};
