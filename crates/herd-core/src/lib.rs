// ABOUTME: Shared types and configuration for herd.
// ABOUTME: Contains worker group declarations, config parsing, and error types.

pub mod config;
pub mod error;

pub use config::{Config, SupervisorSettings, WorkerGroupSpec};
pub use error::{ConfigError, Result};
