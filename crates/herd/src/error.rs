// ABOUTME: Error types for the herd supervisor.
// ABOUTME: Defines SupervisorError covering config, spawn, pipe, and signal failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] herd_core::ConfigError),

    #[error("Failed to start {instance} ({program}): {source}")]
    Spawn {
        instance: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set up output capture for {instance}: {source}")]
    Pipe {
        instance: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Signal delivery failed: {0}")]
    Signal(#[from] nix::Error),

    #[error("Failed to install signal handlers: {0}")]
    SignalHandler(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
