// ABOUTME: Configuration for the herd supervisor and its worker groups.
// ABOUTME: Loaded from TOML with environment expansion and validated up front.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration: supervisor tunables plus the ordered worker groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Worker groups in declaration order (`[[worker]]` tables).
    #[serde(rename = "worker", default)]
    pub groups: Vec<WorkerGroupSpec>,
}

/// A named class of identical worker processes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerGroupSpec {
    pub name: String,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Program followed by its arguments.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupervisorSettings {
    /// How long to wait for workers to exit after the termination signal.
    #[serde(default = "default_termination_timeout_secs")]
    pub termination_timeout_secs: f64,

    /// How long to wait for output monitors to drain once workers are gone.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: f64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Tag for supervisor-wide status lines.
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_replicas() -> u32 {
    1
}

fn default_termination_timeout_secs() -> f64 {
    15.0
}

fn default_drain_timeout_secs() -> f64 {
    5.0
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_label() -> String {
    "supervisor".to_string()
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            termination_timeout_secs: default_termination_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            label: default_label(),
        }
    }
}

impl SupervisorSettings {
    pub fn termination_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.termination_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_termination_timeout_secs()))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.drain_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_drain_timeout_secs()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl WorkerGroupSpec {
    pub fn new(name: impl Into<String>, replicas: u32, command: &[&str]) -> Self {
        Self {
            name: name.into(),
            replicas,
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }
}

impl Config {
    /// Load, expand, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            groups = config.groups.len(),
            instances = config.instance_count(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Expand `${VAR}` / `${VAR:-default}` references, then parse and validate.
    ///
    /// Undefined variables without a default are left in place, which makes
    /// them show up as parse or validation errors rather than silent blanks.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let expanded = shellexpand::env_with_context_no_errors(contents, |var: &str| {
            match std::env::var(var) {
                Ok(val) => Some(val),
                Err(_) => {
                    tracing::debug!(variable = %var, "Environment variable not defined");
                    None
                }
            }
        });

        let config: Config = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Total number of worker instances the groups expand into.
    pub fn instance_count(&self) -> usize {
        self.groups.iter().map(|g| g.replicas as usize).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[worker]] group is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(ConfigError::Invalid("worker name must not be empty".into()));
            }
            if !group
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(ConfigError::Invalid(format!(
                    "worker name '{}' may only contain letters, digits, '_' and '-'",
                    group.name
                )));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate worker name '{}'",
                    group.name
                )));
            }
            if group.replicas == 0 {
                return Err(ConfigError::Invalid(format!(
                    "worker '{}' needs at least one replica",
                    group.name
                )));
            }
            match group.program() {
                Some(program) if !program.is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "worker '{}' has an empty command",
                        group.name
                    )))
                }
            }
        }

        let settings = &self.supervisor;
        for (key, value) in [
            ("termination_timeout_secs", settings.termination_timeout_secs),
            ("drain_timeout_secs", settings.drain_timeout_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "supervisor.{key} must be a positive number of seconds"
                )));
            }
        }
        if settings.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "supervisor.poll_interval_ms must be positive".into(),
            ));
        }
        if settings.label.is_empty() {
            return Err(ConfigError::Invalid("supervisor.label must not be empty".into()));
        }

        Ok(())
    }
}
