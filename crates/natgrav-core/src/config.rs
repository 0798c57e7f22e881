//! Session configuration loaded from YAML.
//!
//! These are the per-process knobs of the gravity subsystem: scheduler
//! periods, the scan budget and the names of external resources. They are
//! distinct from [`GlobalSettings`], which are replicated across the session
//! and tuned by admins at runtime.
//!
//! [`GlobalSettings`]: crate::settings::GlobalSettings

use std::path::Path;

use natgrav_types::constants::{SKIP_EXTRA_TICKS, SKIP_TICKS};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Per-process configuration of one gravity session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Steps between membership refreshes.
    #[serde(default = "default_skip_ticks")]
    pub skip_ticks: u32,

    /// Membership refreshes between asteroid scan queue rebuilds.
    #[serde(default = "default_skip_extra_ticks")]
    pub skip_extra_ticks: u32,

    /// Initial steps that do nothing while the host world finishes loading.
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: u32,

    /// Maximum queued asteroids sampled per step.
    #[serde(default = "default_scan_budget")]
    pub scan_budget: usize,

    /// Name of the settings file inside the persistence area.
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// Name of the world template backing every field.
    #[serde(default = "default_anchor_name")]
    pub anchor_name: String,

    /// How long enter/leave notifications stay on screen.
    #[serde(default = "default_notify_duration_ms")]
    pub notify_duration_ms: u32,

    /// Running as a dedicated host with no local observer.
    #[serde(default)]
    pub dedicated: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            skip_ticks: default_skip_ticks(),
            skip_extra_ticks: default_skip_extra_ticks(),
            warmup_ticks: default_warmup_ticks(),
            scan_budget: default_scan_budget(),
            config_file: default_config_file(),
            anchor_name: default_anchor_name(),
            notify_duration_ms: default_notify_duration_ms(),
            dedicated: false,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }
}

const fn default_skip_ticks() -> u32 {
    SKIP_TICKS
}

const fn default_skip_extra_ticks() -> u32 {
    SKIP_EXTRA_TICKS
}

const fn default_warmup_ticks() -> u32 {
    10
}

const fn default_scan_budget() -> usize {
    4
}

fn default_config_file() -> String {
    "natural-gravity.cfg".to_owned()
}

fn default_anchor_name() -> String {
    "NaturalGravityBlocks".to_owned()
}

const fn default_notify_duration_ms() -> u32 {
    3000
}
