//! # Action Configuration
//!
//! YAML scene files describing a set of mounted action controls.
//!
//! A scene lists every control by id together with its enablement, its
//! progress shape, and a script describing the simulated work the CLI runs
//! when the control is triggered.

#![warn(missing_docs)]

use action_core::progress::Progress;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod parser;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of a scene file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Configuration version
    pub version: String,

    /// Optional scene name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Global settings
    #[serde(default, skip_serializing_if = "Settings::is_default")]
    pub settings: Settings,

    /// Controls keyed by trigger id, in file order
    pub controls: IndexMap<String, ControlConfig>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Default log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Settings {
    /// Check if settings are default (all None)
    fn is_default(&self) -> bool {
        self == &Settings::default()
    }
}

/// One mounted control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Initial value of the enablement signal
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Progress shape
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Simulated work run on each trigger
    #[serde(default)]
    pub script: ScriptConfig,
}

fn default_enabled() -> bool {
    true
}

/// Progress reporter shape
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressConfig {
    /// No measurable fraction
    #[default]
    #[serde(rename = "indeterminate")]
    Indeterminate,

    /// Completed units out of a fixed total
    #[serde(rename = "discrete")]
    Discrete {
        /// Total units
        total_units: u64,
    },

    /// Weighted stages
    #[serde(rename = "weighted")]
    Weighted {
        /// One weight per stage
        weights: Vec<f64>,
    },
}

impl ProgressConfig {
    /// Build the reporter this configuration describes
    pub fn build(&self) -> Progress {
        match self {
            ProgressConfig::Indeterminate => Progress::indeterminate(),
            ProgressConfig::Discrete { total_units } => Progress::discrete(*total_units),
            ProgressConfig::Weighted { weights } => Progress::weighted(weights.clone()),
        }
    }

    /// Short name for display
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressConfig::Indeterminate => "indeterminate",
            ProgressConfig::Discrete { .. } => "discrete",
            ProgressConfig::Weighted { .. } => "weighted",
        }
    }
}

/// Scripted action body
///
/// The action performs `steps` steps of `step_ms` milliseconds each,
/// advancing progress after every step and checking for cancellation
/// between steps. With `fail` set the action errors after its last step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Number of steps
    #[serde(default = "default_steps")]
    pub steps: u64,

    /// Duration of each step in milliseconds
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,

    /// Whether the action fails after its last step
    #[serde(default)]
    pub fail: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_ms: default_step_ms(),
            fail: false,
        }
    }
}

fn default_steps() -> u64 {
    10
}

fn default_step_ms() -> u64 {
    100
}
