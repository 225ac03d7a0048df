//! Scene file parsing and validation

use crate::{ConfigError, ProgressConfig, Result, SceneConfig};
use std::path::Path;

/// Longest step a script may request
pub const MAX_STEP_MS: u64 = 60_000;

/// Parse a YAML scene file
pub fn parse_file(path: impl AsRef<Path>) -> Result<SceneConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse a YAML scene from a string
pub fn parse_str(content: &str) -> Result<SceneConfig> {
    let config: SceneConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate a scene
pub fn validate_config(config: &SceneConfig) -> Result<()> {
    // Check version
    if config.version != "1.0" {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected 1.0",
            config.version
        )));
    }

    for (id, control) in &config.controls {
        if id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Control ids must not be empty".to_string(),
            ));
        }

        if let ProgressConfig::Weighted { weights } = &control.progress {
            if weights.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Control '{}' has weighted progress without stages",
                    id
                )));
            }
            if let Some(weight) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "Control '{}' has invalid stage weight {}",
                    id, weight
                )));
            }
        }

        if control.script.step_ms > MAX_STEP_MS {
            return Err(ConfigError::ValidationError(format!(
                "Control '{}' step_ms {} exceeds {}",
                id, control.script.step_ms, MAX_STEP_MS
            )));
        }
    }

    Ok(())
}
