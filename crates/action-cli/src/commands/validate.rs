use action_config::parser;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = parser::parse_file(config_path)
        .with_context(|| format!("Failed to validate {}", config_path.display()))?;

    println!(
        "Scene is valid: {} control(s) defined",
        config.controls.len()
    );
    for (id, control) in &config.controls {
        if !control.enabled {
            println!("  note: '{}' starts disabled", id);
        }
    }
    Ok(())
}
