use action_config::parser;
use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table};
use std::path::Path;

pub async fn run(config_path: &Path, format: &str) -> Result<()> {
    // Validate format
    if format != "table" && format != "json" {
        anyhow::bail!("Invalid format: {}. Must be 'table' or 'json'", format);
    }

    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&config.controls)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["CONTROL", "DESCRIPTION", "ENABLED", "PROGRESS", "STEPS", "FAILS"]);

    for (id, control) in &config.controls {
        let (enabled, color) = if control.enabled {
            ("yes", Color::Green)
        } else {
            ("no", Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(id),
            Cell::new(control.description.as_deref().unwrap_or("-")),
            Cell::new(enabled).fg(color),
            Cell::new(control.progress.kind()),
            Cell::new(format!("{} x {}ms", control.script.steps, control.script.step_ms)),
            Cell::new(if control.script.fail { "yes" } else { "no" }),
        ]);
    }

    println!("{}", table);
    Ok(())
}
