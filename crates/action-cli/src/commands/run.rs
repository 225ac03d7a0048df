use crate::scene::Scene;
use action_config::parser;
use action_core::observe::ControllerEvent;
use anyhow::{Context, Result};
use futures::StreamExt;
use smol::io::{AsyncBufReadExt, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// One line typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Trigger(String),
    Cancel(String),
    Enable(String),
    Disable(String),
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let id = words.next().map(str::to_string);

        if words.next().is_some() {
            return Err(format!("Too many arguments: {}", line.trim()));
        }

        let need_id = |id: Option<String>| id.ok_or_else(|| format!("'{}' needs a control id", verb));

        match verb {
            "trigger" | "t" => need_id(id).map(ConsoleCommand::Trigger),
            "cancel" | "c" => need_id(id).map(ConsoleCommand::Cancel),
            "enable" => need_id(id).map(ConsoleCommand::Enable),
            "disable" => need_id(id).map(ConsoleCommand::Disable),
            "status" | "s" if id.is_none() => Ok(ConsoleCommand::Status),
            "help" | "?" if id.is_none() => Ok(ConsoleCommand::Help),
            "quit" | "exit" | "q" if id.is_none() => Ok(ConsoleCommand::Quit),
            "" => Err("Empty command".to_string()),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

const HELP: &str = "\
Commands:
  trigger <id>   run a control's action (same path as a remote trigger)
  cancel <id>    cancel the control's in-flight run
  enable <id>    allow triggers
  disable <id>   refuse triggers
  status         show every control
  quit           unmount everything and exit";

pub async fn run(config_path: &Path) -> Result<()> {
    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;
    let scene = Scene::mount(&config)?;

    // Forward controller events to the log
    let mut forwarders = Vec::new();
    for (id, control) in &scene.controls {
        let events = control.controller.subscribe();
        let id = id.clone();
        forwarders.push(smol::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    ControllerEvent::RunFailed { run, error_count } => {
                        warn!("{}: {} failed (failure #{})", id, run, error_count)
                    }
                    other => info!("{}: {:?}", id, other),
                }
            }
        }));
    }

    println!("{}", HELP);
    let mut lines = BufReader::new(smol::Unblock::new(std::io::stdin())).lines();

    while let Some(line) = lines.next().await {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match ConsoleCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };

        match command {
            ConsoleCommand::Trigger(id) => {
                if !scene.registry.invoke(&id) {
                    eprintln!("No control mounted as '{}'", id);
                }
            }
            ConsoleCommand::Cancel(id) => match scene.control(&id) {
                Some(control) => {
                    if !control.controller.cancel() {
                        println!("'{}' is idle", id);
                    }
                }
                None => eprintln!("No control mounted as '{}'", id),
            },
            ConsoleCommand::Enable(id) => set_enabled(&scene, &id, true),
            ConsoleCommand::Disable(id) => set_enabled(&scene, &id, false),
            ConsoleCommand::Status => println!("{}", scene.status_table()),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
        }
    }

    // Cancel anything still running, then unmount
    for control in scene.controls.values() {
        control.controller.cancel();
    }
    drop(scene);
    for forwarder in forwarders {
        forwarder.cancel().await;
    }
    Ok(())
}

fn set_enabled(scene: &Scene, id: &str, enabled: bool) {
    match scene.control(id) {
        Some(control) => control.enabled.set(enabled),
        None => eprintln!("No control mounted as '{}'", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ConsoleCommand::parse("trigger save"),
            Ok(ConsoleCommand::Trigger("save".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse("  c   export "),
            Ok(ConsoleCommand::Cancel("export".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse("disable publish"),
            Ok(ConsoleCommand::Disable("publish".to_string()))
        );
        assert_eq!(ConsoleCommand::parse("status"), Ok(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("q"), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ConsoleCommand::parse("trigger").unwrap_err().contains("needs a control id"));
        assert!(ConsoleCommand::parse("trigger a b").unwrap_err().contains("Too many"));
        assert!(ConsoleCommand::parse("launch x").unwrap_err().contains("Unknown command"));
        assert!(ConsoleCommand::parse("status save").is_err());
        assert!(ConsoleCommand::parse("").is_err());
    }
}
