//! Mounting scene controls into a shared trigger registry

use action_config::{ControlConfig, SceneConfig, ScriptConfig};
use action_core::prelude::*;
use action_runtime::smol::SmolSpawner;
use action_runtime::time::sleep;
use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A control mounted for the lifetime of the scene
pub struct MountedControl {
    pub controller: ActionController<Progress>,
    pub enabled: BoolCell,
    pub loading: BoolCell,
    pub config: ControlConfig,
    _mount: Mount<String>,
}

/// Every control of a scene, mounted into one registry
pub struct Scene {
    pub registry: Arc<TriggerRegistry<String>>,
    pub controls: IndexMap<String, MountedControl>,
}

impl Scene {
    /// Build and mount a controller for each control in `config`
    pub fn mount(config: &SceneConfig) -> Result<Self> {
        let registry = Arc::new(TriggerRegistry::new());
        let mut controls = IndexMap::new();

        for (id, control) in &config.controls {
            let enabled = BoolCell::new(control.enabled);
            let loading = BoolCell::default();
            let script = control.script.clone();

            let controller = ActionController::builder(control.progress.build())
                .label(id.clone())
                .enabled(enabled.clone())
                .loading_binding(loading.clone())
                .spawner(SmolSpawner)
                .build(move |progress, token| run_script(script.clone(), progress, token))?;

            let mount = controller.mount(id.clone(), &registry);
            info!("Mounted control '{}' ({})", id, control.progress.kind());

            controls.insert(
                id.clone(),
                MountedControl {
                    controller,
                    enabled,
                    loading,
                    config: control.clone(),
                    _mount: mount,
                },
            );
        }

        Ok(Self { registry, controls })
    }

    /// Look up a mounted control
    pub fn control(&self, id: &str) -> Option<&MountedControl> {
        self.controls.get(id)
    }

    /// Render the observable state of every control
    pub fn status_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec!["CONTROL", "STATE", "PROGRESS", "ERRORS", "ENABLED", "LOADING"]);

        for (id, control) in &self.controls {
            let snapshot = control.controller.snapshot();
            let (state, color) = match snapshot.current_run {
                Some(run) => (format!("running ({})", run), Color::Yellow),
                None => ("idle".to_string(), Color::DarkGrey),
            };
            let errors_color = if snapshot.error_count > 0 {
                Color::Red
            } else {
                Color::Green
            };

            table.add_row(vec![
                Cell::new(id),
                Cell::new(state).fg(color),
                Cell::new(format!(
                    "{} ({})",
                    snapshot.fraction_completed,
                    control.config.progress.kind()
                )),
                Cell::new(snapshot.error_count).fg(errors_color),
                Cell::new(if snapshot.enabled { "yes" } else { "no" }),
                Cell::new(if control.loading.get() { "yes" } else { "no" }),
            ]);
        }

        table
    }
}

/// Scripted action body: fixed steps, progress after each, cancellable between
pub async fn run_script(
    script: ScriptConfig,
    progress: Arc<Progress>,
    token: CancellationToken,
) -> action_core::Result<()> {
    let step = Duration::from_millis(script.step_ms);

    for done in 1..=script.steps {
        let cancelled = smol::future::or(
            async {
                sleep(step).await;
                false
            },
            async {
                token.cancelled().await;
                true
            },
        )
        .await;
        if cancelled {
            return Err(Error::Cancelled);
        }
        advance(&progress, done, script.steps);
    }

    if script.fail {
        return Err(Error::action(format!(
            "scripted failure after {} steps",
            script.steps
        )));
    }
    Ok(())
}

/// Move a reporter to `done` out of `steps`
fn advance(progress: &Progress, done: u64, steps: u64) {
    match progress {
        Progress::Indeterminate(_) => {}
        Progress::Discrete(discrete) => {
            let total = discrete.total_unit_count();
            // Spread the total evenly over the steps; u128 so large totals can't overflow
            let completed = total as u128 * done as u128 / steps.max(1) as u128;
            discrete.set_completed(completed as u64);
        }
        Progress::Weighted(weighted) => {
            let stages = weighted.stage_count();
            let overall = done as f64 / steps.max(1) as f64;
            for stage in 0..stages {
                let fraction = overall * stages as f64 - stage as f64;
                weighted.set_stage(stage, fraction.clamp(0.0, 1.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
version: "1.0"
controls:
  save:
    script:
      steps: 2
      step_ms: 1
  export:
    progress:
      type: discrete
      total_units: 10
    script:
      steps: 5
      step_ms: 1
  broken:
    script:
      steps: 1
      step_ms: 1
      fail: true
"#;

    fn scene() -> Scene {
        let config = action_config::parser::parse_str(SCENE).unwrap();
        Scene::mount(&config).unwrap()
    }

    async fn wait_idle(control: &MountedControl, events: &async_channel::Receiver<ControllerEvent>) {
        while control.controller.is_running() {
            let _ = events.recv().await;
        }
    }

    #[test]
    fn test_advance_discrete_and_weighted() {
        let discrete = Progress::discrete(10);
        advance(&discrete, 2, 5);
        assert_eq!(discrete.fraction_completed(), Fraction::Determinate(0.4));
        advance(&discrete, 5, 5);
        assert_eq!(discrete.fraction_completed(), Fraction::Determinate(1.0));

        let weighted = Progress::weighted(vec![1.0, 1.0]);
        advance(&weighted, 1, 4);
        assert_eq!(weighted.as_weighted().unwrap().stage(0), Some(0.5));
        assert_eq!(weighted.as_weighted().unwrap().stage(1), Some(0.0));
        advance(&weighted, 4, 4);
        assert_eq!(weighted.fraction_completed(), Fraction::Determinate(1.0));
    }

    #[test]
    fn test_advance_handles_largest_total() {
        let discrete = Progress::discrete(u64::MAX);
        advance(&discrete, 1, 2);
        assert_eq!(discrete.as_discrete().unwrap().completed_unit_count(), u64::MAX / 2);
        advance(&discrete, 2, 2);
        assert_eq!(discrete.fraction_completed(), Fraction::Determinate(1.0));
    }

    #[smol_potat::test]
    async fn test_huge_total_script_succeeds() {
        let config = action_config::parser::parse_str(
            r#"
version: "1.0"
controls:
  bulk:
    progress:
      type: discrete
      total_units: 18446744073709551615
    script:
      steps: 2
      step_ms: 1
"#,
        )
        .unwrap();
        let scene = Scene::mount(&config).unwrap();
        let bulk = scene.control("bulk").unwrap();
        let events = bulk.controller.subscribe();

        assert!(bulk.controller.trigger());
        wait_idle(bulk, &events).await;

        assert_eq!(bulk.controller.error_count(), 0);
        assert_eq!(bulk.controller.fraction_completed(), Fraction::Determinate(1.0));
    }

    #[test]
    fn test_mount_registers_every_control() {
        let scene = scene();
        assert_eq!(scene.registry.ids(), vec!["save", "export", "broken"]);
        assert!(scene.control("save").is_some());
        assert!(scene.control("missing").is_none());
        assert!(scene.status_table().to_string().contains("export"));
    }

    #[smol_potat::test]
    async fn test_registry_trigger_runs_script() {
        let scene = scene();
        let export = scene.control("export").unwrap();
        let events = export.controller.subscribe();

        assert!(scene.registry.invoke(&"export".to_string()));
        assert!(export.loading.get());
        wait_idle(export, &events).await;

        assert_eq!(
            export.controller.fraction_completed(),
            Fraction::Determinate(1.0)
        );
        assert_eq!(export.controller.error_count(), 0);
        assert!(!export.loading.get());
    }

    #[smol_potat::test]
    async fn test_failing_script_bumps_error_count() {
        let scene = scene();
        let broken = scene.control("broken").unwrap();
        let events = broken.controller.subscribe();

        broken.controller.trigger();
        wait_idle(broken, &events).await;
        assert_eq!(broken.controller.error_count(), 1);
    }

    #[smol_potat::test]
    async fn test_disabled_control_ignores_registry_trigger() {
        let scene = scene();
        let save = scene.control("save").unwrap();
        save.enabled.set(false);

        // The callback runs but trigger() refuses to start
        assert!(scene.registry.invoke(&"save".to_string()));
        assert!(!save.controller.is_running());
    }
}
