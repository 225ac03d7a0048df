//! Single-flight controller for one user-triggered async action
//!
//! Each controller owns at most one in-flight run. A run is started by
//! [`ActionController::trigger`], executes on the configured [`Spawner`],
//! and returns the controller to idle when the action settles or when
//! [`ActionController::cancel`] is called.
//!
//! Per run, the order of side effects is fixed:
//!
//! 1. the loading binding is set
//! 2. `progress.reset()` runs synchronously inside `trigger`
//! 3. `progress.started()` is awaited on the spawned task
//! 4. the action body runs
//! 5. a failure bumps the error counter
//! 6. `progress.ended()` is awaited
//! 7. the run is cleared and the loading binding is unset
//!
//! Cancellation clears the run and the loading binding immediately. The
//! abandoned run keeps executing until the action body notices its token;
//! whatever it settles with is discarded, `ended()` is skipped for it, and
//! the error counter is left alone.
//!
//! The progress reporter is shared by every run. An abandoned run that
//! ignores its token can still write to it, and those writes show up in the
//! next run's [`fraction_completed`](ActionController::fraction_completed)
//! until the abandoned body returns. Action bodies should stop at the first
//! [`CancellationToken::check`] that fails.

use action_runtime::{BoxedTask, Spawner};
use async_channel::Receiver;
use futures::FutureExt;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::cell::BoolCell;
use crate::observe::{ControllerEvent, RunId, Snapshot, Subscribers};
use crate::progress::{Fraction, ProgressReporter};
use crate::registry::{Mount, TriggerFn, TriggerRegistry};
use crate::{Error, Result};

/// Action function signature
///
/// The action receives the controller's progress reporter and the run's
/// cancellation token.
pub type ActionFn<P> = Arc<
    dyn Fn(Arc<P>, CancellationToken) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>
        + Send
        + Sync
        + 'static,
>;

/// The run currently owning the controller
struct ActiveRun {
    id: RunId,
    token: CancellationToken,
}

#[derive(Default)]
struct RunState {
    current: Option<ActiveRun>,
    error_count: u64,
    last_run: u64,
}

impl RunState {
    fn is_current(&self, run: RunId) -> bool {
        self.current.as_ref().is_some_and(|active| active.id == run)
    }
}

struct Shared<P> {
    label: String,
    progress: Arc<P>,
    action: ActionFn<P>,
    spawner: Arc<dyn Spawner>,
    enabled: BoolCell,
    loading: Option<BoolCell>,
    state: Mutex<RunState>,
    subscribers: Subscribers,
}

impl<P> Shared<P> {
    // Never held across an await
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_loading(&self, value: bool) {
        if let Some(loading) = &self.loading {
            loading.set(value);
        }
    }
}

/// Controller for one async action
///
/// Cheap to clone; clones drive the same controller.
pub struct ActionController<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for ActionController<P> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<P: ProgressReporter> ActionController<P> {
    /// Start building a controller around `progress`
    pub fn builder(progress: P) -> ControllerBuilder<P> {
        ControllerBuilder::new(progress)
    }

    /// Start a run unless one is in flight or the control is disabled
    ///
    /// Never blocks and never reports the action's outcome. Returns whether
    /// the trigger was accepted.
    pub fn trigger(&self) -> bool {
        let shared = &self.shared;

        if !shared.enabled.get() {
            debug!("[{}] Trigger ignored: control disabled", shared.label);
            return false;
        }

        let (run, token) = {
            let mut state = shared.state();
            if let Some(active) = &state.current {
                debug!(
                    "[{}] Trigger ignored: {} still in flight",
                    shared.label, active.id
                );
                return false;
            }
            state.last_run += 1;
            let run = RunId(state.last_run);
            let token = CancellationToken::new();
            state.current = Some(ActiveRun {
                id: run,
                token: token.clone(),
            });
            (run, token)
        };

        shared.set_loading(true);
        shared.progress.reset();
        info!("[{}] Starting {}", shared.label, run);
        shared.subscribers.emit(ControllerEvent::RunStarted { run });

        shared.spawner.spawn(Self::run_task(shared.clone(), run, token));
        true
    }

    /// Cancel the in-flight run, returning the controller to idle at once
    ///
    /// Returns `false` if there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let shared = &self.shared;
        let Some(active) = shared.state().current.take() else {
            return false;
        };

        active.token.cancel();
        shared.set_loading(false);
        info!("[{}] Cancelled {}", shared.label, active.id);
        shared
            .subscribers
            .emit(ControllerEvent::RunCancelled { run: active.id });
        true
    }

    fn run_task(shared: Arc<Shared<P>>, run: RunId, token: CancellationToken) -> BoxedTask {
        Box::pin(async move {
            shared.progress.started().await;

            let action = (shared.action)(shared.progress.clone(), token);
            let outcome = match AssertUnwindSafe(action).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::action("action panicked")),
            };

            Self::settle(&shared, run, outcome).await;
        })
    }

    async fn settle(shared: &Shared<P>, run: RunId, outcome: Result<()>) {
        let error_count = {
            let mut state = shared.state();
            if !state.is_current(run) {
                drop(state);
                match &outcome {
                    Ok(()) => debug!("[{}] Discarding outcome of cancelled {}", shared.label, run),
                    Err(e) => debug!(
                        "[{}] Discarding outcome of cancelled {}: {}",
                        shared.label, run, e
                    ),
                }
                shared
                    .subscribers
                    .emit(ControllerEvent::RunDiscarded { run });
                return;
            }
            match &outcome {
                Ok(()) => None,
                Err(_) => {
                    state.error_count += 1;
                    Some(state.error_count)
                }
            }
        };

        if let Err(e) = &outcome {
            warn!("[{}] {} failed: {}", shared.label, run, e);
        }

        shared.progress.ended().await;

        {
            let mut state = shared.state();
            if !state.is_current(run) {
                // cancel() landed while ended() was pending and already
                // cleared the run and the loading binding
                return;
            }
            state.current = None;
        }
        shared.set_loading(false);

        let event = match error_count {
            Some(error_count) => ControllerEvent::RunFailed { run, error_count },
            None => {
                info!("[{}] {} succeeded", shared.label, run);
                ControllerEvent::RunSucceeded { run }
            }
        };
        shared.subscribers.emit(event);
    }

    /// Whether a run is in flight
    pub fn is_running(&self) -> bool {
        self.shared.state().current.is_some()
    }

    /// The in-flight run, if any
    pub fn current_run(&self) -> Option<RunId> {
        self.shared.state().current.as_ref().map(|active| active.id)
    }

    /// Failed runs over the controller's lifetime
    pub fn error_count(&self) -> u64 {
        self.shared.state().error_count
    }

    /// Progress as reported by the controller's reporter
    pub fn fraction_completed(&self) -> Fraction {
        self.shared.progress.fraction_completed()
    }

    /// Current value of the enablement signal
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.get()
    }

    /// The enablement signal this controller consults
    pub fn enabled(&self) -> &BoolCell {
        &self.shared.enabled
    }

    /// The progress reporter shared with the action body
    pub fn progress(&self) -> &Arc<P> {
        &self.shared.progress
    }

    /// Label used in log records
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Point-in-time view of the observable state
    pub fn snapshot(&self) -> Snapshot {
        let (current_run, error_count) = {
            let state = self.shared.state();
            (state.current.as_ref().map(|active| active.id), state.error_count)
        };
        Snapshot {
            is_running: current_run.is_some(),
            current_run,
            fraction_completed: self.fraction_completed(),
            error_count,
            enabled: self.is_enabled(),
        }
    }

    /// Subscribe to state transitions
    ///
    /// The receiver sees every event emitted after this call. Dropping it
    /// unsubscribes.
    pub fn subscribe(&self) -> Receiver<ControllerEvent> {
        self.shared.subscribers.subscribe()
    }

    /// Callback equivalent to [`trigger`](Self::trigger)
    ///
    /// Holds the controller weakly: once every controller handle is gone the
    /// callback does nothing.
    pub fn trigger_fn(&self) -> TriggerFn {
        let weak: Weak<Shared<P>> = Arc::downgrade(&self.shared);
        Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                ActionController { shared }.trigger();
            }
        })
    }

    /// Register this controller's trigger under `id` until the guard drops
    pub fn mount<K>(&self, id: K, registry: &Arc<TriggerRegistry<K>>) -> Mount<K>
    where
        K: Eq + Hash + Clone + Debug,
    {
        Mount::new(registry, id, self.trigger_fn())
    }
}

/// Builder for [`ActionController`]
pub struct ControllerBuilder<P> {
    progress: P,
    label: String,
    enabled: BoolCell,
    loading: Option<BoolCell>,
    spawner: Option<Arc<dyn Spawner>>,
}

impl<P: ProgressReporter> ControllerBuilder<P> {
    /// Create a builder around `progress`
    pub fn new(progress: P) -> Self {
        Self {
            progress,
            label: "action".to_string(),
            enabled: BoolCell::new(true),
            loading: None,
            spawner: None,
        }
    }

    /// Set the label used in log records
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Use an externally owned enablement signal
    pub fn enabled(mut self, enabled: BoolCell) -> Self {
        self.enabled = enabled;
        self
    }

    /// Mirror the running state into an externally owned cell
    pub fn loading_binding(mut self, loading: BoolCell) -> Self {
        self.loading = Some(loading);
        self
    }

    /// Run actions on `spawner`
    pub fn spawner(mut self, spawner: impl Spawner + 'static) -> Self {
        self.spawner = Some(Arc::new(spawner));
        self
    }

    /// Run actions on an already shared spawner
    pub fn shared_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Build the controller around `action`
    ///
    /// Without an explicit spawner the current runtime is detected, which
    /// requires one of this crate's runtime features.
    pub fn build<F, Fut>(self, action: F) -> Result<ActionController<P>>
    where
        F: Fn(Arc<P>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let spawner = match self.spawner {
            Some(spawner) => spawner,
            None => action_runtime::current_runtime_spawner().ok_or(Error::NoRuntime)?,
        };

        // Wrap the function to match our signature
        let action: ActionFn<P> = Arc::new(move |progress, token| {
            Box::pin(action(progress, token))
                as Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>
        });

        if let Some(loading) = &self.loading {
            loading.set(false);
        }

        Ok(ActionController {
            shared: Arc::new(Shared {
                label: self.label,
                progress: Arc::new(self.progress),
                action,
                spawner,
                enabled: self.enabled,
                loading: self.loading,
                state: Mutex::new(RunState::default()),
                subscribers: Subscribers::default(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::IndeterminateProgress;
    use action_runtime::smol::SmolSpawner;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn next_idle(events: &Receiver<ControllerEvent>) -> ControllerEvent {
        loop {
            let event = events.recv().await.unwrap();
            if event.is_idle_transition() {
                return event;
            }
        }
    }

    #[smol_potat::test]
    async fn test_trigger_runs_action_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let controller = ActionController::builder(IndeterminateProgress)
            .label("save")
            .spawner(SmolSpawner)
            .build(move |_, _| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();
        let events = controller.subscribe();

        assert!(controller.trigger());
        assert_eq!(
            events.recv().await.unwrap(),
            ControllerEvent::RunStarted { run: RunId(1) }
        );
        assert_eq!(
            next_idle(&events).await,
            ControllerEvent::RunSucceeded { run: RunId(1) }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!controller.is_running());
        assert_eq!(controller.label(), "save");
    }

    #[smol_potat::test]
    async fn test_disabled_control_ignores_trigger() {
        let enabled = BoolCell::new(false);
        let controller = ActionController::builder(IndeterminateProgress)
            .enabled(enabled.clone())
            .spawner(SmolSpawner)
            .build(|_, _| async { Ok(()) })
            .unwrap();

        assert!(!controller.trigger());
        assert!(!controller.is_running());
        assert!(!controller.snapshot().enabled);

        enabled.set(true);
        let events = controller.subscribe();
        assert!(controller.trigger());
        next_idle(&events).await;
    }

    #[smol_potat::test]
    async fn test_panicking_action_counts_as_failure() {
        let controller = ActionController::builder(IndeterminateProgress)
            .spawner(SmolSpawner)
            .build(|_, _| async {
                if true {
                    panic!("boom");
                }
                Ok(())
            })
            .unwrap();
        let events = controller.subscribe();

        controller.trigger();
        assert_eq!(
            next_idle(&events).await,
            ControllerEvent::RunFailed {
                run: RunId(1),
                error_count: 1
            }
        );
        assert!(!controller.is_running());
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let controller = ActionController::builder(IndeterminateProgress)
            .spawner(SmolSpawner)
            .build(|_, _| async { Ok(()) })
            .unwrap();
        let events = controller.subscribe();

        assert!(!controller.cancel());
        assert!(events.try_recv().is_err());
        assert_eq!(controller.current_run(), None);
    }

    #[test]
    fn test_trigger_fn_is_weak() {
        let controller = ActionController::builder(IndeterminateProgress)
            .spawner(SmolSpawner)
            .build(|_, _| async { Ok(()) })
            .unwrap();
        let trigger = controller.trigger_fn();
        drop(controller);

        // Controller is gone; nothing to run and nothing to panic on
        trigger();
    }
}
