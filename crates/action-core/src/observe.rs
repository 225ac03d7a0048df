//! Observable controller state
//!
//! Presentation layers either poll a [`Snapshot`] or subscribe to the
//! [`ControllerEvent`] stream and re-render on each event.

use async_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::progress::Fraction;

/// Identifier of one run of a controller, unique per controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// State transitions published to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A trigger was accepted and the run is now in flight
    RunStarted {
        /// The new run
        run: RunId,
    },
    /// The action settled successfully
    RunSucceeded {
        /// The finished run
        run: RunId,
    },
    /// The action settled with an error
    RunFailed {
        /// The finished run
        run: RunId,
        /// Error counter after this failure
        error_count: u64,
    },
    /// The run was cancelled and the controller returned to idle
    RunCancelled {
        /// The cancelled run
        run: RunId,
    },
    /// A previously cancelled run settled; its outcome was ignored
    RunDiscarded {
        /// The abandoned run
        run: RunId,
    },
}

impl ControllerEvent {
    /// The run this event refers to
    pub fn run(&self) -> RunId {
        match self {
            ControllerEvent::RunStarted { run }
            | ControllerEvent::RunSucceeded { run }
            | ControllerEvent::RunFailed { run, .. }
            | ControllerEvent::RunCancelled { run }
            | ControllerEvent::RunDiscarded { run } => *run,
        }
    }

    /// Check if this event returned the controller to idle
    pub fn is_idle_transition(&self) -> bool {
        matches!(
            self,
            ControllerEvent::RunSucceeded { .. }
                | ControllerEvent::RunFailed { .. }
                | ControllerEvent::RunCancelled { .. }
        )
    }
}

/// Point-in-time view of a controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Whether a run is in flight
    pub is_running: bool,
    /// The in-flight run, if any
    pub current_run: Option<RunId>,
    /// Progress reported by the controller's reporter
    pub fraction_completed: Fraction,
    /// Failed runs so far
    pub error_count: u64,
    /// Current value of the enablement signal
    pub enabled: bool,
}

/// Fan-out of controller events to any number of subscribers
#[derive(Default)]
pub(crate) struct Subscribers {
    senders: Mutex<Vec<Sender<ControllerEvent>>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self) -> Receiver<ControllerEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, dropping closed ones
    pub(crate) fn emit(&self, event: ControllerEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => false,
            // Unbounded channels never report full
            Err(TrySendError::Full(_)) => true,
        });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let subscribers = Subscribers::default();
        let first = subscribers.subscribe();
        let second = subscribers.subscribe();

        subscribers.emit(ControllerEvent::RunStarted { run: RunId(1) });

        assert_eq!(first.try_recv().unwrap().run(), RunId(1));
        assert_eq!(second.try_recv().unwrap().run(), RunId(1));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let subscribers = Subscribers::default();
        let kept = subscribers.subscribe();
        drop(subscribers.subscribe());
        assert_eq!(subscribers.len(), 2);

        subscribers.emit(ControllerEvent::RunCancelled { run: RunId(3) });

        assert_eq!(subscribers.len(), 1);
        assert!(kept.try_recv().unwrap().is_idle_transition());
    }

    #[test]
    fn test_event_serialization() {
        let event = ControllerEvent::RunFailed {
            run: RunId(2),
            error_count: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "run_failed", "run": 2, "error_count": 1})
        );
        assert_eq!(RunId(2).to_string(), "run-2");
        assert!(!ControllerEvent::RunDiscarded { run: RunId(2) }.is_idle_transition());
    }
}
