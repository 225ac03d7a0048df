//! Runtime-agnostic spawning for action controllers
//!
//! Controllers never start runtimes of their own. They hand each run to a
//! [`Spawner`] supplied by the integrator, so the same controller works
//! under smol, tokio, or a UI toolkit's own executor.
//!
//! # Examples
//!
//! ```no_run
//! use action_runtime::prelude::*;
//!
//! fn fire<S: Spawner>(spawner: &S) {
//!     spawner.spawn(Box::pin(async {
//!         println!("run finished");
//!     }));
//! }
//!
//! # #[cfg(feature = "smol")]
//! smol::block_on(async {
//!     fire(&SmolSpawner);
//! });
//! ```

#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable unit of work handed to a [`Spawner`]
pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A spawner that can run futures in the background on an async runtime
pub trait Spawner: Send + Sync {
    /// Spawn a future on the runtime
    ///
    /// The future runs to completion in the background. The caller does not
    /// get a handle back and is never blocked.
    fn spawn(&self, future: BoxedTask);
}

impl<S: Spawner + ?Sized> Spawner for Arc<S> {
    fn spawn(&self, future: BoxedTask) {
        (**self).spawn(future);
    }
}

impl<S: Spawner + ?Sized> Spawner for Box<S> {
    fn spawn(&self, future: BoxedTask) {
        (**self).spawn(future);
    }
}

#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(feature = "smol")]
pub mod smol;

#[cfg(any(feature = "smol", feature = "tokio"))]
pub mod time;

/// Prelude for common imports
pub mod prelude {
    pub use crate::{BoxedTask, Spawner};

    #[cfg(any(feature = "smol", feature = "tokio"))]
    pub use crate::time::sleep;

    #[cfg(feature = "tokio")]
    pub use crate::tokio::TokioSpawner;

    #[cfg(feature = "smol")]
    pub use crate::smol::SmolSpawner;
}

/// Pick a spawner for the runtime the caller is currently inside
///
/// Tokio is detected through its thread-local handle. Smol has no reliable
/// detection, so when only the `smol` feature is enabled the smol global
/// executor is returned unconditionally.
pub fn current_runtime_spawner() -> Option<Arc<dyn Spawner>> {
    #[allow(unused_mut)]
    let mut spawner: Option<Arc<dyn Spawner>> = None;

    #[cfg(feature = "tokio")]
    if ::tokio::runtime::Handle::try_current().is_ok() {
        spawner = Some(Arc::new(tokio::TokioSpawner));
    }

    #[cfg(feature = "smol")]
    if spawner.is_none() {
        spawner = Some(Arc::new(smol::SmolSpawner));
    }

    spawner
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records tasks instead of running them
    #[derive(Default)]
    struct Collecting {
        tasks: Mutex<Vec<BoxedTask>>,
    }

    impl Spawner for Collecting {
        fn spawn(&self, future: BoxedTask) {
            self.tasks.lock().unwrap().push(future);
        }
    }

    #[test]
    fn test_arc_spawner_forwards() {
        let inner = Arc::new(Collecting::default());
        let shared: Arc<dyn Spawner> = inner.clone();

        shared.spawn(Box::pin(async {}));
        shared.spawn(Box::pin(async {}));

        assert_eq!(inner.tasks.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_collected_task_runs_when_polled() {
        let spawner = Collecting::default();
        let flag = Arc::new(Mutex::new(false));
        let flag_clone = flag.clone();

        spawner.spawn(Box::pin(async move {
            *flag_clone.lock().unwrap() = true;
        }));

        let task = spawner.tasks.lock().unwrap().pop().unwrap();
        futures::executor::block_on(task);
        assert!(*flag.lock().unwrap());
    }
}
