//! Async action controller core
//!
//! This crate implements the state machine behind a button that runs one
//! asynchronous action at a time: single-flight triggering, progress
//! reporting, an error counter for transient failure feedback, cooperative
//! cancellation, and a registry for triggering controls by id.
//!
//! It does no rendering. Presentation layers observe
//! [`ActionController::snapshot`] or [`ActionController::subscribe`] and
//! call [`ActionController::trigger`] and [`ActionController::cancel`].
//!
//! ```no_run
//! use action_core::prelude::*;
//! use action_runtime::smol::SmolSpawner;
//! use std::sync::Arc;
//!
//! # fn main() -> action_core::Result<()> {
//! let registry = Arc::new(TriggerRegistry::new());
//! let download = ActionController::builder(DiscreteProgress::new(3))
//!     .label("download")
//!     .spawner(SmolSpawner)
//!     .build(|progress, token| async move {
//!         for _ in 0..3 {
//!             token.check()?;
//!             progress.increment();
//!         }
//!         Ok::<(), Error>(())
//!     })?;
//!
//! let _mount = download.mount("download".to_string(), &registry);
//! registry.invoke(&"download".to_string());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cancel;
pub mod cell;
pub mod controller;
pub mod error;
pub mod observe;
pub mod progress;
pub mod registry;

pub use error::{Error, Result};

/// Convenience prelude for action-core users
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::cell::BoolCell;
    pub use crate::controller::{ActionController, ControllerBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::observe::{ControllerEvent, RunId, Snapshot};
    pub use crate::progress::{
        DiscreteProgress, Fraction, IndeterminateProgress, Progress, ProgressReporter,
        WeightedProgress,
    };
    pub use crate::registry::{Mount, TriggerRegistry};

    // Re-export commonly used types from dependencies
    pub use async_trait::async_trait;
}
