//! Shared boolean cells for enablement and loading state

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An externally owned boolean the controller reads or writes
///
/// Clones share the same value. The integrator keeps one clone and hands the
/// other to the controller, either as the enablement signal (read by
/// `trigger`) or as the loading binding (written around every run).
#[derive(Clone, Default)]
pub struct BoolCell {
    value: Arc<AtomicBool>,
}

impl BoolCell {
    /// Create a cell holding `value`
    pub fn new(value: bool) -> Self {
        Self {
            value: Arc::new(AtomicBool::new(value)),
        }
    }

    /// Read the current value
    pub fn get(&self) -> bool {
        self.value.load(Ordering::SeqCst)
    }

    /// Overwrite the current value
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::SeqCst);
    }
}

impl fmt::Debug for BoolCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoolCell").field(&self.get()).finish()
    }
}

impl From<bool> for BoolCell {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}
