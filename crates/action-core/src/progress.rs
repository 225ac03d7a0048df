//! Progress reporters
//!
//! A reporter normalizes whatever progress an action tracks into a single
//! [`Fraction`] plus three lifecycle hooks the controller calls around every
//! run. The controller only ever holds the reporter behind an `Arc`; the
//! action body receives a clone of that `Arc` and mutates the reporter
//! through interior mutability while it runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Normalized progress signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Fraction {
    /// No measurable fraction is available
    Indeterminate,
    /// Completed fraction, nominally in `[0, 1]` but not clamped
    Determinate(f64),
}

impl Fraction {
    /// The raw fraction, if one is known
    pub fn value(&self) -> Option<f64> {
        match self {
            Fraction::Indeterminate => None,
            Fraction::Determinate(value) => Some(*value),
        }
    }

    /// The fraction clamped to `[0, 1]` for display
    pub fn clamped(&self) -> Option<f64> {
        self.value().map(|value| value.clamp(0.0, 1.0))
    }

    /// Check if the fraction is unknown
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Fraction::Indeterminate)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fraction::Indeterminate => write!(f, "indeterminate"),
            Fraction::Determinate(value) => write!(f, "{:.1}%", value * 100.0),
        }
    }
}

/// Capability set every progress model provides to the controller
///
/// `reset` runs synchronously inside `trigger()`, before the run is
/// scheduled. `started` and `ended` run on the spawned task and may suspend,
/// for instance to announce the run to an assistive layer.
#[async_trait]
pub trait ProgressReporter: Send + Sync + 'static {
    /// Re-zero internal counters before a run
    fn reset(&self);

    /// Called once the run begins, before the action body
    async fn started(&self) {}

    /// Called after the action settles, whatever the outcome
    async fn ended(&self) {}

    /// Current progress
    fn fraction_completed(&self) -> Fraction;
}

/// Reporter with no measurable fraction
#[derive(Debug, Clone, Copy, Default)]
pub struct IndeterminateProgress;

#[async_trait]
impl ProgressReporter for IndeterminateProgress {
    fn reset(&self) {}

    fn fraction_completed(&self) -> Fraction {
        Fraction::Indeterminate
    }
}

/// Reporter tracking completed units out of a fixed total
///
/// The action body advances the count with [`increment`](Self::increment)
/// or [`add`](Self::add). Counts past the total are accepted and reported
/// as fractions above one.
#[derive(Debug)]
pub struct DiscreteProgress {
    total: u64,
    completed: AtomicU64,
}

impl DiscreteProgress {
    /// Create a reporter for `total_unit_count` units
    pub fn new(total_unit_count: u64) -> Self {
        Self {
            total: total_unit_count,
            completed: AtomicU64::new(0),
        }
    }

    /// Total units, fixed at construction
    pub fn total_unit_count(&self) -> u64 {
        self.total
    }

    /// Units completed so far in the current run
    pub fn completed_unit_count(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Mark one more unit complete, returning the new count
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    /// Mark `units` more units complete, returning the new count
    ///
    /// Saturates at `u64::MAX`.
    pub fn add(&self, units: u64) -> u64 {
        let previous = self
            .completed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_add(units))
            })
            .unwrap_or_else(|count| count);
        previous.saturating_add(units)
    }

    /// Overwrite the completed count
    pub fn set_completed(&self, units: u64) {
        self.completed.store(units, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressReporter for DiscreteProgress {
    fn reset(&self) {
        self.completed.store(0, Ordering::SeqCst);
    }

    fn fraction_completed(&self) -> Fraction {
        if self.total == 0 {
            return Fraction::Indeterminate;
        }
        Fraction::Determinate(self.completed_unit_count() as f64 / self.total as f64)
    }
}

/// Multi-stage reporter where each stage contributes a share of the whole
///
/// Stage fractions are clamped to `[0, 1]`; the overall fraction is the
/// weight-averaged sum. Stages with non-finite or non-positive weights
/// contribute nothing. With no usable weight at all the reporter is
/// indeterminate.
#[derive(Debug)]
pub struct WeightedProgress {
    weights: Vec<f64>,
    stages: Mutex<Vec<f64>>,
}

impl WeightedProgress {
    /// Create a reporter with one stage per weight
    pub fn new(weights: impl Into<Vec<f64>>) -> Self {
        let weights: Vec<f64> = weights
            .into()
            .into_iter()
            .map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect();
        let stages = Mutex::new(vec![0.0; weights.len()]);
        Self { weights, stages }
    }

    /// Number of stages
    pub fn stage_count(&self) -> usize {
        self.weights.len()
    }

    /// Set the completed fraction of one stage
    ///
    /// Returns `false` if `stage` is out of range.
    pub fn set_stage(&self, stage: usize, fraction: f64) -> bool {
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        match stages.get_mut(stage) {
            Some(slot) => {
                *slot = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
                true
            }
            None => {
                warn!("Ignoring progress for unknown stage {} of {}", stage, self.weights.len());
                false
            }
        }
    }

    /// Mark one stage fully complete
    pub fn complete_stage(&self, stage: usize) -> bool {
        self.set_stage(stage, 1.0)
    }

    /// Completed fraction of one stage
    pub fn stage(&self, stage: usize) -> Option<f64> {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stage)
            .copied()
    }
}

#[async_trait]
impl ProgressReporter for WeightedProgress {
    fn reset(&self) {
        let mut stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        stages.iter_mut().for_each(|stage| *stage = 0.0);
    }

    fn fraction_completed(&self) -> Fraction {
        let total: f64 = self.weights.iter().sum();
        if total <= 0.0 {
            return Fraction::Indeterminate;
        }
        let stages = self.stages.lock().unwrap_or_else(PoisonError::into_inner);
        let done: f64 = self
            .weights
            .iter()
            .zip(stages.iter())
            .map(|(weight, fraction)| weight * fraction)
            .sum();
        Fraction::Determinate(done / total)
    }
}

/// Built-in reporter shapes, chosen at runtime
///
/// Used when the shape comes from configuration rather than from code.
#[derive(Debug)]
pub enum Progress {
    /// See [`IndeterminateProgress`]
    Indeterminate(IndeterminateProgress),
    /// See [`DiscreteProgress`]
    Discrete(DiscreteProgress),
    /// See [`WeightedProgress`]
    Weighted(WeightedProgress),
}

impl Progress {
    /// Indeterminate reporter
    pub fn indeterminate() -> Self {
        Progress::Indeterminate(IndeterminateProgress)
    }

    /// Discrete reporter over `total_unit_count` units
    pub fn discrete(total_unit_count: u64) -> Self {
        Progress::Discrete(DiscreteProgress::new(total_unit_count))
    }

    /// Weighted multi-stage reporter
    pub fn weighted(weights: impl Into<Vec<f64>>) -> Self {
        Progress::Weighted(WeightedProgress::new(weights))
    }

    /// Access the discrete reporter, if that is the shape
    pub fn as_discrete(&self) -> Option<&DiscreteProgress> {
        match self {
            Progress::Discrete(progress) => Some(progress),
            _ => None,
        }
    }

    /// Access the weighted reporter, if that is the shape
    pub fn as_weighted(&self) -> Option<&WeightedProgress> {
        match self {
            Progress::Weighted(progress) => Some(progress),
            _ => None,
        }
    }
}

#[async_trait]
impl ProgressReporter for Progress {
    fn reset(&self) {
        match self {
            Progress::Indeterminate(progress) => progress.reset(),
            Progress::Discrete(progress) => progress.reset(),
            Progress::Weighted(progress) => progress.reset(),
        }
    }

    async fn started(&self) {
        match self {
            Progress::Indeterminate(progress) => progress.started().await,
            Progress::Discrete(progress) => progress.started().await,
            Progress::Weighted(progress) => progress.started().await,
        }
    }

    async fn ended(&self) {
        match self {
            Progress::Indeterminate(progress) => progress.ended().await,
            Progress::Discrete(progress) => progress.ended().await,
            Progress::Weighted(progress) => progress.ended().await,
        }
    }

    fn fraction_completed(&self) -> Fraction {
        match self {
            Progress::Indeterminate(progress) => progress.fraction_completed(),
            Progress::Discrete(progress) => progress.fraction_completed(),
            Progress::Weighted(progress) => progress.fraction_completed(),
        }
    }
}
