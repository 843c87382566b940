//! Degradation events recorded when a stage recovers from a failure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What kind of degradation occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationKind {
    /// The configured allocation method failed numerically and the default
    /// method was used instead.
    OptimizationDegraded,
    /// Constraint projection could not satisfy the stated bounds; the
    /// result is best-effort.
    ConstraintInfeasible,
}

/// A recorded, non-fatal pipeline degradation.
///
/// Degradations are carried on the backtest result so a run that silently
/// changed behavior is distinguishable from one that did not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub date: NaiveDate,
    pub kind: DegradationKind,
    pub detail: String,
}

impl Degradation {
    /// Create a degradation event.
    pub fn new(date: NaiveDate, kind: DegradationKind, detail: impl Into<String>) -> Self {
        Self {
            date,
            kind,
            detail: detail.into(),
        }
    }
}
