//! Core types shared across modules.

use serde::{Deserialize, Serialize};

/// The direction of optimization for one objective.
///
/// Normalized objective vectors are already negated so that smaller is
/// better, which makes [`Direction::Minimize`] the usual choice when
/// building a [`ParetoSummary`](crate::summary::ParetoSummary).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    Maximize,
}
