//! Deduplicating evaluation around an expensive simulator.
//!
//! [`DeduplicatingEvaluator`] sits between the search engine and the
//! [`Simulator`]. Every proposal is fingerprinted; the first request for a
//! fingerprint runs the simulator and caches the result, every later request
//! (including concurrent ones) returns the cached objective without
//! simulating again.
//!
//! Per-evaluation failures never surface as errors. A simulator error or
//! panic, an unusable KPI payload or a constraint violation yields the
//! sentinel vector and a record with `success: false`, so the search loop
//! keeps running.
//!
//! # Examples
//!
//! ```
//! use retrofit_optimizer::prelude::*;
//!
//! let sim = |_: &Configuration| -> Result<RawKpis, SimulationError> {
//!     Err(SimulationError::Failed { reason: "weather file missing".into() })
//! };
//! let evaluator = DeduplicatingEvaluator::builder(
//!     sim,
//!     ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective),
//! )
//! .build();
//!
//! let cfg = Configuration::new().with("upgrade_wall_insulation", "R-20");
//! let outcome = evaluator.evaluate(&cfg);
//! assert!(outcome.objective.is_sentinel());
//! assert!(!outcome.record.success);
//! assert_eq!(evaluator.stats().failed, 1);
//! ```

use core::any::Any;
use core::fmt;
use core::panic::AssertUnwindSafe;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::constraints::Constraint;
use crate::fingerprint::Fingerprint;
use crate::log::{self, EvaluationLog};
use crate::normalize::{ObjectiveBreakdown, ObjectiveNormalizer, ObjectiveVector, RawKpis};

/// Error text recorded for proposals rejected by the constraint.
pub const CONSTRAINT_VIOLATION: &str = "configuration violates constraints";

/// Why a simulation produced no usable KPIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// A known, recoverable failure reported by the adapter.
    #[error("simulation failed: {reason}")]
    Failed {
        /// Adapter-supplied description.
        reason: String,
    },
    /// Anything the adapter did not anticipate.
    #[error("unexpected simulator error: {0}")]
    Unexpected(String),
}

/// The external building simulator.
///
/// Implemented for any `Fn(&Configuration) -> Result<RawKpis, SimulationError>`
/// closure that is `Send + Sync`.
pub trait Simulator: Send + Sync {
    /// Runs one simulation for `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`SimulationError`] when no KPIs could be produced.
    fn simulate(&self, config: &Configuration) -> Result<RawKpis, SimulationError>;
}

impl<F> Simulator for F
where
    F: Fn(&Configuration) -> Result<RawKpis, SimulationError> + Send + Sync,
{
    fn simulate(&self, config: &Configuration) -> Result<RawKpis, SimulationError> {
        self(config)
    }
}

/// Whether an outcome came from a fresh simulation or the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Evaluated,
    Duplicate,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evaluated => f.write_str("evaluated"),
            Self::Duplicate => f.write_str("duplicate"),
        }
    }
}

/// One line of the evaluation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub timestamp: DateTime<Utc>,
    /// Label of the run that produced this record.
    pub run_id: String,
    /// Unique id of this evaluation, see [`log::evaluation_id`].
    pub evaluation_id: String,
    pub config: Configuration,
    pub fingerprint: Fingerprint,
    pub success: bool,
    /// Present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<ObjectiveBreakdown>,
    /// Present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A real (non-duplicate) evaluation as kept in the cache and history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub objective: ObjectiveVector,
    pub record: EvaluationRecord,
}

/// What [`DeduplicatingEvaluator::evaluate`] hands back to the search engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationOutcome {
    /// Normalized objectives, or the sentinel on failure.
    pub objective: ObjectiveVector,
    /// The record of the evaluation that produced `objective`. For a
    /// duplicate this is the original record.
    pub record: EvaluationRecord,
    pub status: CacheStatus,
}

/// Running totals of an evaluator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorStats {
    /// Distinct configurations evaluated, failures included.
    pub evaluated: usize,
    /// Requests served from the cache.
    pub duplicates: usize,
    /// Evaluations that produced the sentinel.
    pub failed: usize,
}

type Slot = Arc<Mutex<Option<Evaluation>>>;

/// Fingerprint-keyed cache in front of a [`Simulator`].
///
/// Safe to share across threads (wrap it in an [`Arc`]). At most one
/// simulator call ever runs per fingerprint: the per-fingerprint slot stays
/// locked for the whole simulation, so a concurrent request for the same
/// configuration blocks and then reads the finished result.
pub struct DeduplicatingEvaluator<S> {
    simulator: S,
    normalizer: ObjectiveNormalizer,
    constraints: Option<Box<dyn Constraint>>,
    log: Option<EvaluationLog>,
    run_label: String,
    cache: Mutex<HashMap<Fingerprint, Slot>>,
    history: RwLock<Vec<Evaluation>>,
    evaluated: AtomicUsize,
    duplicates: AtomicUsize,
    failed: AtomicUsize,
}

impl<S: Simulator> DeduplicatingEvaluator<S> {
    /// Creates a builder with the required simulator and normalizer.
    #[must_use]
    pub fn builder(
        simulator: S,
        normalizer: ObjectiveNormalizer,
    ) -> DeduplicatingEvaluatorBuilder<S> {
        DeduplicatingEvaluatorBuilder {
            simulator,
            normalizer,
            constraints: None,
            log: None,
            run_label: None,
        }
    }

    /// Evaluates `config`, simulating only if its fingerprint is new.
    #[must_use]
    pub fn evaluate(&self, config: &Configuration) -> EvaluationOutcome {
        let fingerprint = config.fingerprint();

        let slot = {
            let mut cache = self.cache.lock();
            Arc::clone(cache.entry(fingerprint).or_default())
        };
        let mut entry = slot.lock();

        if let Some(done) = entry.as_ref() {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            trace_debug!(fingerprint = ?fingerprint, "duplicate configuration served from cache");
            return EvaluationOutcome {
                objective: done.objective.clone(),
                record: done.record.clone(),
                status: CacheStatus::Duplicate,
            };
        }

        let evaluation = self.run(config, fingerprint);
        *entry = Some(evaluation.clone());
        drop(entry);

        self.evaluated.fetch_add(1, Ordering::Relaxed);
        if evaluation.record.success {
            trace_info!(
                evaluation_id = %evaluation.record.evaluation_id,
                fingerprint = ?fingerprint,
                objective = ?evaluation.objective.as_slice(),
                "evaluation complete"
            );
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            trace_warn!(
                evaluation_id = %evaluation.record.evaluation_id,
                error = evaluation.record.error.as_deref().unwrap_or_default(),
                "evaluation failed"
            );
        }

        if let Some(log) = &self.log {
            // Best-effort; the result stays cached regardless.
            if let Err(_e) = log.append(&evaluation.record) {
                trace_debug!(error = %_e, "failed to write evaluation log");
            }
        }

        self.history.write().push(evaluation.clone());

        EvaluationOutcome {
            objective: evaluation.objective,
            record: evaluation.record,
            status: CacheStatus::Evaluated,
        }
    }

    fn run(&self, config: &Configuration, fingerprint: Fingerprint) -> Evaluation {
        let violates = self
            .constraints
            .as_ref()
            .is_some_and(|c| !c.is_valid(config));

        let result = if violates {
            Err(CONSTRAINT_VIOLATION.to_string())
        } else {
            simulate_contained(&self.simulator, config)
                .map_err(|e| e.to_string())
                .and_then(|kpis| self.normalizer.normalize(&kpis).map_err(|e| e.to_string()))
        };

        let (objective, objectives, error) = match result {
            Ok((objective, breakdown)) => (objective, Some(breakdown), None),
            Err(e) => (self.normalizer.sentinel(), None, Some(e)),
        };

        Evaluation {
            objective,
            record: EvaluationRecord {
                timestamp: Utc::now(),
                run_id: self.run_label.clone(),
                evaluation_id: log::evaluation_id(),
                config: config.clone(),
                fingerprint,
                success: error.is_none(),
                objectives,
                error,
            },
        }
    }
}

/// Runs the simulator, turning a panic into [`SimulationError::Unexpected`]
/// so it is recorded and cached like any other failure.
fn simulate_contained<S: Simulator>(
    simulator: &S,
    config: &Configuration,
) -> Result<RawKpis, SimulationError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| simulator.simulate(config)))
        .unwrap_or_else(|payload| {
            Err(SimulationError::Unexpected(format!(
                "simulator panicked: {}",
                panic_message(payload.as_ref())
            )))
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<S> DeduplicatingEvaluator<S> {
    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> EvaluatorStats {
        EvaluatorStats {
            evaluated: self.evaluated.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Real evaluations in completion order.
    #[must_use]
    pub fn history(&self) -> Vec<Evaluation> {
        self.history.read().clone()
    }

    /// Objective vectors of [`history`](Self::history), sentinels included.
    #[must_use]
    pub fn objectives(&self) -> Vec<ObjectiveVector> {
        self.history.read().iter().map(|e| e.objective.clone()).collect()
    }

    /// Cached result for `fingerprint`, if one has completed.
    #[must_use]
    pub fn cached(&self, fingerprint: &Fingerprint) -> Option<Evaluation> {
        let slot = self.cache.lock().get(fingerprint).cloned()?;
        let entry = slot.lock();
        entry.clone()
    }

    /// Number of fingerprints in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn n_objectives(&self) -> usize {
        self.normalizer.n_objectives()
    }

    #[must_use]
    pub fn run_label(&self) -> &str {
        &self.run_label
    }
}

impl<S> fmt::Debug for DeduplicatingEvaluator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeduplicatingEvaluator")
            .field("run_label", &self.run_label)
            .field("variant", &self.normalizer.variant())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Builder for [`DeduplicatingEvaluator`].
pub struct DeduplicatingEvaluatorBuilder<S> {
    simulator: S,
    normalizer: ObjectiveNormalizer,
    constraints: Option<Box<dyn Constraint>>,
    log: Option<EvaluationLog>,
    run_label: Option<String>,
}

impl<S: Simulator> DeduplicatingEvaluatorBuilder<S> {
    /// Sets the run label written into every record. Defaults to
    /// [`log::run_label("run")`](log::run_label).
    #[must_use]
    pub fn run_label(mut self, label: impl Into<String>) -> Self {
        self.run_label = Some(label.into());
        self
    }

    /// Appends every real evaluation to `log`.
    #[must_use]
    pub fn log(mut self, log: EvaluationLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Penalizes proposals that violate `constraints` with the sentinel
    /// instead of simulating them.
    #[must_use]
    pub fn constraints(mut self, constraints: impl Constraint + 'static) -> Self {
        self.constraints = Some(Box::new(constraints));
        self
    }

    /// Builds the configured [`DeduplicatingEvaluator`].
    #[must_use]
    pub fn build(self) -> DeduplicatingEvaluator<S> {
        DeduplicatingEvaluator {
            simulator: self.simulator,
            normalizer: self.normalizer,
            constraints: self.constraints,
            log: self.log,
            run_label: self.run_label.unwrap_or_else(|| log::run_label("run")),
            cache: Mutex::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            evaluated: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::RetrofitConstraints;
    use crate::normalize::ProblemVariant;

    fn kpis() -> RawKpis {
        RawKpis::new()
            .with(RawKpis::OPERATIONAL_CARBON_KG, 2_000_000.0)
            .with(RawKpis::EMBODIED_CARBON_KG, 100_000.0)
            .with(RawKpis::BERDO_FINE_USD, 10_000.0)
    }

    fn three() -> ObjectiveNormalizer {
        ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective)
    }

    #[test]
    fn duplicate_returns_cached_record() {
        let calls = AtomicUsize::new(0);
        let sim = |_: &Configuration| -> Result<RawKpis, SimulationError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(kpis())
        };
        let evaluator = DeduplicatingEvaluator::builder(sim, three()).run_label("t").build();
        let cfg = Configuration::new().with("a", "1");

        let first = evaluator.evaluate(&cfg);
        let second = evaluator.evaluate(&cfg);

        assert_eq!(first.status, CacheStatus::Evaluated);
        assert_eq!(second.status, CacheStatus::Duplicate);
        assert_eq!(first.record, second.record);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.len(), 1);
        assert_eq!(evaluator.history().len(), 1);
        assert_eq!(evaluator.run_label(), "t");
        assert_eq!(first.record.run_id, "t");
    }

    #[test]
    fn bad_payload_becomes_sentinel() {
        let sim = |_: &Configuration| -> Result<RawKpis, SimulationError> { Ok(RawKpis::new()) };
        let evaluator = DeduplicatingEvaluator::builder(sim, three()).build();
        let outcome = evaluator.evaluate(&Configuration::new().with("a", "1"));

        assert!(outcome.objective.is_sentinel());
        assert_eq!(outcome.objective.len(), 3);
        assert!(outcome.record.error.unwrap().contains("missing KPI"));
        assert_eq!(evaluator.stats().failed, 1);
    }

    #[test]
    fn panic_payloads_are_described() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("index out of range"));
        assert_eq!(panic_message(owned.as_ref()), "index out of range");
        let literal: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(literal.as_ref()), "boom");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn violating_proposal_is_not_simulated() {
        let calls = AtomicUsize::new(0);
        let sim = |_: &Configuration| -> Result<RawKpis, SimulationError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(kpis())
        };
        let evaluator = DeduplicatingEvaluator::builder(sim, three())
            .constraints(RetrofitConstraints::default())
            .build();
        let unpaired = Configuration::new()
            .with("upgrade_window_u_value", "0.22")
            .with("upgrade_window_shgc", "None");

        let outcome = evaluator.evaluate(&unpaired);
        assert!(outcome.objective.is_sentinel());
        assert_eq!(outcome.record.error.as_deref(), Some(CONSTRAINT_VIOLATION));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(evaluator.stats().evaluated, 1);
    }

    #[test]
    fn cached_lookup() {
        let sim = |_: &Configuration| -> Result<RawKpis, SimulationError> { Ok(kpis()) };
        let evaluator = DeduplicatingEvaluator::builder(sim, three()).build();
        let cfg = Configuration::new().with("a", "1");
        assert!(evaluator.cached(&cfg.fingerprint()).is_none());
        let _ = evaluator.evaluate(&cfg);
        let hit = evaluator.cached(&cfg.fingerprint()).unwrap();
        assert!(hit.record.success);
    }
}
