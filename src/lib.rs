#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Bookkeeping and transformation layer for multi-objective building-retrofit
//! search. Each candidate retrofit package (a [`Configuration`] of energy
//! conservation measures) is scored by an expensive external building
//! simulator; this crate keeps that loop tractable and reproducible by
//! seeding it with a constraint-filtered Sobol design, never simulating the
//! same package twice, scalarizing raw KPIs into a fixed-length minimization
//! vector, and summarizing the resulting Pareto front.
//!
//! # Getting Started
//!
//! ```
//! use retrofit_optimizer::prelude::*;
//!
//! // Seed the search with valid, well-spread packages.
//! let space = SearchSpace::multifamily_retrofit();
//! let seeder = QuasiRandomSeeder::builder().seed(42).build();
//! let batch = seeder
//!     .generate(64, &space, &RetrofitConstraints::default())
//!     .unwrap();
//! assert!(batch.accepted() > 0);
//!
//! // Wrap the simulator so every distinct package runs at most once.
//! let simulator = |_: &Configuration| -> Result<RawKpis, SimulationError> {
//!     Ok(RawKpis::new()
//!         .with(RawKpis::OPERATIONAL_CARBON_KG, 3_000_000.0)
//!         .with(RawKpis::EMBODIED_CARBON_KG, 200_000.0)
//!         .with(RawKpis::BERDO_FINE_USD, 50_000.0)
//!         .with(RawKpis::MATERIAL_COST_USD, 400_000.0)
//!         .with(RawKpis::UTILITY_COST_USD, 2_000_000.0))
//! };
//! let normalizer = ObjectiveNormalizer::canonical(ProblemVariant::FourObjective);
//! let evaluator = DeduplicatingEvaluator::builder(simulator, normalizer).build();
//!
//! let first = &batch.configs()[0];
//! let a = evaluator.evaluate(first);
//! let b = evaluator.evaluate(first);
//! assert_eq!(a.objective, b.objective);
//! assert_eq!(evaluator.stats().evaluated, 1);
//! assert_eq!(evaluator.stats().duplicates, 1);
//!
//! // Report front diversity once the run is over.
//! let summary = ParetoSummary::minimize(4)
//!     .summarize(&evaluator.objectives())
//!     .unwrap();
//! assert_eq!(summary.members.len(), 1);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Configuration`] | One retrofit package: measure name → selected option. |
//! | [`Fingerprint`] | Order-independent SHA-256 digest of a configuration, used as the cache key. |
//! | [`Constraint`](constraints::Constraint) | Pure compatibility predicate over configurations. |
//! | [`SearchSpace`](space::SearchSpace) | Declared domain of every measure; decodes unit vectors into configurations. |
//! | [`QuasiRandomSeeder`](seeder::QuasiRandomSeeder) | Sobol initial design, filtered without reordering. |
//! | [`ObjectiveNormalizer`](normalize::ObjectiveNormalizer) | Raw KPIs → negated, bounded objective vector. |
//! | [`DeduplicatingEvaluator`](evaluator::DeduplicatingEvaluator) | Fingerprint-keyed cache around the simulator. |
//! | [`ParetoSummary`](summary::ParetoSummary) | Non-domination and crowding-distance statistics. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `async` | [`evaluate_parallel`](parallel::evaluate_parallel) worker pool via tokio | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at seeding and evaluation points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod configuration;
pub mod constraints;
mod error;
pub mod evaluator;
pub mod fingerprint;
pub mod log;
pub mod normalize;
#[cfg(feature = "async")]
pub mod parallel;
pub mod pareto;
pub mod seeder;
pub mod space;
pub mod summary;
mod types;

pub use configuration::Configuration;
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, fingerprint};
pub use types::Direction;

/// Convenient wildcard import for the most common types.
///
/// ```
/// use retrofit_optimizer::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::constraints::{Constraint, RetrofitConstraints, Violation};
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{
        CacheStatus, DeduplicatingEvaluator, EvaluationOutcome, EvaluationRecord,
        SimulationError, Simulator,
    };
    pub use crate::fingerprint::{Fingerprint, fingerprint};
    pub use crate::log::EvaluationLog;
    pub use crate::normalize::{
        NormalizationConstants, ObjectiveNormalizer, ObjectiveVector, ProblemVariant, RawKpis,
    };
    #[cfg(feature = "async")]
    pub use crate::parallel::evaluate_parallel;
    pub use crate::seeder::{QuasiRandomSeeder, SeedBatch};
    pub use crate::space::{ParamKind, SearchSpace};
    pub use crate::summary::{FrontSummary, ParetoSummary, RunSummary};
    pub use crate::types::Direction;
}
