//! Bounded worker pool for concurrent evaluation.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::evaluator::{DeduplicatingEvaluator, EvaluationOutcome, Simulator};

/// Evaluates `configs` with at most `concurrency` simulations in flight.
///
/// Each evaluation runs on tokio's blocking pool through
/// [`spawn_blocking`](tokio::task::spawn_blocking). Outcomes are returned in
/// input order. Repeated configurations in the batch, even when in flight at
/// the same time, reach the simulator only once.
///
/// # Errors
///
/// Returns [`Error::Config`] if `concurrency` is zero and
/// [`Error::TaskError`] if a worker task is cancelled. Simulator panics are
/// recorded as failed evaluations instead.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use retrofit_optimizer::prelude::*;
///
/// # async fn example() -> retrofit_optimizer::Result<()> {
/// let sim = |_: &Configuration| -> Result<RawKpis, SimulationError> {
///     Ok(RawKpis::new()
///         .with(RawKpis::OPERATIONAL_CARBON_KG, 2_000_000.0)
///         .with(RawKpis::EMBODIED_CARBON_KG, 90_000.0)
///         .with(RawKpis::BERDO_FINE_USD, 0.0))
/// };
/// let normalizer = ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective);
/// let evaluator = Arc::new(DeduplicatingEvaluator::builder(sim, normalizer).build());
/// let batch = QuasiRandomSeeder::new()
///     .generate(16, &SearchSpace::multifamily_retrofit(), &RetrofitConstraints::default())?;
///
/// let outcomes = evaluate_parallel(Arc::clone(&evaluator), batch.configs(), 4).await?;
/// assert_eq!(outcomes.len(), batch.accepted());
/// # Ok(())
/// # }
/// ```
pub async fn evaluate_parallel<S>(
    evaluator: Arc<DeduplicatingEvaluator<S>>,
    configs: Vec<Configuration>,
    concurrency: usize,
) -> Result<Vec<EvaluationOutcome>>
where
    S: Simulator + 'static,
{
    if concurrency == 0 {
        return Err(Error::Config("concurrency must be at least 1".into()));
    }

    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!(
        "evaluate_parallel",
        n_configs = configs.len(),
        concurrency
    )
    .entered();

    let n = configs.len();
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut join_set: JoinSet<Result<(usize, EvaluationOutcome)>> = JoinSet::new();

    for (index, config) in configs.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::TaskError(e.to_string()))?;

        let evaluator = Arc::clone(&evaluator);
        join_set.spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || evaluator.evaluate(&config))
                .await
                .map_err(|e| Error::TaskError(e.to_string()));
            drop(permit);
            outcome.map(|o| (index, o))
        });
    }

    let mut outcomes: Vec<Option<EvaluationOutcome>> = (0..n).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (index, outcome) = joined.map_err(|e| Error::TaskError(e.to_string()))??;
        outcomes[index] = Some(outcome);
    }

    trace_info!(n, stats = ?evaluator.stats(), "parallel batch complete");

    outcomes
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(Error::Internal("worker finished without an outcome"))
}
