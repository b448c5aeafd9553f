//! Full retrofit search loop against a synthetic simulator.
//!
//! Seeds the run with a constraint-filtered Sobol design, evaluates the
//! seeds in parallel, then plays a naive "engine" that proposes random
//! one-measure mutations of front members. Repeated proposals hit the cache.
//! Writes an NDJSON evaluation log and appends a run-summary row.
//!
//! Run with: `RUST_LOG=info cargo run --example synthetic_run --features async,tracing`

use std::sync::Arc;
use std::time::Duration;

use retrofit_optimizer::log::run_label;
use retrofit_optimizer::prelude::*;
use tracing_subscriber::EnvFilter;

fn synthetic_simulator(config: &Configuration) -> Result<RawKpis, SimulationError> {
    let space = SearchSpace::multifamily_retrofit();
    let mut steps = 0.0;
    for p in space.params() {
        if let (ParamKind::Categorical(choices), Some(value)) = (&p.kind, config.get(&p.name)) {
            let pos = choices.iter().position(|c| c == value).unwrap_or(0);
            steps += f64::from(u32::try_from(pos).unwrap_or(0));
        }
    }
    // Pretend each run takes a while.
    std::thread::sleep(Duration::from_millis(5));

    Ok(RawKpis::new()
        .with(RawKpis::OPERATIONAL_CARBON_KG, 5_200_000.0 - 140_000.0 * steps)
        .with(RawKpis::EMBODIED_CARBON_KG, 17_000.0 * steps * (1.0 + 0.1 * (steps % 3.0)))
        .with(RawKpis::BERDO_FINE_USD, (250_000.0 - 11_000.0 * steps).max(0.0))
        .with(RawKpis::MATERIAL_COST_USD, 48_000.0 * steps)
        .with(RawKpis::UTILITY_COST_USD, 3_500_000.0 - 75_000.0 * steps))
}

fn mutate(config: &Configuration, space: &SearchSpace, rng: &mut fastrand::Rng) -> Configuration {
    let p = &space.params()[rng.usize(..space.len())];
    let mut next = config.clone();
    if let ParamKind::Categorical(choices) = &p.kind {
        next.insert(p.name.clone(), choices[rng.usize(..choices.len())].clone());
    }
    next
}

#[tokio::main]
async fn main() -> retrofit_optimizer::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let label = run_label("synthetic");
    let log_path = std::env::temp_dir().join(format!("{label}.ndjson"));
    let summary_path = std::env::temp_dir().join("retrofit_runs_summary.csv");

    let space = SearchSpace::multifamily_retrofit();
    let rules = RetrofitConstraints::default();

    let batch = QuasiRandomSeeder::builder()
        .seed(42)
        .build()
        .generate(64, &space, &rules)?;
    println!(
        "Seeded {} of {} Sobol points ({:.0}% accepted)",
        batch.accepted(),
        batch.requested,
        100.0 * batch.acceptance_rate()
    );

    let evaluator = Arc::new(
        DeduplicatingEvaluator::builder(
            synthetic_simulator,
            ObjectiveNormalizer::canonical(ProblemVariant::FourObjective),
        )
        .run_label(label.clone())
        .log(EvaluationLog::new(&log_path))
        .constraints(rules)
        .build(),
    );

    evaluate_parallel(Arc::clone(&evaluator), batch.configs(), 4).await?;

    let summary = ParetoSummary::minimize(4);
    let mut rng = fastrand::Rng::with_seed(7);
    let max_evals = 200;
    let mut proposed = batch.accepted();

    while proposed < max_evals {
        let history = evaluator.history();
        let front = summary.summarize(&evaluator.objectives())?;
        if front.members.is_empty() {
            println!("Every evaluation failed; stopping early");
            break;
        }
        let proposals: Vec<Configuration> = (0..8)
            .map(|_| {
                let member = &front.members[rng.usize(..front.members.len())];
                mutate(&history[member.index].record.config, &space, &mut rng)
            })
            .collect();
        proposed += proposals.len();
        evaluate_parallel(Arc::clone(&evaluator), proposals, 4).await?;
    }

    let stats = evaluator.stats();
    let front = summary.summarize(&evaluator.objectives())?;
    println!(
        "{} proposals: {} simulated, {} cache hits, {} penalized or failed",
        proposed, stats.evaluated, stats.duplicates, stats.failed
    );
    println!(
        "Pareto front: {} packages, crowding mean {:?}, std {:?}",
        front.pareto_size(),
        front.crowding_mean,
        front.crowding_std
    );

    RunSummary::from_front(label, max_evals, stats, &front).append_csv(&summary_path)?;
    println!("Log: {}", log_path.display());
    println!("Summary: {}", summary_path.display());

    Ok(())
}
