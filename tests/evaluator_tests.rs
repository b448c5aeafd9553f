//! Integration tests for the deduplicating evaluator and its log.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use retrofit_optimizer::constraints::RetrofitConstraints;
use retrofit_optimizer::evaluator::{
    CONSTRAINT_VIOLATION, CacheStatus, DeduplicatingEvaluator, SimulationError,
};
use retrofit_optimizer::log::EvaluationLog;
use retrofit_optimizer::normalize::{ObjectiveNormalizer, ProblemVariant, RawKpis};
use retrofit_optimizer::{Configuration, fingerprint};

fn temp_path() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut path = std::env::temp_dir();
    path.push(format!(
        "retrofit_evaluator_test_{}_{}.ndjson",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path
}

/// Deterministic stand-in: better wall insulation lowers operational carbon.
fn synthetic_kpis(config: &Configuration) -> RawKpis {
    let wall = match config.get("upgrade_wall_insulation") {
        Some("R-10") => 1.0,
        Some("R-15") => 2.0,
        Some("R-20") => 3.0,
        Some("R-25") => 4.0,
        _ => 0.0,
    };
    RawKpis::new()
        .with(RawKpis::OPERATIONAL_CARBON_KG, 4_000_000.0 - 400_000.0 * wall)
        .with(RawKpis::EMBODIED_CARBON_KG, 50_000.0 * wall)
        .with(RawKpis::BERDO_FINE_USD, 100_000.0 - 20_000.0 * wall)
        .with(RawKpis::MATERIAL_COST_USD, 150_000.0 * wall)
        .with(RawKpis::UTILITY_COST_USD, 2_500_000.0 - 100_000.0 * wall)
}

fn wall(label: &str) -> Configuration {
    Configuration::new()
        .with("upgrade_wall_insulation", label)
        .with("upgrade_window_u_value", "None")
        .with("upgrade_window_shgc", "None")
}

#[test]
fn each_fingerprint_simulates_once() {
    let calls = AtomicUsize::new(0);
    let sim = |c: &Configuration| -> Result<RawKpis, SimulationError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(synthetic_kpis(c))
    };
    let evaluator = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::FourObjective),
    )
    .build();

    let proposals = ["R-10", "R-20", "R-10", "R-25", "R-20", "R-10"];
    let statuses: Vec<CacheStatus> = proposals
        .iter()
        .map(|l| evaluator.evaluate(&wall(l)).status)
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        statuses,
        vec![
            CacheStatus::Evaluated,
            CacheStatus::Evaluated,
            CacheStatus::Duplicate,
            CacheStatus::Evaluated,
            CacheStatus::Duplicate,
            CacheStatus::Duplicate,
        ]
    );
    let stats = evaluator.stats();
    assert_eq!(stats.evaluated, 3);
    assert_eq!(stats.duplicates, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(evaluator.objectives().len(), 3);
}

#[test]
fn key_order_does_not_defeat_the_cache() {
    let calls = AtomicUsize::new(0);
    let sim = |c: &Configuration| -> Result<RawKpis, SimulationError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(synthetic_kpis(c))
    };
    let evaluator = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective),
    )
    .build();

    let a: Configuration = [("x", "1"), ("y", "2")].into_iter().collect();
    let b: Configuration = [("y", "2"), ("x", "1")].into_iter().collect();
    let first = evaluator.evaluate(&a);
    let second = evaluator.evaluate(&b);

    assert_eq!(first.objective, second.objective);
    assert_eq!(second.status, CacheStatus::Duplicate);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_duplicates_wait_for_the_first() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sim = move |c: &Configuration| -> Result<RawKpis, SimulationError> {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Ok(synthetic_kpis(c))
    };
    let evaluator = Arc::new(
        DeduplicatingEvaluator::builder(
            sim,
            ObjectiveNormalizer::canonical(ProblemVariant::FourObjective),
        )
        .build(),
    );

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let evaluator = Arc::clone(&evaluator);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                evaluator.evaluate(&wall("R-15"))
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let evaluated = outcomes
        .iter()
        .filter(|o| o.status == CacheStatus::Evaluated)
        .count();
    assert_eq!(evaluated, 1);
    assert!(outcomes.windows(2).all(|w| w[0].objective == w[1].objective));
    assert_eq!(evaluator.stats().duplicates, 7);
}

#[test]
fn failures_are_sentinels_and_cached() {
    let calls = AtomicUsize::new(0);
    let sim = |_: &Configuration| -> Result<RawKpis, SimulationError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(SimulationError::Unexpected("energyplus exited with code 1".into()))
    };
    let evaluator = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::FourObjective),
    )
    .build();

    let first = evaluator.evaluate(&wall("R-10"));
    let again = evaluator.evaluate(&wall("R-10"));

    assert!(first.objective.is_sentinel());
    assert_eq!(first.objective.len(), 4);
    assert_eq!(again.status, CacheStatus::Duplicate);
    assert!(again.objective.is_sentinel());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(
        first
            .record
            .error
            .as_deref()
            .is_some_and(|e| e.contains("energyplus"))
    );
    assert_eq!(evaluator.stats().failed, 1);
}

#[test]
fn panicking_simulator_is_recorded_once() {
    let calls = AtomicUsize::new(0);
    let sim = |c: &Configuration| -> Result<RawKpis, SimulationError> {
        calls.fetch_add(1, Ordering::SeqCst);
        if c.get("upgrade_wall_insulation") == Some("R-25") {
            panic!("adapter index out of range");
        }
        Ok(synthetic_kpis(c))
    };
    let evaluator = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::FourObjective),
    )
    .build();

    let first = evaluator.evaluate(&wall("R-25"));
    assert!(first.objective.is_sentinel());
    assert!(!first.record.success);
    assert!(
        first
            .record
            .error
            .as_deref()
            .is_some_and(|e| e.contains("adapter index out of range"))
    );

    let again = evaluator.evaluate(&wall("R-25"));
    assert_eq!(again.status, CacheStatus::Duplicate);
    assert_eq!(again.record, first.record);

    let healthy = evaluator.evaluate(&wall("R-10"));
    assert!(healthy.record.success);

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let stats = evaluator.stats();
    assert_eq!(stats.evaluated, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.failed, 1);
}

#[test]
fn constraint_penalty_only_when_configured() {
    let unpaired = Configuration::new()
        .with("upgrade_window_u_value", "0.18")
        .with("upgrade_window_shgc", "None");
    let sim = |c: &Configuration| -> Result<RawKpis, SimulationError> { Ok(synthetic_kpis(c)) };

    let strict = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective),
    )
    .constraints(RetrofitConstraints::default())
    .build();
    let outcome = strict.evaluate(&unpaired);
    assert!(outcome.objective.is_sentinel());
    assert_eq!(outcome.record.error.as_deref(), Some(CONSTRAINT_VIOLATION));

    let lenient = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective),
    )
    .build();
    let outcome = lenient.evaluate(&unpaired);
    assert!(!outcome.objective.is_sentinel());
    assert!(outcome.record.success);
}

#[test]
fn log_holds_one_line_per_real_evaluation() {
    let path = temp_path();
    let sim = |c: &Configuration| -> Result<RawKpis, SimulationError> {
        if c.get("upgrade_wall_insulation") == Some("R-25") {
            Err(SimulationError::Failed {
                reason: "missing report".into(),
            })
        } else {
            Ok(synthetic_kpis(c))
        }
    };
    let evaluator = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::FourObjective),
    )
    .run_label("log_test")
    .log(EvaluationLog::new(&path))
    .build();

    for label in ["R-10", "R-15", "R-10", "R-25", "R-15"] {
        let _ = evaluator.evaluate(&wall(label));
    }

    let records = EvaluationLog::read_records(&path).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.run_id == "log_test"));
    assert_eq!(records[0].fingerprint, fingerprint(&wall("R-10")));
    assert_eq!(records[0].config, wall("R-10"));

    let ok = &records[0];
    assert!(ok.success);
    let breakdown = ok.objectives.as_ref().unwrap();
    assert_eq!(breakdown.normalized_objective_values.len(), 4);
    assert!(ok.error.is_none());

    let failed = &records[2];
    assert!(!failed.success);
    assert!(failed.objectives.is_none());
    assert!(failed.error.as_deref().unwrap().contains("missing report"));

    let ids: std::collections::HashSet<_> = records.iter().map(|r| &r.evaluation_id).collect();
    assert_eq!(ids.len(), 3);

    std::fs::remove_file(&path).ok();
}

#[test]
fn unwritable_log_does_not_fail_evaluation() {
    let dir = temp_path();
    std::fs::create_dir_all(&dir).unwrap();
    // A directory cannot be opened for appending.
    let sim = |c: &Configuration| -> Result<RawKpis, SimulationError> { Ok(synthetic_kpis(c)) };
    let evaluator = DeduplicatingEvaluator::builder(
        sim,
        ObjectiveNormalizer::canonical(ProblemVariant::FourObjective),
    )
    .log(EvaluationLog::new(&dir))
    .build();

    let outcome = evaluator.evaluate(&wall("R-20"));
    assert!(outcome.record.success);
    assert_eq!(evaluator.history().len(), 1);

    std::fs::remove_dir_all(&dir).ok();
}
