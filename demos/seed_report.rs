//! Constraint acceptance report for the Sobol seeder.
//!
//! Generates seed batches of increasing size over the multifamily retrofit
//! space, with and without the retrofit tier rules, and prints how many
//! points survive. A collapsed batch means the rules are too tight for the
//! requested design.
//!
//! Run with: `cargo run --example seed_report`

use retrofit_optimizer::constraints::Unconstrained;
use retrofit_optimizer::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> retrofit_optimizer::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let space = SearchSpace::multifamily_retrofit();
    let rules = RetrofitConstraints::default();
    let seeder = QuasiRandomSeeder::builder().seed(42).build();

    println!("{:>6} {:>10} {:>10} {:>8} {:>10}", "n", "accepted", "rejected", "rate", "collapsed");
    for n in [16, 64, 256, 1024] {
        let batch = seeder.generate(n, &space, &rules)?;
        println!(
            "{:>6} {:>10} {:>10} {:>7.1}% {:>10}",
            n,
            batch.accepted(),
            batch.rejected,
            100.0 * batch.acceptance_rate(),
            batch.is_collapsed()
        );
    }

    let free = seeder.generate(64, &space, &Unconstrained)?;
    println!(
        "\nWithout tier rules: {} of {} accepted",
        free.accepted(),
        free.requested
    );

    // The unconstrained batch holds every decoded point; show why the
    // first few were rejected under the tier rules.
    for sample in free.samples().iter().filter(|s| !rules.is_valid(&s.config)).take(5) {
        if let Err(violation) = rules.check(&sample.config) {
            println!("point {:>3}: {violation}", sample.index);
        }
    }

    Ok(())
}
