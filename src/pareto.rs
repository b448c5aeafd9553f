//! Pareto dominance, non-dominated sorting and crowding distance.
//!
//! | Function | Purpose |
//! |---|---|
//! | [`dominates`] | Pairwise Pareto dominance under per-objective directions |
//! | [`non_dominated_sort`] | Rank solutions into successive fronts (front 0, 1, …) |
//! | [`pareto_front_indices`] | Filter to non-dominated (Pareto-optimal) solutions only |
//! | [`crowding_distance`] | Measure spread within a single front |
//!
//! Every function accepts any slice of `AsRef<[f64]>` rows, so plain
//! `Vec<f64>` values and [`ObjectiveVector`](crate::normalize::ObjectiveVector)s
//! work alike.
//!
//! # Example
//!
//! ```
//! use retrofit_optimizer::Direction;
//! use retrofit_optimizer::pareto::{crowding_distance, non_dominated_sort, pareto_front_indices};
//!
//! let solutions = vec![
//!     vec![1.0, 5.0], // Pareto-optimal
//!     vec![5.0, 1.0], // Pareto-optimal
//!     vec![3.0, 3.0], // Pareto-optimal
//!     vec![4.0, 4.0], // Dominated by (3, 3)
//! ];
//! let dirs = [Direction::Minimize, Direction::Minimize];
//!
//! let fronts = non_dominated_sort(&solutions, &dirs);
//! assert_eq!(fronts.len(), 2);
//!
//! let mut front = pareto_front_indices(&solutions, &dirs);
//! front.sort_unstable();
//! assert_eq!(front, vec![0, 1, 2]);
//!
//! let front_values: Vec<_> = front.iter().map(|&i| solutions[i].clone()).collect();
//! let cd = crowding_distance(&front_values);
//! assert!(cd[0].is_infinite()); // boundary solution
//! assert!((cd[2] - 8.0).abs() < 1e-12); // |5-1| in each objective
//! ```

use crate::types::Direction;

/// Returns `true` if solution `a` Pareto-dominates solution `b`.
///
/// A solution dominates another if it is at least as good in all objectives
/// and strictly better in at least one, respecting the given directions.
#[must_use]
pub fn dominates(a: &[f64], b: &[f64], directions: &[Direction]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), directions.len());

    let mut strictly_better = false;
    for ((&av, &bv), dir) in a.iter().zip(b.iter()).zip(directions.iter()) {
        let better = match dir {
            Direction::Minimize => av < bv,
            Direction::Maximize => av > bv,
        };
        let worse = match dir {
            Direction::Minimize => av > bv,
            Direction::Maximize => av < bv,
        };
        if worse {
            return false;
        }
        if better {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Fast non-dominated sorting (Deb et al., 2002).
///
/// Returns `fronts` where `fronts[0]` is the Pareto front, `fronts[1]` the
/// next-best front (dominated only by front 0), and so on. Each inner vec
/// holds indices into `solutions`.
///
/// Complexity: O(M × N²) where M = objectives, N = solutions.
#[must_use]
pub fn non_dominated_sort<T: AsRef<[f64]>>(
    solutions: &[T],
    directions: &[Direction],
) -> Vec<Vec<usize>> {
    let n = solutions.len();
    if n == 0 {
        return Vec::new();
    }

    // S_p: set of solutions dominated by p
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    // n_p: domination count for p
    let mut domination_count: Vec<usize> = vec![0; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (solutions[i].as_ref(), solutions[j].as_ref());
            if dominates(a, b, directions) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(b, a, directions) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current_front: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();

    while !current_front.is_empty() {
        let mut next_front: Vec<usize> = Vec::new();
        for &p in &current_front {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next_front.push(q);
                }
            }
        }
        fronts.push(current_front);
        current_front = next_front;
    }

    fronts
}

/// Indices of the non-dominated (Pareto-optimal) solutions, ascending.
///
/// Equivalent to a sorted `non_dominated_sort(solutions, directions)[0]`.
#[must_use]
pub fn pareto_front_indices<T: AsRef<[f64]>>(
    solutions: &[T],
    directions: &[Direction],
) -> Vec<usize> {
    let mut front = non_dominated_sort(solutions, directions)
        .into_iter()
        .next()
        .unwrap_or_default();
    front.sort_unstable();
    front
}

/// Crowding distance of each member of `front`, in input order.
///
/// Objectives are assumed to be on a common scale already (normalized), so
/// the per-objective contribution of an interior point is the absolute gap
/// between its two neighbours, without dividing by the objective's range.
/// The extreme points of every objective receive [`f64::INFINITY`]. An empty
/// front yields an empty vec and fronts of one or two points are all
/// boundary.
#[must_use]
pub fn crowding_distance<T: AsRef<[f64]>>(front: &[T]) -> Vec<f64> {
    let n = front.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let m = front[0].as_ref().len();
    let mut distances = vec![0.0_f64; n];
    let val = |pos: usize, obj: usize| front[pos].as_ref()[obj];

    for obj in 0..m {
        let mut sorted: Vec<usize> = (0..n).collect();
        sorted.sort_by(|&a, &b| val(a, obj).total_cmp(&val(b, obj)));

        distances[sorted[0]] = f64::INFINITY;
        distances[sorted[n - 1]] = f64::INFINITY;

        for w in sorted.windows(3) {
            distances[w[1]] += (val(w[2], obj) - val(w[0], obj)).abs();
        }
    }

    distances
}
