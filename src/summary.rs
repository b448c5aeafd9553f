//! Front statistics and the cross-run summary log.
//!
//! [`ParetoSummary`] reduces the objective vectors of a finished run to a
//! [`FrontSummary`]: which evaluations are non-dominated, how crowded the
//! front is, and the range each objective covered. [`RunSummary`] flattens
//! that into one CSV row so runs can be compared side by side.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evaluator::EvaluatorStats;
use crate::normalize::ObjectiveVector;
use crate::pareto::{crowding_distance, pareto_front_indices};
use crate::types::Direction;

/// Summarizes objective vectors under fixed per-objective directions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParetoSummary {
    directions: Vec<Direction>,
}

impl ParetoSummary {
    #[must_use]
    pub fn new(directions: Vec<Direction>) -> Self {
        Self { directions }
    }

    /// All `n_objectives` minimized, matching normalized vectors.
    #[must_use]
    pub fn minimize(n_objectives: usize) -> Self {
        Self::new(vec![Direction::Minimize; n_objectives])
    }

    #[must_use]
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Computes the front, its crowding statistics and the objective ranges.
    ///
    /// Sentinel vectors are failures: they are counted in `n_failed` and
    /// take no part in dominance or ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObjectiveDimensionMismatch`] if any vector's length
    /// differs from the number of directions.
    pub fn summarize(&self, objectives: &[ObjectiveVector]) -> Result<FrontSummary> {
        let m = self.directions.len();
        if let Some(bad) = objectives.iter().find(|o| o.len() != m) {
            return Err(Error::ObjectiveDimensionMismatch {
                expected: m,
                got: bad.len(),
            });
        }

        let valid: Vec<usize> = (0..objectives.len())
            .filter(|&i| !objectives[i].is_sentinel())
            .collect();
        let values: Vec<&[f64]> = valid.iter().map(|&i| objectives[i].as_slice()).collect();

        let front: Vec<usize> = pareto_front_indices(&values, &self.directions);
        let front_values: Vec<&[f64]> = front.iter().map(|&k| values[k]).collect();
        let distances = crowding_distance(&front_values);

        let members: Vec<FrontMember> = front
            .iter()
            .zip(&distances)
            .map(|(&k, &crowding_distance)| FrontMember {
                index: valid[k],
                objective: objectives[valid[k]].clone(),
                crowding_distance,
            })
            .collect();

        let finite: Vec<f64> = distances.iter().copied().filter(|d| d.is_finite()).collect();
        let (crowding_mean, crowding_std) = mean_and_sample_std(&finite);

        let objective_ranges = if values.is_empty() {
            Vec::new()
        } else {
            (0..m)
                .map(|j| {
                    let (min, max) = values.iter().fold(
                        (f64::INFINITY, f64::NEG_INFINITY),
                        |(lo, hi), v| (lo.min(v[j]), hi.max(v[j])),
                    );
                    ObjectiveRange { min, max }
                })
                .collect()
        };

        Ok(FrontSummary {
            n_evaluations: objectives.len(),
            n_failed: objectives.len() - valid.len(),
            members,
            crowding_mean,
            crowding_std,
            objective_ranges,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_and_sample_std(xs: &[f64]) -> (Option<f64>, Option<f64>) {
    if xs.is_empty() {
        return (None, None);
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    if xs.len() < 2 {
        return (Some(mean), None);
    }
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (Some(mean), Some(var.sqrt()))
}

/// One non-dominated evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontMember {
    /// Position in the slice passed to [`ParetoSummary::summarize`].
    pub index: usize,
    pub objective: ObjectiveVector,
    /// `inf` for boundary members.
    pub crowding_distance: f64,
}

/// Observed span of one objective.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveRange {
    pub min: f64,
    pub max: f64,
}

/// Result of [`ParetoSummary::summarize`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontSummary {
    /// All vectors passed in, failures included.
    pub n_evaluations: usize,
    /// Sentinel vectors.
    pub n_failed: usize,
    /// Non-dominated members in ascending `index` order.
    pub members: Vec<FrontMember>,
    /// Mean of the finite crowding distances.
    pub crowding_mean: Option<f64>,
    /// Sample standard deviation of the finite crowding distances; needs at
    /// least two.
    pub crowding_std: Option<f64>,
    /// Per-objective range over non-failed evaluations; empty if all failed.
    pub objective_ranges: Vec<ObjectiveRange>,
}

impl FrontSummary {
    #[must_use]
    pub fn pareto_size(&self) -> usize {
        self.members.len()
    }

    /// Input positions of the front members.
    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.index).collect()
    }
}

/// One row of the cross-run summary log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub run_label: String,
    /// Evaluation budget handed to the search engine.
    pub max_evals: usize,
    /// Distinct configurations actually evaluated.
    pub final_configs: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub pareto_size: usize,
    pub crowding_mean: Option<f64>,
    pub crowding_std: Option<f64>,
    pub objective_ranges: Vec<ObjectiveRange>,
}

impl RunSummary {
    #[must_use]
    pub fn from_front(
        run_label: impl Into<String>,
        max_evals: usize,
        stats: EvaluatorStats,
        front: &FrontSummary,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            run_label: run_label.into(),
            max_evals,
            final_configs: stats.evaluated,
            duplicates: stats.duplicates,
            failed: stats.failed,
            pareto_size: front.pareto_size(),
            crowding_mean: front.crowding_mean,
            crowding_std: front.crowding_std,
            objective_ranges: front.objective_ranges.clone(),
        }
    }

    /// Header line matching [`write_csv_row`](Self::write_csv_row).
    #[must_use]
    pub fn csv_header(&self) -> String {
        let mut header = String::from(
            "timestamp,run_label,max_evals,final_configs,duplicates,failed,pareto_size,crowding_mean,crowding_std",
        );
        for j in 0..self.objective_ranges.len() {
            header.push_str(&format!(",objective_{j}_min,objective_{j}_max"));
        }
        header
    }

    /// Writes this summary as one CSV line. Undefined statistics are empty
    /// cells.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if writing fails.
    pub fn write_csv_row(&self, mut writer: impl Write) -> std::io::Result<()> {
        write!(
            writer,
            "{},{},{},{},{},{},{},{},{}",
            self.timestamp.to_rfc3339(),
            csv_escape(&self.run_label),
            self.max_evals,
            self.final_configs,
            self.duplicates,
            self.failed,
            self.pareto_size,
            opt_cell(self.crowding_mean),
            opt_cell(self.crowding_std),
        )?;
        for r in &self.objective_ranges {
            write!(writer, ",{},{}", r.min, r.max)?;
        }
        writeln!(writer)
    }

    /// Appends this row to the summary file at `path`, writing the header
    /// first when the file is new or empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be opened or written.
    pub fn append_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let is_new = std::fs::metadata(path).map_or(true, |m| m.len() == 0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut writer = BufWriter::new(file);

        if is_new {
            writeln!(writer, "{}", self.csv_header()).map_err(|e| Error::Storage(e.to_string()))?;
        }
        self.write_csv_row(&mut writer)
            .map_err(|e| Error::Storage(e.to_string()))?;
        writer.flush().map_err(|e| Error::Storage(e.to_string()))?;

        trace_info!(path = %path.display(), run_label = %self.run_label, "run summary appended");
        Ok(())
    }
}

fn opt_cell(v: Option<f64>) -> String {
    v.map_or_else(String::new, |x| x.to_string())
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(xs: &[f64]) -> ObjectiveVector {
        ObjectiveVector::new(xs.to_vec())
    }

    #[test]
    fn sentinels_are_excluded() {
        let objs = vec![
            v(&[-0.5, -0.5]),
            ObjectiveVector::sentinel(2),
            v(&[-0.9, -0.1]),
            v(&[-0.4, -0.4]),
        ];
        let s = ParetoSummary::minimize(2).summarize(&objs).unwrap();
        assert_eq!(s.n_evaluations, 4);
        assert_eq!(s.n_failed, 1);
        assert_eq!(s.indices(), vec![0, 2]);
        assert_eq!(s.objective_ranges.len(), 2);
        assert!((s.objective_ranges[0].min + 0.9).abs() < 1e-12);
        assert!((s.objective_ranges[0].max + 0.4).abs() < 1e-12);
    }

    #[test]
    fn crowding_statistics() {
        let objs = vec![
            v(&[0.0, 9.0]),
            v(&[1.0, 8.0]),
            v(&[3.0, 6.0]),
            v(&[6.0, 2.0]),
        ];
        let s = ParetoSummary::minimize(2).summarize(&objs).unwrap();
        assert_eq!(s.pareto_size(), 4);
        // Interior distances are 6 and 11.
        assert!((s.crowding_mean.unwrap() - 8.5).abs() < 1e-12);
        let std = (2.0_f64 * 2.5 * 2.5).sqrt();
        assert!((s.crowding_std.unwrap() - std).abs() < 1e-12);
    }

    #[test]
    fn undefined_statistics() {
        let s = ParetoSummary::minimize(2).summarize(&[v(&[1.0, 1.0])]).unwrap();
        assert_eq!(s.pareto_size(), 1);
        assert!(s.crowding_mean.is_none());
        assert!(s.crowding_std.is_none());

        let empty = ParetoSummary::minimize(3).summarize(&[]).unwrap();
        assert!(empty.members.is_empty());
        assert!(empty.objective_ranges.is_empty());
    }

    #[test]
    fn length_mismatch() {
        let err = ParetoSummary::minimize(3).summarize(&[v(&[1.0, 2.0])]).unwrap_err();
        assert!(matches!(err, Error::ObjectiveDimensionMismatch { expected: 3, got: 2 }));
    }

    #[test]
    fn csv_row_layout() {
        let front = ParetoSummary::minimize(2)
            .summarize(&[v(&[-0.5, -0.25])])
            .unwrap();
        let stats = EvaluatorStats {
            evaluated: 1,
            duplicates: 3,
            failed: 0,
        };
        let row = RunSummary::from_front("run,a", 4, stats, &front);

        let mut out = Vec::new();
        row.write_csv_row(&mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        let cells: Vec<&str> = line.trim_end().split(',').collect();

        assert_eq!(row.csv_header().split(',').count(), 13);
        assert_eq!(cells[1], "\"run");
        assert_eq!(
            &cells[3..],
            &["4", "1", "3", "0", "1", "", "", "-0.5", "-0.5", "-0.25", "-0.25"]
        );
    }
}
