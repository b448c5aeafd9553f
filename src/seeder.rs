//! Constraint-filtered Sobol initial design.
//!
//! [`QuasiRandomSeeder`] draws points from an Owen-scrambled Sobol sequence
//! (Burley 2020), decodes each into a [`Configuration`] through the
//! [`SearchSpace`], and drops points that fall outside the formal domain or
//! violate the [`Constraint`]. Rejected points are dropped **in place**:
//! survivors keep their relative sequence order and no replacement points
//! are drawn, so the seed list still inherits the space-filling spread of
//! the underlying sequence.
//!
//! The acceptance rate is reported on the returned [`SeedBatch`]. A rate
//! below the configured floor marks the batch as collapsed, which usually
//! means the constraint set is too restrictive for the space.
//!
//! Sobol balance properties are strongest when `n_samples` is a power of
//! two, though any count is accepted.
//!
//! # Example
//!
//! ```
//! use retrofit_optimizer::constraints::RetrofitConstraints;
//! use retrofit_optimizer::seeder::QuasiRandomSeeder;
//! use retrofit_optimizer::space::SearchSpace;
//!
//! let seeder = QuasiRandomSeeder::builder().seed(42).build();
//! let batch = seeder
//!     .generate(128, &SearchSpace::multifamily_retrofit(), &RetrofitConstraints::default())
//!     .unwrap();
//!
//! assert_eq!(batch.requested, 128);
//! assert!(!batch.is_collapsed());
//! let indices: Vec<u32> = batch.samples().iter().map(|s| s.index).collect();
//! assert!(indices.windows(2).all(|w| w[0] < w[1]));
//! ```

use serde::{Deserialize, Serialize};
use sobol_burley::sample;

use crate::configuration::Configuration;
use crate::constraints::Constraint;
use crate::error::{Error, Result};
use crate::space::{MAX_DIMENSIONS, SearchSpace};

/// Default acceptance-rate floor below which a batch counts as collapsed.
pub const DEFAULT_MIN_ACCEPTANCE_RATE: f64 = 0.2;

/// An accepted configuration together with its position in the Sobol sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedSample {
    /// Index of the point in the unfiltered sequence.
    pub index: u32,
    /// The decoded configuration.
    pub config: Configuration,
}

/// Result of one seeding pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedBatch {
    /// Number of sequence points drawn.
    pub requested: usize,
    /// Points dropped by the constraint.
    pub rejected: usize,
    /// Points dropped because decoding or the domain check failed.
    pub decode_failures: usize,
    /// Acceptance-rate floor this batch was generated with.
    pub min_acceptance_rate: f64,
    samples: Vec<SeedSample>,
}

impl SeedBatch {
    /// Number of accepted configurations.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.samples.len()
    }

    /// Accepted fraction of the requested points, `0.0` for an empty request.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_rate(&self) -> f64 {
        if self.requested == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.requested as f64
        }
    }

    /// Returns `true` if the acceptance rate fell below the floor.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.requested > 0 && self.acceptance_rate() < self.min_acceptance_rate
    }

    /// Accepted samples in sequence order.
    #[must_use]
    pub fn samples(&self) -> &[SeedSample] {
        &self.samples
    }

    /// Accepted configurations in sequence order.
    #[must_use]
    pub fn configs(&self) -> Vec<Configuration> {
        self.samples.iter().map(|s| s.config.clone()).collect()
    }

    /// Consumes the batch, yielding the configurations in sequence order.
    #[must_use]
    pub fn into_configs(self) -> Vec<Configuration> {
        self.samples.into_iter().map(|s| s.config).collect()
    }
}

/// Quasi-random generator of valid initial configurations.
///
/// Deterministic: the same seed, space and constraint always produce the
/// same batch.
#[derive(Clone, Debug)]
pub struct QuasiRandomSeeder {
    seed: u32,
    min_acceptance_rate: f64,
}

impl QuasiRandomSeeder {
    /// Creates a seeder with seed 0 and the default acceptance floor.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring a `QuasiRandomSeeder`.
    #[must_use]
    pub fn builder() -> QuasiRandomSeederBuilder {
        QuasiRandomSeederBuilder::default()
    }

    /// Draws `n_samples` sequence points and keeps the valid ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty search space or a sample count
    /// beyond `u32::MAX`, and [`Error::TooManyDimensions`] if the space is
    /// wider than the generator supports.
    pub fn generate(
        &self,
        n_samples: usize,
        space: &SearchSpace,
        constraint: &dyn Constraint,
    ) -> Result<SeedBatch> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("generate", n_samples, dims = space.len()).entered();

        if space.is_empty() {
            return Err(Error::Config("search space has no parameters".into()));
        }
        if space.len() > MAX_DIMENSIONS {
            return Err(Error::TooManyDimensions {
                got: space.len(),
                max: MAX_DIMENSIONS,
            });
        }
        let n = u32::try_from(n_samples)
            .map_err(|_| Error::Config(format!("too many samples requested: {n_samples}")))?;
        #[allow(clippy::cast_possible_truncation)]
        let dims = space.len() as u32;

        let mut samples = Vec::new();
        let mut rejected = 0;
        let mut decode_failures = 0;
        let mut point = Vec::with_capacity(space.len());

        for index in 0..n {
            point.clear();
            point.extend((0..dims).map(|d| f64::from(sample(index, d, self.seed))));

            let config = match space
                .decode(&point)
                .and_then(|c| space.contains(&c).map(|()| c))
            {
                Ok(c) => c,
                Err(_e) => {
                    decode_failures += 1;
                    trace_debug!(index, error = %_e, "sample failed domain check");
                    continue;
                }
            };

            if constraint.is_valid(&config) {
                samples.push(SeedSample { index, config });
            } else {
                rejected += 1;
                trace_debug!(index, "sample rejected by constraint");
            }
        }

        let batch = SeedBatch {
            requested: n_samples,
            rejected,
            decode_failures,
            min_acceptance_rate: self.min_acceptance_rate,
            samples,
        };

        trace_info!(
            requested = batch.requested,
            accepted = batch.accepted(),
            rate = batch.acceptance_rate(),
            "seeding complete"
        );
        if batch.is_collapsed() {
            trace_warn!(
                rate = batch.acceptance_rate(),
                floor = self.min_acceptance_rate,
                "seed acceptance rate collapsed; constraints may be too restrictive"
            );
        }

        Ok(batch)
    }

    /// Like [`generate`](Self::generate) but with an explicit seed,
    /// overriding the one this seeder was built with.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub fn generate_with_seed(
        &self,
        n_samples: usize,
        seed: u64,
        space: &SearchSpace,
        constraint: &dyn Constraint,
    ) -> Result<SeedBatch> {
        let mut seeder = self.clone();
        seeder.seed = truncate_seed(seed);
        seeder.generate(n_samples, space, constraint)
    }
}

impl Default for QuasiRandomSeeder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_seed(seed: u64) -> u32 {
    seed as u32
}

/// Builder for [`QuasiRandomSeeder`].
#[derive(Debug, Clone, Default)]
pub struct QuasiRandomSeederBuilder {
    seed: Option<u64>,
    min_acceptance_rate: Option<f64>,
}

impl QuasiRandomSeederBuilder {
    /// Sets the scrambling seed. Only the low 32 bits are used.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the acceptance-rate floor (clamped to `[0, 1]`).
    #[must_use]
    pub fn min_acceptance_rate(mut self, rate: f64) -> Self {
        self.min_acceptance_rate = Some(rate.clamp(0.0, 1.0));
        self
    }

    /// Builds the configured [`QuasiRandomSeeder`].
    #[must_use]
    pub fn build(self) -> QuasiRandomSeeder {
        QuasiRandomSeeder {
            seed: truncate_seed(self.seed.unwrap_or(0)),
            min_acceptance_rate: self
                .min_acceptance_rate
                .unwrap_or(DEFAULT_MIN_ACCEPTANCE_RATE),
        }
    }
}
