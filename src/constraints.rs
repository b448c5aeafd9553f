//! Compatibility rules between retrofit measures.
//!
//! A [`Constraint`] is a pure predicate over a [`Configuration`]. It is used
//! to filter the Sobol initial design and, optionally, to penalize invalid
//! proposals at evaluation time.
//!
//! [`RetrofitConstraints`] encodes the envelope rules of the multifamily
//! retrofit problem:
//!
//! 1. Window U-value and SHGC upgrades come as a pair: both unset or both set.
//! 2. Deeper infiltration reductions need enough wall insulation, and the two
//!    deepest tiers also need the window pair.
//!
//! | Infiltration option | Minimum wall tier | Window pair required |
//! |---|---|---|
//! | `0.75` | R-10 | no |
//! | `0.60` | R-15 | yes |
//! | `0.40` | R-20 | yes |
//!
//! Missing measures are read as the unset option (`"None"`), so partial
//! configurations are accepted without error.
//!
//! # Examples
//!
//! ```
//! use retrofit_optimizer::Configuration;
//! use retrofit_optimizer::constraints::{Constraint, RetrofitConstraints, Violation};
//!
//! let rules = RetrofitConstraints::default();
//!
//! let ok = Configuration::new()
//!     .with("upgrade_wall_insulation", "R-20")
//!     .with("upgrade_window_u_value", "0.22")
//!     .with("upgrade_window_shgc", "0.25")
//!     .with("adjust_infiltration_rates", "0.40");
//! assert!(rules.is_valid(&ok));
//!
//! let thin_wall = ok.clone().with("upgrade_wall_insulation", "R-15");
//! assert_eq!(
//!     rules.check(&thin_wall),
//!     Err(Violation::InsufficientWall {
//!         infiltration: "0.40".into(),
//!         required: 20.0,
//!         actual: 15.0,
//!     })
//! );
//! ```

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;

/// Measure identifier for window U-value upgrades.
pub const WINDOW_U_VALUE: &str = "upgrade_window_u_value";
/// Measure identifier for window solar heat gain coefficient upgrades.
pub const WINDOW_SHGC: &str = "upgrade_window_shgc";
/// Measure identifier for wall insulation upgrades.
pub const WALL_INSULATION: &str = "upgrade_wall_insulation";
/// Measure identifier for infiltration reduction.
pub const INFILTRATION: &str = "adjust_infiltration_rates";
/// Option label meaning "measure not applied".
pub const UNSET: &str = "None";

/// A pure validity predicate over configurations.
///
/// Implementations must not perform I/O and must accept partial
/// configurations without panicking.
pub trait Constraint: Send + Sync {
    /// Returns `true` if `config` satisfies every rule.
    fn is_valid(&self, config: &Configuration) -> bool;
}

impl<F> Constraint for F
where
    F: Fn(&Configuration) -> bool + Send + Sync,
{
    fn is_valid(&self, config: &Configuration) -> bool {
        self(config)
    }
}

/// A constraint that accepts every configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unconstrained;

impl Constraint for Unconstrained {
    fn is_valid(&self, _config: &Configuration) -> bool {
        true
    }
}

/// The first rule a configuration breaks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Violation {
    /// Exactly one of the window U-value / SHGC measures is set.
    UnpairedWindow,
    /// The infiltration tier needs more wall insulation than selected.
    InsufficientWall {
        /// The infiltration option that imposes the requirement.
        infiltration: String,
        /// Minimum wall tier (R-value).
        required: f64,
        /// Selected wall tier (R-value, 0 when unset).
        actual: f64,
    },
    /// The infiltration tier needs the window pair, which is unset.
    WindowPairRequired {
        /// The infiltration option that imposes the requirement.
        infiltration: String,
    },
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnpairedWindow => write!(f, "window U-value and SHGC must be set together"),
            Self::InsufficientWall {
                infiltration,
                required,
                actual,
            } => write!(
                f,
                "infiltration {infiltration} requires wall R-{required} or better (got R-{actual})"
            ),
            Self::WindowPairRequired { infiltration } => {
                write!(f, "infiltration {infiltration} requires window upgrades")
            }
        }
    }
}

/// Envelope requirement attached to one infiltration option.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InfiltrationTier {
    /// Option label, e.g. `"0.60"`.
    pub option: String,
    /// Minimum wall insulation tier (R-value).
    pub min_wall_r: f64,
    /// Whether the window U-value / SHGC pair must be set.
    pub requires_window_pair: bool,
}

/// Domain compatibility rules for the multifamily retrofit problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrofitConstraints {
    window_u_key: String,
    window_shgc_key: String,
    wall_key: String,
    infiltration_key: String,
    unset: String,
    tiers: Vec<InfiltrationTier>,
}

impl RetrofitConstraints {
    /// Creates the rule set with the standard measure identifiers and no
    /// infiltration tiers. Add tiers with [`with_tier`](Self::with_tier).
    #[must_use]
    pub fn new() -> Self {
        Self {
            window_u_key: WINDOW_U_VALUE.to_string(),
            window_shgc_key: WINDOW_SHGC.to_string(),
            wall_key: WALL_INSULATION.to_string(),
            infiltration_key: INFILTRATION.to_string(),
            unset: UNSET.to_string(),
            tiers: Vec::new(),
        }
    }

    /// Adds (or replaces) the requirement for an infiltration option.
    #[must_use]
    pub fn with_tier(
        mut self,
        option: impl Into<String>,
        min_wall_r: f64,
        requires_window_pair: bool,
    ) -> Self {
        let option = option.into();
        self.tiers.retain(|t| t.option != option);
        self.tiers.push(InfiltrationTier {
            option,
            min_wall_r,
            requires_window_pair,
        });
        self
    }

    /// Overrides the measure identifiers the rules read.
    #[must_use]
    pub fn with_keys(
        mut self,
        window_u: impl Into<String>,
        window_shgc: impl Into<String>,
        wall: impl Into<String>,
        infiltration: impl Into<String>,
    ) -> Self {
        self.window_u_key = window_u.into();
        self.window_shgc_key = window_shgc.into();
        self.wall_key = wall.into();
        self.infiltration_key = infiltration.into();
        self
    }

    /// Overrides the label treated as "measure not applied".
    #[must_use]
    pub fn with_unset_label(mut self, label: impl Into<String>) -> Self {
        self.unset = label.into();
        self
    }

    /// Infiltration tiers in insertion order.
    #[must_use]
    pub fn tiers(&self) -> &[InfiltrationTier] {
        &self.tiers
    }

    /// Checks every rule and reports the first one broken.
    ///
    /// # Errors
    ///
    /// Returns the [`Violation`] describing the first failed rule.
    pub fn check(&self, config: &Configuration) -> Result<(), Violation> {
        let unset = self.unset.as_str();
        let u_set = config.get_or(&self.window_u_key, unset) != unset;
        let shgc_set = config.get_or(&self.window_shgc_key, unset) != unset;
        if u_set != shgc_set {
            return Err(Violation::UnpairedWindow);
        }

        let infiltration = config.get_or(&self.infiltration_key, unset);
        let Some(tier) = self.tiers.iter().find(|t| t.option == infiltration) else {
            return Ok(());
        };

        let wall_r = parse_r_value(config.get_or(&self.wall_key, unset)).unwrap_or(0.0);
        if wall_r < tier.min_wall_r {
            return Err(Violation::InsufficientWall {
                infiltration: tier.option.clone(),
                required: tier.min_wall_r,
                actual: wall_r,
            });
        }
        if tier.requires_window_pair && !(u_set && shgc_set) {
            return Err(Violation::WindowPairRequired {
                infiltration: tier.option.clone(),
            });
        }
        Ok(())
    }
}

impl Default for RetrofitConstraints {
    /// The standard multifamily rule set.
    fn default() -> Self {
        Self::new()
            .with_tier("0.75", 10.0, false)
            .with_tier("0.60", 15.0, true)
            .with_tier("0.40", 20.0, true)
    }
}

impl Constraint for RetrofitConstraints {
    fn is_valid(&self, config: &Configuration) -> bool {
        self.check(config).is_ok()
    }
}

/// Parses an insulation tier label such as `"R-20"` into its R-value.
///
/// Returns `None` for unset or unrecognized labels.
///
/// ```
/// use retrofit_optimizer::constraints::parse_r_value;
///
/// assert_eq!(parse_r_value("R-20"), Some(20.0));
/// assert_eq!(parse_r_value("R-7.5"), Some(7.5));
/// assert_eq!(parse_r_value("None"), None);
/// ```
#[must_use]
pub fn parse_r_value(label: &str) -> Option<f64> {
    let rest = label.trim().strip_prefix('R')?;
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    rest.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Configuration {
        pairs.iter().copied().collect()
    }

    #[test]
    fn empty_configuration_is_valid() {
        assert!(RetrofitConstraints::default().is_valid(&Configuration::new()));
    }

    #[test]
    fn window_pair_must_match() {
        let rules = RetrofitConstraints::default();
        assert_eq!(
            rules.check(&config(&[(WINDOW_U_VALUE, "0.22")])),
            Err(Violation::UnpairedWindow)
        );
        assert_eq!(
            rules.check(&config(&[(WINDOW_U_VALUE, "None"), (WINDOW_SHGC, "0.25")])),
            Err(Violation::UnpairedWindow)
        );
        assert!(rules.is_valid(&config(&[(WINDOW_U_VALUE, "0.22"), (WINDOW_SHGC, "0.25")])));
        assert!(rules.is_valid(&config(&[(WINDOW_U_VALUE, "None"), (WINDOW_SHGC, "None")])));
    }

    #[test]
    fn mild_infiltration_needs_r10() {
        let rules = RetrofitConstraints::default();
        assert!(!rules.is_valid(&config(&[(INFILTRATION, "0.75")])));
        assert!(rules.is_valid(&config(&[(INFILTRATION, "0.75"), (WALL_INSULATION, "R-10")])));
    }

    #[test]
    fn deep_infiltration_needs_windows() {
        let rules = RetrofitConstraints::default();
        let c = config(&[(INFILTRATION, "0.60"), (WALL_INSULATION, "R-25")]);
        assert_eq!(
            rules.check(&c),
            Err(Violation::WindowPairRequired {
                infiltration: "0.60".into()
            })
        );
        let c = c.with(WINDOW_U_VALUE, "0.32").with(WINDOW_SHGC, "0.40");
        assert!(rules.is_valid(&c));
    }

    #[test]
    fn untiered_infiltration_is_unconstrained() {
        let rules = RetrofitConstraints::default();
        assert!(rules.is_valid(&config(&[(INFILTRATION, "1.00")])));
        assert!(rules.is_valid(&config(&[(INFILTRATION, "0.90")])));
    }

    #[test]
    fn with_tier_replaces_existing_option() {
        let rules = RetrofitConstraints::default().with_tier("0.75", 5.0, false);
        assert_eq!(rules.tiers().len(), 3);
        assert!(rules.is_valid(&config(&[(INFILTRATION, "0.75"), (WALL_INSULATION, "R-5")])));
    }

    #[test]
    fn custom_unset_label() {
        let rules = RetrofitConstraints::default().with_unset_label("Baseline");
        assert!(!rules.is_valid(&config(&[(WINDOW_U_VALUE, "0.22"), (WINDOW_SHGC, "Baseline")])));
    }

    #[test]
    fn r_value_parsing() {
        assert_eq!(parse_r_value("R-10"), Some(10.0));
        assert_eq!(parse_r_value("R15"), Some(15.0));
        assert_eq!(parse_r_value("None"), None);
        assert_eq!(parse_r_value("R-"), None);
        assert_eq!(parse_r_value(""), None);
    }

    #[test]
    fn closures_are_constraints() {
        let only_small = |c: &Configuration| c.len() < 2;
        assert!(only_small.is_valid(&config(&[("a", "1")])));
        assert!(!only_small.is_valid(&config(&[("a", "1"), ("b", "2")])));
        assert!(Unconstrained.is_valid(&config(&[("a", "1"), ("b", "2")])));
    }
}
