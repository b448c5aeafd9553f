//! Search-space definition and unit-cube decoding.
//!
//! A [`SearchSpace`] is an ordered list of named [`Hyperparameter`]s, one per
//! dimension of the quasi-random design. Each parameter kind maps a
//! coordinate in \[0, 1) onto its domain:
//!
//! | Kind | Mapping |
//! |---|---|
//! | [`ParamKind::Categorical`] / [`ParamKind::Ordinal`] | `floor(u * n)` clipped to `n - 1` |
//! | [`ParamKind::Integer`] | `lower + floor(u * (upper - lower + 1))` clipped to `upper` |
//! | [`ParamKind::Continuous`] | `lower + u * (upper - lower)` |
//! | [`ParamKind::Constant`] | always its value |
//!
//! The clip absorbs floating-point rounding at the upper edge.
//!
//! # Examples
//!
//! ```
//! use retrofit_optimizer::space::SearchSpace;
//!
//! let space = SearchSpace::new()
//!     .categorical("hvac", ["Baseline", "Mini-Split"])
//!     .unwrap()
//!     .integer("floors", 1, 4)
//!     .unwrap();
//!
//! let config = space.decode(&[0.99, 0.0]).unwrap();
//! assert_eq!(config.get("hvac"), Some("Mini-Split"));
//! assert_eq!(config.get("floors"), Some("1"));
//! assert!(space.contains(&config).is_ok());
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::constraints::{INFILTRATION, UNSET, WALL_INSULATION, WINDOW_SHGC, WINDOW_U_VALUE};
use crate::error::{Error, Result};

/// Highest dimensionality the Sobol generator supports.
pub const MAX_DIMENSIONS: usize = 256;

/// The closed set of parameter domains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamKind {
    /// Unordered labels.
    Categorical(Vec<String>),
    /// Labels with a meaningful order (e.g. insulation tiers).
    Ordinal(Vec<String>),
    /// Integers in `[lower, upper]`.
    Integer {
        /// Inclusive lower bound.
        lower: i64,
        /// Inclusive upper bound.
        upper: i64,
    },
    /// Reals in `[lower, upper]`.
    Continuous {
        /// Inclusive lower bound.
        lower: f64,
        /// Inclusive upper bound.
        upper: f64,
    },
    /// A fixed value.
    Constant(String),
}

impl ParamKind {
    #[allow(clippy::cast_precision_loss)]
    fn validate(&self, name: &str) -> Result<()> {
        match self {
            Self::Categorical(choices) | Self::Ordinal(choices) if choices.is_empty() => {
                Err(Error::EmptyChoices(name.to_string()))
            }
            Self::Integer { lower, upper } if lower > upper => Err(Error::InvalidBounds {
                low: *lower as f64,
                high: *upper as f64,
            }),
            Self::Continuous { lower, upper }
                if !(lower.is_finite() && upper.is_finite()) || lower > upper =>
            {
                Err(Error::InvalidBounds {
                    low: *lower,
                    high: *upper,
                })
            }
            _ => Ok(()),
        }
    }

    /// Maps a unit coordinate onto this domain.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn decode(&self, u: f64) -> String {
        match self {
            Self::Categorical(choices) | Self::Ordinal(choices) => {
                let idx = (u * choices.len() as f64).floor() as usize;
                choices[idx.min(choices.len() - 1)].clone()
            }
            Self::Integer { lower, upper } => {
                // i128 so the full i64 range neither overflows nor wraps.
                let (lower, upper) = (i128::from(*lower), i128::from(*upper));
                let span = (upper - lower + 1) as f64;
                let k = (u * span).floor() as i128;
                (lower + k).min(upper).max(lower).to_string()
            }
            Self::Continuous { lower, upper } => {
                (lower + u * (upper - lower)).min(*upper).to_string()
            }
            Self::Constant(value) => value.clone(),
        }
    }

    fn admits(&self, value: &str) -> bool {
        match self {
            Self::Categorical(choices) | Self::Ordinal(choices) => {
                choices.iter().any(|c| c == value)
            }
            Self::Integer { lower, upper } => value
                .parse::<i64>()
                .is_ok_and(|v| (*lower..=*upper).contains(&v)),
            Self::Continuous { lower, upper } => value
                .parse::<f64>()
                .is_ok_and(|v| v.is_finite() && (*lower..=*upper).contains(&v)),
            Self::Constant(c) => c == value,
        }
    }
}

/// A named dimension of the search space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameter {
    /// Measure identifier, used as the configuration key.
    pub name: String,
    /// Domain of the measure.
    pub kind: ParamKind,
}

/// Ordered collection of hyperparameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    params: Vec<Hyperparameter>,
}

impl SearchSpace {
    /// Creates an empty search space.
    #[must_use]
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Appends a parameter after validating its domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] or [`Error::InvalidBounds`] for an
    /// unusable domain, [`Error::Config`] for a duplicate name, and
    /// [`Error::TooManyDimensions`] past [`MAX_DIMENSIONS`].
    pub fn push(&mut self, name: impl Into<String>, kind: ParamKind) -> Result<()> {
        let name = name.into();
        kind.validate(&name)?;
        if self.params.iter().any(|p| p.name == name) {
            return Err(Error::Config(format!("duplicate parameter '{name}'")));
        }
        if self.params.len() >= MAX_DIMENSIONS {
            return Err(Error::TooManyDimensions {
                got: self.params.len() + 1,
                max: MAX_DIMENSIONS,
            });
        }
        self.params.push(Hyperparameter { name, kind });
        Ok(())
    }

    /// Builder-style categorical parameter.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn categorical<I, S>(mut self, name: impl Into<String>, choices: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices = choices.into_iter().map(Into::into).collect();
        self.push(name, ParamKind::Categorical(choices))?;
        Ok(self)
    }

    /// Builder-style ordinal parameter.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn ordinal<I, S>(mut self, name: impl Into<String>, sequence: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sequence = sequence.into_iter().map(Into::into).collect();
        self.push(name, ParamKind::Ordinal(sequence))?;
        Ok(self)
    }

    /// Builder-style integer parameter over `[lower, upper]`.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn integer(mut self, name: impl Into<String>, lower: i64, upper: i64) -> Result<Self> {
        self.push(name, ParamKind::Integer { lower, upper })?;
        Ok(self)
    }

    /// Builder-style continuous parameter over `[lower, upper]`.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn continuous(mut self, name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        self.push(name, ParamKind::Continuous { lower, upper })?;
        Ok(self)
    }

    /// Builder-style constant parameter.
    ///
    /// # Errors
    ///
    /// See [`push`](Self::push).
    pub fn constant(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        self.push(name, ParamKind::Constant(value.into()))?;
        Ok(self)
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if no parameter is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in dimension order.
    #[must_use]
    pub fn params(&self) -> &[Hyperparameter] {
        &self.params
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Hyperparameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Decodes a point of the unit hypercube into a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `point` does not have one
    /// coordinate per parameter.
    pub fn decode(&self, point: &[f64]) -> Result<Configuration> {
        if point.len() != self.params.len() {
            return Err(Error::DimensionMismatch {
                expected: self.params.len(),
                got: point.len(),
            });
        }
        Ok(self
            .params
            .iter()
            .zip(point)
            .map(|(p, &u)| (p.name.clone(), p.kind.decode(u)))
            .collect())
    }

    /// Checks that `config` assigns an in-domain value to every declared
    /// parameter and nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownParameter`] for an undeclared key and
    /// [`Error::ValueOutOfDomain`] for a missing or out-of-domain value.
    pub fn contains(&self, config: &Configuration) -> Result<()> {
        let declared: HashSet<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        if let Some(extra) = config.keys().find(|k| !declared.contains(k)) {
            return Err(Error::UnknownParameter(extra.to_string()));
        }
        for p in &self.params {
            match config.get(&p.name) {
                Some(value) if p.kind.admits(value) => {}
                other => {
                    return Err(Error::ValueOutOfDomain {
                        name: p.name.clone(),
                        value: other.unwrap_or("<missing>").to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The multifamily retrofit measure set, one categorical per measure.
    #[must_use]
    pub fn multifamily_retrofit() -> Self {
        let measures: [(&str, &[&str]); 9] = [
            (WALL_INSULATION, &[UNSET, "R-10", "R-15", "R-20", "R-25"]),
            ("upgrade_roof_insulation", &[UNSET, "R-20", "R-30", "R-40"]),
            (WINDOW_U_VALUE, &[UNSET, "0.32", "0.28", "0.22", "0.18"]),
            (WINDOW_SHGC, &[UNSET, "0.25", "0.35", "0.40"]),
            (INFILTRATION, &["1.00", "0.90", "0.75", "0.60", "0.40"]),
            (
                "upgrade_hvac_system_choice",
                &["Baseline", "Condensing Boiler", "Mini-Split", "Packaged HP"],
            ),
            ("upgrade_dhw_to_hpwh", &["Baseline", "Upgrade"]),
            ("add_in_unit_erv", &["No ERV", "Add ERV"]),
            ("upgrade_hvac_packaged_heat_pump", &[UNSET, "Upgrade"]),
        ];
        let params = measures
            .iter()
            .map(|(name, choices)| Hyperparameter {
                name: (*name).to_string(),
                kind: ParamKind::Categorical(choices.iter().map(|c| (*c).to_string()).collect()),
            })
            .collect();
        Self { params }
    }

    /// Builds a space from an ECM options document:
    /// `{ "<measure>": { "options": [..], ... }, ... }`.
    ///
    /// Each measure becomes a categorical parameter, in document order.
    /// Other per-measure keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is malformed, plus any
    /// error from [`push`](Self::push).
    pub fn from_ecm_options_json(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct MeasureEntry {
            options: Vec<OptionLabel>,
        }

        // Option files mix quoted labels and bare numbers.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OptionLabel {
            Text(String),
            Number(serde_json::Number),
        }

        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;

        let mut space = Self::new();
        for (measure, value) in doc {
            let entry: MeasureEntry = serde_json::from_value(value)
                .map_err(|e| Error::Config(format!("measure '{measure}': {e}")))?;
            let choices = entry
                .options
                .into_iter()
                .map(|o| match o {
                    OptionLabel::Text(s) => s,
                    OptionLabel::Number(n) => n.to_string(),
                })
                .collect();
            space.push(measure, ParamKind::Categorical(choices))?;
        }
        Ok(space)
    }

    /// Reads an ECM options file. See [`from_ecm_options_json`](Self::from_ecm_options_json).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_ecm_options_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_ecm_options_json(&text)
    }
}
