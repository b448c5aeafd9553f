//! Retrofit package representation.
//!
//! A [`Configuration`] maps each energy conservation measure (ECM) to the
//! option selected for it, e.g. `upgrade_wall_insulation → "R-20"`.
//! Numeric options are carried as their string form so that categorical,
//! ordinal and numeric measures share one representation.
//!
//! Keys are held sorted, so two configurations built in different insertion
//! orders compare equal and serialize identically.
//!
//! ```
//! use retrofit_optimizer::Configuration;
//!
//! let a = Configuration::new()
//!     .with("upgrade_wall_insulation", "R-20")
//!     .with("adjust_infiltration_rates", "0.40");
//! let b = Configuration::new()
//!     .with("adjust_infiltration_rates", "0.40")
//!     .with("upgrade_wall_insulation", "R-20");
//! assert_eq!(a, b);
//! assert_eq!(a.fingerprint(), b.fingerprint());
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// One candidate retrofit package: measure identifier → selected option.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, String>);

impl Configuration {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets `key` to `value`, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the option selected for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the option selected for `key`, or `default` when the measure
    /// is absent.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Returns `true` if the measure is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of measures in the configuration.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no measure is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(measure, option)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates over measure identifiers in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Content digest of this configuration. See [`fingerprint`](crate::fingerprint()).
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        crate::fingerprint::fingerprint(self)
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for Configuration {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for Configuration {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl core::fmt::Display for Configuration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}
