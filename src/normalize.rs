//! Scalarization of raw simulator KPIs into a fixed-length objective vector.
//!
//! Every objective is min-max or max-scaled against a versioned
//! [`NormalizationConstants`] set and then negated, which is the sign
//! convention the search engine and [`ParetoSummary`](crate::summary::ParetoSummary)
//! expect.
//!
//! Two problem shapes are supported, selected by [`ProblemVariant`]:
//!
//! | Variant | Vector |
//! |---------|--------|
//! | `ThreeObjective` | `[-oc_n, -ec_n, -fine_n]` |
//! | `FourObjective` | `[-oc_n, -ec_n, -lr_n, -mat_n]` |
//!
//! where `lr_n` scales the net long-run cost (utility cost above the
//! baseline plus the BERDO fine).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Version tag of the built-in constant set.
pub const CANONICAL_VERSION: &str = "2025-08-canonical";

/// Scaling bounds for every objective, loaded once per run.
///
/// Construct with [`canonical`](Self::canonical) or load a JSON artifact with
/// [`from_path`](Self::from_path). Loaded sets are always validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConstants {
    /// Identifies the constant set in logs.
    pub version: String,
    /// Lower bound of operational carbon, kg.
    pub min_oc: f64,
    /// Upper bound of operational carbon, kg.
    pub max_oc: f64,
    /// Upper bound of embodied carbon, kg.
    pub max_ec: f64,
    /// Upper bound of material cost, USD.
    pub max_mat_cost: f64,
    /// Discounted utility cost of the untouched building, USD.
    pub utility_cost_baseline: f64,
    /// Lowest discounted utility cost observed across packages, USD.
    pub utility_cost_min: f64,
    /// Highest discounted utility cost observed across packages, USD.
    pub utility_cost_max: f64,
    /// Smallest BERDO fine, added to the long-run lower bound, USD.
    pub net_berdo_min: f64,
    /// Largest BERDO fine, USD.
    pub max_berdo_fine: f64,
    /// Lower bound on the long-run cost denominator.
    #[serde(default = "one")]
    pub longrun_guard: f64,
    /// Replacement for non-positive embodied carbon, material cost and fines.
    #[serde(default = "one")]
    pub floor: f64,
}

fn one() -> f64 {
    1.0
}

impl NormalizationConstants {
    /// The built-in constant set for the multifamily study building.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            version: CANONICAL_VERSION.to_string(),
            min_oc: 1_355_578.0,
            max_oc: 5_515_869.0,
            max_ec: 476_657.0,
            max_mat_cost: 1_209_421.0,
            utility_cost_baseline: 2_184_813.0,
            utility_cost_min: 1_638_838.0,
            utility_cost_max: 3_693_027.0,
            net_berdo_min: 74_620.0,
            max_berdo_fine: 490_000.0,
            longrun_guard: 1.0,
            floor: 1.0,
        }
    }

    /// Parses a JSON constant set and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the JSON is malformed and
    /// [`Error::InvalidNormalization`] if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let constants: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("constants: {e}")))?;
        constants.validate()?;
        Ok(constants)
    }

    /// Reads and validates a JSON constant set from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Lower bound of the net long-run cost.
    #[must_use]
    pub fn longrun_min(&self) -> f64 {
        (self.utility_cost_min - self.utility_cost_baseline) + self.net_berdo_min
    }

    /// Upper bound of the net long-run cost.
    #[must_use]
    pub fn longrun_max(&self) -> f64 {
        self.utility_cost_max - self.utility_cost_baseline
    }

    /// Checks that every value is finite and every scaling interval has
    /// positive width.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNormalization`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("min_oc", self.min_oc),
            ("max_oc", self.max_oc),
            ("max_ec", self.max_ec),
            ("max_mat_cost", self.max_mat_cost),
            ("utility_cost_baseline", self.utility_cost_baseline),
            ("utility_cost_min", self.utility_cost_min),
            ("utility_cost_max", self.utility_cost_max),
            ("net_berdo_min", self.net_berdo_min),
            ("max_berdo_fine", self.max_berdo_fine),
            ("longrun_guard", self.longrun_guard),
            ("floor", self.floor),
        ];
        if let Some((name, v)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidNormalization(format!("{name} is not finite ({v})")));
        }

        let widths = [
            ("max_oc - min_oc", self.max_oc - self.min_oc),
            ("max_ec", self.max_ec),
            ("max_mat_cost", self.max_mat_cost),
            ("max_berdo_fine", self.max_berdo_fine),
            ("longrun_max - longrun_min", self.longrun_max() - self.longrun_min()),
            ("longrun_guard", self.longrun_guard),
            ("floor", self.floor),
        ];
        if let Some((name, w)) = widths.iter().find(|(_, w)| *w <= 0.0) {
            return Err(Error::InvalidNormalization(format!("{name} must be positive, got {w}")));
        }
        Ok(())
    }
}

impl Default for NormalizationConstants {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Shape of the objective vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemVariant {
    /// Operational carbon, embodied carbon, BERDO fine.
    ThreeObjective,
    /// Operational carbon, embodied carbon, long-run cost, material cost.
    FourObjective,
}

impl ProblemVariant {
    /// Number of objectives this variant produces.
    #[must_use]
    pub const fn n_objectives(self) -> usize {
        match self {
            Self::ThreeObjective => 3,
            Self::FourObjective => 4,
        }
    }
}

/// Named KPI quantities returned by the simulator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawKpis(BTreeMap<String, f64>);

impl RawKpis {
    /// Annual operational emissions, kg.
    pub const OPERATIONAL_CARBON_KG: &'static str = "operational_carbon_kg";
    /// Embodied carbon of the installed measures, kg.
    pub const EMBODIED_CARBON_KG: &'static str = "embodied_carbon_kg";
    /// Projected BERDO compliance fine, USD.
    pub const BERDO_FINE_USD: &'static str = "berdo_fine_usd";
    /// Up-front material cost, USD.
    pub const MATERIAL_COST_USD: &'static str = "material_cost_usd";
    /// Discounted utility cost over the study horizon, USD.
    pub const UTILITY_COST_USD: &'static str = "utility_cost_usd";

    /// Creates an empty KPI map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Returns the value of `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn require(&self, name: &str) -> Result<f64> {
        let value = self.get(name).ok_or_else(|| Error::MissingKpi(name.to_string()))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::NonFiniteKpi {
                name: name.to_string(),
                value,
            })
        }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for RawKpis {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Fixed-length minimization vector handed to the search engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectiveVector(Vec<f64>);

impl ObjectiveVector {
    /// Wraps raw objective values.
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// The failure vector: `f64::MAX` in each of `n` slots.
    #[must_use]
    pub fn sentinel(n: usize) -> Self {
        Self(vec![f64::MAX; n])
    }

    /// Returns `true` if every slot holds the failure value.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_sentinel(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&v| v == f64::MAX)
    }

    /// Number of objectives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the vector has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the values.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Unwraps the values.
    #[must_use]
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for ObjectiveVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl AsRef<[f64]> for ObjectiveVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Raw and derived quantities behind one objective vector, kept for logs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBreakdown {
    pub operational_carbon_kg: f64,
    /// After flooring.
    pub embodied_carbon_kg: f64,
    pub berdo_fine_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utility_cost_usd: Option<f64>,
    /// Utility cost above the baseline plus the fine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longrun_cost_usd: Option<f64>,
    /// After flooring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_cost_usd: Option<f64>,
    pub normalized_objective_values: ObjectiveVector,
}

/// Maps [`RawKpis`] to an [`ObjectiveVector`] for one [`ProblemVariant`].
///
/// Pure and cheap to clone; share one per run.
#[derive(Clone, Debug)]
pub struct ObjectiveNormalizer {
    constants: NormalizationConstants,
    variant: ProblemVariant,
}

impl ObjectiveNormalizer {
    /// Creates a normalizer after validating `constants`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNormalization`] if the constants are unusable.
    pub fn new(constants: NormalizationConstants, variant: ProblemVariant) -> Result<Self> {
        constants.validate()?;
        Ok(Self { constants, variant })
    }

    /// A normalizer over [`NormalizationConstants::canonical`].
    #[must_use]
    pub fn canonical(variant: ProblemVariant) -> Self {
        Self {
            constants: NormalizationConstants::canonical(),
            variant,
        }
    }

    #[must_use]
    pub fn constants(&self) -> &NormalizationConstants {
        &self.constants
    }

    #[must_use]
    pub fn variant(&self) -> ProblemVariant {
        self.variant
    }

    #[must_use]
    pub fn n_objectives(&self) -> usize {
        self.variant.n_objectives()
    }

    /// The failure vector for this variant.
    #[must_use]
    pub fn sentinel(&self) -> ObjectiveVector {
        ObjectiveVector::sentinel(self.n_objectives())
    }

    /// Scales and negates the KPIs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingKpi`] if a quantity the variant needs is absent
    /// and [`Error::NonFiniteKpi`] if one is NaN or infinite.
    pub fn normalize(&self, kpis: &RawKpis) -> Result<(ObjectiveVector, ObjectiveBreakdown)> {
        let c = &self.constants;
        let floored = |v: f64| if v <= 0.0 { c.floor } else { v };

        let oc = kpis.require(RawKpis::OPERATIONAL_CARBON_KG)?;
        let ec = floored(kpis.require(RawKpis::EMBODIED_CARBON_KG)?);
        let fine = kpis.require(RawKpis::BERDO_FINE_USD)?;

        let oc_n = (oc - c.min_oc) / (c.max_oc - c.min_oc);
        let ec_n = ec / c.max_ec;

        match self.variant {
            ProblemVariant::ThreeObjective => {
                let fine = floored(fine);
                let fine_n = fine / c.max_berdo_fine;
                let objective = ObjectiveVector(vec![-oc_n, -ec_n, -fine_n]);
                let breakdown = ObjectiveBreakdown {
                    operational_carbon_kg: oc,
                    embodied_carbon_kg: ec,
                    berdo_fine_usd: fine,
                    utility_cost_usd: None,
                    longrun_cost_usd: None,
                    material_cost_usd: None,
                    normalized_objective_values: objective.clone(),
                };
                Ok((objective, breakdown))
            }
            ProblemVariant::FourObjective => {
                let util = kpis.require(RawKpis::UTILITY_COST_USD)?;
                let mat = floored(kpis.require(RawKpis::MATERIAL_COST_USD)?);

                let net_longrun = (util - c.utility_cost_baseline) + fine;
                let lr_min = c.longrun_min();
                let lr_width = (c.longrun_max() - lr_min).max(c.longrun_guard);
                let lr_n = (net_longrun - lr_min) / lr_width;
                let mat_n = mat / c.max_mat_cost;

                let objective = ObjectiveVector(vec![-oc_n, -ec_n, -lr_n, -mat_n]);
                let breakdown = ObjectiveBreakdown {
                    operational_carbon_kg: oc,
                    embodied_carbon_kg: ec,
                    berdo_fine_usd: fine,
                    utility_cost_usd: Some(util),
                    longrun_cost_usd: Some(net_longrun),
                    material_cost_usd: Some(mat),
                    normalized_objective_values: objective.clone(),
                };
                Ok((objective, breakdown))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_kpis() -> RawKpis {
        RawKpis::new()
            .with(RawKpis::OPERATIONAL_CARBON_KG, 3_000_000.0)
            .with(RawKpis::EMBODIED_CARBON_KG, 200_000.0)
            .with(RawKpis::BERDO_FINE_USD, 50_000.0)
            .with(RawKpis::MATERIAL_COST_USD, 400_000.0)
            .with(RawKpis::UTILITY_COST_USD, 2_000_000.0)
    }

    #[test]
    fn canonical_constants_validate() {
        NormalizationConstants::canonical().validate().unwrap();
    }

    #[test]
    fn longrun_bounds() {
        let c = NormalizationConstants::canonical();
        assert!((c.longrun_min() - (1_638_838.0 - 2_184_813.0 + 74_620.0)).abs() < 1e-9);
        assert!((c.longrun_max() - (3_693_027.0 - 2_184_813.0)).abs() < 1e-9);
    }

    #[test]
    fn four_objective_values() {
        let n = ObjectiveNormalizer::canonical(ProblemVariant::FourObjective);
        let (v, b) = n.normalize(&four_kpis()).unwrap();
        let c = n.constants();

        let oc_n = (3_000_000.0 - c.min_oc) / (c.max_oc - c.min_oc);
        let net = (2_000_000.0 - c.utility_cost_baseline) + 50_000.0;
        let lr_n = (net - c.longrun_min()) / (c.longrun_max() - c.longrun_min());
        let expected = [-oc_n, -200_000.0 / c.max_ec, -lr_n, -400_000.0 / c.max_mat_cost];

        assert_eq!(v.len(), 4);
        for (got, want) in v.as_slice().iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
        assert_eq!(b.longrun_cost_usd, Some(net));
        assert_eq!(b.normalized_objective_values, v);
    }

    #[test]
    fn three_objective_ignores_cost_keys() {
        let kpis = RawKpis::new()
            .with(RawKpis::OPERATIONAL_CARBON_KG, 1_355_578.0)
            .with(RawKpis::EMBODIED_CARBON_KG, 476_657.0)
            .with(RawKpis::BERDO_FINE_USD, 245_000.0);
        let n = ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective);
        let (v, b) = n.normalize(&kpis).unwrap();
        assert_eq!(v.len(), 3);
        assert!(v.as_slice()[0].abs() < 1e-12);
        assert!((v.as_slice()[1] + 1.0).abs() < 1e-12);
        assert!((v.as_slice()[2] + 0.5).abs() < 1e-12);
        assert!(b.utility_cost_usd.is_none());
    }

    #[test]
    fn non_positive_values_are_floored() {
        let kpis = four_kpis()
            .with(RawKpis::EMBODIED_CARBON_KG, 0.0)
            .with(RawKpis::MATERIAL_COST_USD, -5.0);
        let n = ObjectiveNormalizer::canonical(ProblemVariant::FourObjective);
        let (v, b) = n.normalize(&kpis).unwrap();
        assert!((b.embodied_carbon_kg - 1.0).abs() < f64::EPSILON);
        assert_eq!(b.material_cost_usd, Some(1.0));
        assert!((v.as_slice()[1] + 1.0 / 476_657.0).abs() < 1e-15);
    }

    #[test]
    fn zero_fine_is_floored_in_three_objective() {
        let kpis = four_kpis().with(RawKpis::BERDO_FINE_USD, 0.0);
        let n = ObjectiveNormalizer::canonical(ProblemVariant::ThreeObjective);
        let (v, _) = n.normalize(&kpis).unwrap();
        assert!((v.as_slice()[2] + 1.0 / 490_000.0).abs() < 1e-15);
    }

    #[test]
    fn missing_and_non_finite_kpis() {
        let n = ObjectiveNormalizer::canonical(ProblemVariant::FourObjective);
        let mut kpis = four_kpis();
        kpis.0.remove(RawKpis::UTILITY_COST_USD);
        assert!(matches!(
            n.normalize(&kpis),
            Err(Error::MissingKpi(k)) if k == RawKpis::UTILITY_COST_USD
        ));

        let kpis = four_kpis().with(RawKpis::OPERATIONAL_CARBON_KG, f64::NAN);
        assert!(matches!(n.normalize(&kpis), Err(Error::NonFiniteKpi { .. })));
    }

    #[test]
    fn invalid_constants_are_rejected() {
        let mut c = NormalizationConstants::canonical();
        c.max_oc = c.min_oc;
        assert!(matches!(
            ObjectiveNormalizer::new(c, ProblemVariant::FourObjective),
            Err(Error::InvalidNormalization(_))
        ));

        let mut c = NormalizationConstants::canonical();
        c.max_ec = f64::INFINITY;
        assert!(c.validate().is_err());

        let mut c = NormalizationConstants::canonical();
        c.utility_cost_max = c.utility_cost_min;
        assert!(c.validate().is_err());
    }

    #[test]
    fn constants_json_defaults_guards() {
        let json = r#"{
            "version": "test",
            "min_oc": 0, "max_oc": 10, "max_ec": 10, "max_mat_cost": 10,
            "utility_cost_baseline": 5, "utility_cost_min": 0, "utility_cost_max": 10,
            "net_berdo_min": 0, "max_berdo_fine": 10
        }"#;
        let c = NormalizationConstants::from_json_str(json).unwrap();
        assert!((c.floor - 1.0).abs() < f64::EPSILON);
        assert!((c.longrun_guard - 1.0).abs() < f64::EPSILON);
        assert_eq!(c.version, "test");
    }

    #[test]
    fn guard_only_widens_the_longrun_denominator() {
        let json = r#"{
            "version": "narrow",
            "min_oc": 0, "max_oc": 0.5, "max_ec": 0.5, "max_mat_cost": 0.5,
            "utility_cost_baseline": 0, "utility_cost_min": 0, "utility_cost_max": 0.5,
            "net_berdo_min": 0, "max_berdo_fine": 0.5
        }"#;
        let constants = NormalizationConstants::from_json_str(json).unwrap();
        let n = ObjectiveNormalizer::new(constants, ProblemVariant::FourObjective).unwrap();
        let kpis = RawKpis::new()
            .with(RawKpis::OPERATIONAL_CARBON_KG, 0.25)
            .with(RawKpis::EMBODIED_CARBON_KG, 0.25)
            .with(RawKpis::BERDO_FINE_USD, 0.05)
            .with(RawKpis::MATERIAL_COST_USD, 0.25)
            .with(RawKpis::UTILITY_COST_USD, 0.2);

        let (v, _) = n.normalize(&kpis).unwrap();
        // Long-run width 0.5 is raised to the guard of 1; the others are not.
        let expected = [-0.5, -0.5, -0.25, -0.5];
        for (got, want) in v.as_slice().iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} vs {want}");
        }
    }

    #[test]
    fn sentinel_vector() {
        let s = ObjectiveVector::sentinel(4);
        assert!(s.is_sentinel());
        assert_eq!(s.len(), 4);
        assert!(!ObjectiveVector::new(vec![f64::MAX, 0.0]).is_sentinel());
        assert!(!ObjectiveVector::sentinel(0).is_sentinel());
        assert_eq!(serde_json::to_string(&ObjectiveVector::new(vec![-0.5])).unwrap(), "[-0.5]");
    }
}
