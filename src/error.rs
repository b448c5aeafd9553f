#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when categorical or ordinal choices are empty.
    #[error("choices for '{0}' cannot be empty")]
    EmptyChoices(String),

    /// Returned when a configuration names a measure the search space does not declare.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Returned when a configuration value lies outside its parameter's domain.
    #[error("value '{value}' is outside the domain of '{name}'")]
    ValueOutOfDomain {
        /// The parameter name.
        name: String,
        /// The offending value.
        value: String,
    },

    /// Returned when a unit vector does not match the search-space dimensionality.
    #[error("dimension mismatch: expected {expected} coordinates, got {got}")]
    DimensionMismatch {
        /// The number of declared parameters.
        expected: usize,
        /// The number of coordinates supplied.
        got: usize,
    },

    /// Returned when the search space has more dimensions than the Sobol generator supports.
    #[error("search space has {got} dimensions but at most {max} are supported")]
    TooManyDimensions {
        /// The number of declared parameters.
        got: usize,
        /// The generator limit.
        max: usize,
    },

    /// Returned when a raw KPI payload lacks a required quantity.
    #[error("missing KPI '{0}'")]
    MissingKpi(String),

    /// Returned when a raw KPI is NaN or infinite.
    #[error("KPI '{name}' is not finite ({value})")]
    NonFiniteKpi {
        /// The quantity name.
        name: String,
        /// The offending value.
        value: f64,
    },

    /// Returned when a normalization constant set is unusable.
    #[error("invalid normalization constants: {0}")]
    InvalidNormalization(String),

    /// Returned when an objective vector has the wrong number of components.
    #[error("objective dimension mismatch: expected {expected} values, got {got}")]
    ObjectiveDimensionMismatch {
        /// The expected number of objective values.
        expected: usize,
        /// The actual number of objective values.
        got: usize,
    },

    /// Returned when a configuration artifact cannot be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Returned when reading or writing an evaluation or summary log fails.
    #[error("storage error: {0}")]
    Storage(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Returned when an async task fails.
    #[cfg(feature = "async")]
    #[error("async task error: {0}")]
    TaskError(String),
}

/// Crate result type. The error parameter defaults to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
