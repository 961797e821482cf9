//! Error types.

use thiserror::Error;

/// Errors returned by histograms, snapshots and the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A non-finite observation was passed to a histogram.
    #[error("invalid value: {0} is not finite")]
    InvalidValue(f64),

    /// A percentile outside of `[0, 1]` was requested.
    #[error("invalid percentile: {0} is outside [0, 1]")]
    InvalidPercentile(f64),

    /// A different metric is already bound to this name.
    #[error("metric already registered: {0}")]
    AlreadyRegistered(String),

    /// The metric bound to this name is of another kind.
    #[error("metric {name} is not a {expected}")]
    TypeMismatch {
        /// Name that was looked up.
        name: String,
        /// Kind the caller asked for.
        expected: &'static str,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[test]
fn display() {
    assert_eq!(
        Error::InvalidPercentile(1.5).to_string(),
        "invalid percentile: 1.5 is outside [0, 1]"
    );
    assert_eq!(
        Error::TypeMismatch {
            name: "x".into(),
            expected: "counter",
        }
        .to_string(),
        "metric x is not a counter"
    );
}
