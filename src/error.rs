use failure::Fail;

#[derive(Debug, Fail)]
pub enum SyncError {
    /// Not enough samples for the requested window or block
    #[fail(display = "need at least {} samples for {}, got {}", needed, what, available)]
    OutOfRange {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[fail(display = "invalid pilot set: {}", _0)]
    InvalidPilotSet(String),
    #[fail(display = "{} has length {}, expected {}", what, actual, expected)]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Zero, negative or non-finite variance/energy handed to an estimator
    #[fail(display = "{} must be positive and finite, got {}", what, value)]
    NumericDegeneracy { what: &'static str, value: f64 },
    #[fail(display = "could not load configuration: {}", _0)]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Shared guard for energies, variances and periods
pub(crate) fn ensure_positive(what: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0. {
        Ok(())
    } else {
        Err(SyncError::NumericDegeneracy { what, value })
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Config(e.to_string())
    }
}
