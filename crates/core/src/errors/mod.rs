//! Error types and Result alias for the Rally reward engine

use thiserror::Error;

/// Main error type for the reward engine.
///
/// "Already granted" is deliberately NOT an error: a repeated claim is a
/// success no-op and is reported through [`crate::GrantOutcome`] instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl Error {
    /// Whether the caller may retry the failed operation (store hiccups only;
    /// eligibility and balance failures are final until state changes).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::DatabaseError(_))
    }
}
