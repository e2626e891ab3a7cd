//! Common error types for SPX

use crate::period::Period;
use thiserror::Error;

/// Common result type for SPX operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SPX crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid caller input (malformed period, empty id list, bad row field)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No active commission rule set covers the period
    #[error("No commission rules configured for period {0}")]
    RulesMissing(Period),

    /// Internal error (corrupt stored value, unexpected state)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error must unwind the enclosing transaction.
    ///
    /// Storage faults and a missing rule set abort a run; everything else is
    /// local to a single row or salesperson.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Database(_) | Error::RulesMissing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let period: Period = "2024-06".parse().unwrap();
        assert!(Error::RulesMissing(period).is_fatal());
        assert!(Error::Database(sqlx::Error::RowNotFound).is_fatal());
        assert!(!Error::InvalidInput("x".into()).is_fatal());
        assert!(!Error::Internal("x".into()).is_fatal());
        assert!(!Error::NotFound("x".into()).is_fatal());
    }

    #[test]
    fn test_rules_missing_message_names_period() {
        let period: Period = "2023-11".parse().unwrap();
        let msg = Error::RulesMissing(period).to_string();
        assert!(msg.contains("2023-11"), "unexpected message: {}", msg);
    }
}
