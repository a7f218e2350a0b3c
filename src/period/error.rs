//! Error types for the period module
//!
//! Defines error types for parsing and validating rotation periods.

use thiserror::Error;

/// Errors that can occur while building a period specification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// Unit name was not recognized
    #[error("Unknown period unit: {0}")]
    UnknownUnit(String),

    /// Period text could not be parsed at all
    #[error("Malformed period: {0}")]
    Malformed(String),

    /// Multiplier is not compatible with the unit's natural cycle
    #[error("Invalid multiplier {value} for {unit}: {reason}")]
    Multiplier {
        unit: String,
        value: u32,
        reason: String,
    },

    /// Delay is out of range for the period it skews
    #[error("Invalid delay: {0}")]
    Delay(String),

    /// Template contains conversions the formatter cannot render
    #[error("Invalid template: {0}")]
    Template(String),
}

/// Result type for period operations
pub type PeriodResult<T> = std::result::Result<T, PeriodError>;

impl PeriodError {
    /// Create a new multiplier error
    pub fn multiplier(unit: impl Into<String>, value: u32, reason: impl Into<String>) -> Self {
        Self::Multiplier {
            unit: unit.into(),
            value,
            reason: reason.into(),
        }
    }

    /// Create a new malformed period error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Create a new delay error
    pub fn delay(message: impl Into<String>) -> Self {
        Self::Delay(message.into())
    }
}
