//! Error handling for cronolog
//!
//! This module provides error types and result aliases for rotation operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::period::PeriodError;

/// Errors that can occur while configuring or running the rotator
#[derive(Error, Debug)]
pub enum Error {
    /// Errors related to configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Explicit period or delay is malformed or out of range
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Filename template cannot be rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Start time override could not be parsed
    #[error("Invalid start time: {0}")]
    StartTime(String),

    /// Rendered path exceeds the configured maximum
    #[error("Rendered path is {len} bytes, maximum is {max}")]
    PathTooLong {
        len: usize,
        max: usize,
    },

    /// Target file could not be opened even after creating its directories
    #[error("Cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Write to the active target failed
    #[error("Write to {path:?} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the input stream failed
    #[error("Input read error: {0}")]
    Input(#[source] io::Error),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An instant fell outside the representable calendar range
    #[error("Time out of range: {0}")]
    TimeOutOfRange(String),
}

/// Result type for cronolog operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new invalid period error
    pub fn invalid_period(message: impl Into<String>) -> Self {
        Self::InvalidPeriod(message.into())
    }

    /// Create a new template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }

    /// Create a new start time error
    pub fn start_time(message: impl Into<String>) -> Self {
        Self::StartTime(message.into())
    }

    /// Create a new open error
    pub fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Create a new write error
    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Create a new time range error
    pub fn time_out_of_range(message: impl Into<String>) -> Self {
        Self::TimeOutOfRange(message.into())
    }

    /// Check if this error was detected while validating configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidPeriod(_)
                | Self::Template(_)
                | Self::StartTime(_)
        )
    }

    /// Check if this is a fatal output error (path, open or write)
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::PathTooLong { .. } | Self::Open { .. } | Self::Write { .. }
        )
    }

    /// Check if this is an input error
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Process exit code for this error
    ///
    /// A clean end of input exits with 0 and never reaches this.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_)
            | Self::InvalidPeriod(_)
            | Self::Template(_)
            | Self::StartTime(_) => 1,
            Self::Open { .. } | Self::PathTooLong { .. } => 2,
            Self::Input(_) => 4,
            Self::Write { .. } => 5,
            Self::Io(_) | Self::TimeOutOfRange(_) => 6,
        }
    }

    /// Get a user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidPeriod(_) => Some(
                "Use a multiplier that divides the next larger unit, e.g. \"15 minutes\" or \"6 hours\"".to_string(),
            ),
            Self::StartTime(_) => Some(
                "Expected a date such as \"15 May 2023 12:30\" (or \"May 15 2023 12:30\" with --american)".to_string(),
            ),
            Self::Open { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
                Some("Verify permissions on the log directory".to_string())
            }
            Self::Write { .. } => Some("Check available disk space".to_string()),
            _ => None,
        }
    }
}

impl From<PeriodError> for Error {
    fn from(err: PeriodError) -> Self {
        match err {
            PeriodError::Template(msg) => Self::Template(msg),
            other => Self::InvalidPeriod(other.to_string()),
        }
    }
}
