//! Rotation granularity
//!
//! Defines the fixed set of time units a log file can be rotated at.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::period::{PeriodError, PeriodResult, SECS_PER_DAY, SECS_PER_HOUR, SECS_PER_MIN, SECS_PER_WEEK};

/// Rotation granularity
///
/// Variants are declared finest first, so the derived ordering puts
/// `Second < Minute < ... < Year < OnceOnly < Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// A new file every second
    Second,
    /// A new file every minute
    Minute,
    /// A new file every hour
    Hour,
    /// A new file every day
    Day,
    /// A new file every week
    Week,
    /// A new file every month
    Month,
    /// A new file every year
    Year,
    /// A single file that is never rotated
    OnceOnly,
    /// Not yet determined
    Unspecified,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::Unspecified
    }
}

impl Granularity {
    /// Parse a unit name such as `"min"`, `"hours"` or `"week"`
    pub fn from_str(s: &str) -> PeriodResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(Self::Second),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(Self::Minute),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(Self::Hour),
            "d" | "day" | "days" => Ok(Self::Day),
            "w" | "wk" | "wks" | "week" | "weeks" => Ok(Self::Week),
            "mon" | "mons" | "month" | "months" => Ok(Self::Month),
            "y" | "yr" | "yrs" | "year" | "years" => Ok(Self::Year),
            "once" | "once-only" | "once_only" | "never" => Ok(Self::OnceOnly),
            other => Err(PeriodError::UnknownUnit(other.to_string())),
        }
    }

    /// Get the name of the granularity
    pub fn name(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::OnceOnly => "once-only",
            Self::Unspecified => "unspecified",
        }
    }

    /// Whether files of this granularity are ever rotated
    pub fn rotates(&self) -> bool {
        *self < Self::OnceOnly
    }

    /// Shortest length of one unit in seconds, ignoring DST
    ///
    /// Months count as 28 days and years as 365 days.
    pub fn nominal_seconds(&self) -> Option<i64> {
        match self {
            Self::Second => Some(1),
            Self::Minute => Some(SECS_PER_MIN),
            Self::Hour => Some(SECS_PER_HOUR),
            Self::Day => Some(SECS_PER_DAY),
            Self::Week => Some(SECS_PER_WEEK),
            Self::Month => Some(28 * SECS_PER_DAY),
            Self::Year => Some(365 * SECS_PER_DAY),
            Self::OnceOnly | Self::Unspecified => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_ordering() {
        assert!(Granularity::Second < Granularity::Minute);
        assert!(Granularity::Day < Granularity::Week);
        assert!(Granularity::Year < Granularity::OnceOnly);
        assert!(Granularity::OnceOnly < Granularity::Unspecified);
        assert_eq!(Granularity::Day.min(Granularity::Month), Granularity::Day);
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!(Granularity::from_str("minutes").unwrap(), Granularity::Minute);
        assert_eq!(Granularity::from_str("H").unwrap(), Granularity::Hour);
        assert_eq!(Granularity::from_str("mon").unwrap(), Granularity::Month);
        assert_eq!(Granularity::from_str("weeks").unwrap(), Granularity::Week);
        assert!(matches!(
            Granularity::from_str("fortnight"),
            Err(PeriodError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_granularity_rotation() {
        let rotating = [
            Granularity::Second,
            Granularity::Minute,
            Granularity::Hour,
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
            Granularity::Year,
        ];
        for g in rotating {
            assert!(g.rotates());
            assert!(g.nominal_seconds().is_some());
        }
        assert!(!Granularity::OnceOnly.rotates());
        assert_eq!(Granularity::OnceOnly.to_string(), "once-only");
    }
}
