//! Time period management for log rotation
//!
//! This module decides when a log file ends. A filename template is scanned
//! for strftime conversions to infer how often files rotate, and the period
//! clock computes the exact local-time boundaries of each period, including
//! corrections for daylight saving time transitions.

mod clock;
mod error;
mod granularity;
mod spec;
mod template;

pub use clock::{PeriodClock, Periods};
pub use error::{PeriodError, PeriodResult};
pub use granularity::Granularity;
pub use spec::{PeriodSpec, RotationDelay, WeekStart};
pub use template::{infer_granularity, FilenameTemplate, TemplateAnalysis};

pub(crate) const SECS_PER_MIN: i64 = 60;
pub(crate) const SECS_PER_HOUR: i64 = 60 * SECS_PER_MIN;
pub(crate) const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
pub(crate) const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;

/// Slack added when overshooting into the next sub-day period (leap seconds)
pub(crate) const LEAP_SECOND_ALLOWANCE: i64 = 2;
/// Slack added when overshooting into the next day-or-longer period
pub(crate) const DST_ALLOWANCE: i64 = 3 * SECS_PER_HOUR + LEAP_SECOND_ALLOWANCE;
