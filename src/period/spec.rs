//! Period specification and rotation delay
//!
//! A period specification combines a granularity with a positive multiplier
//! (for example "every 15 minutes") and the convention for the first day of
//! the week. Specifications are validated when built so that a bad explicit
//! period is rejected before any file is opened.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::period::{Granularity, PeriodError, PeriodResult};

/// First day of a week-granularity period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    /// Weeks start on Sunday (`%U`)
    #[default]
    Sunday,
    /// Weeks start on Monday (`%W`)
    Monday,
}

impl fmt::Display for WeekStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekStart::Sunday => write!(f, "sunday"),
            WeekStart::Monday => write!(f, "monday"),
        }
    }
}

/// How often a log file is rotated
///
/// Serialized as its display form, e.g. `"15 minutes"`. The week start is
/// configured separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodSpec {
    granularity: Granularity,
    multiplier: u32,
    week_start: WeekStart,
}

impl Default for PeriodSpec {
    fn default() -> Self {
        Self::once_only()
    }
}

impl fmt::Display for PeriodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multiplier == 1 || !self.granularity.rotates() {
            write!(f, "{}", self.granularity)
        } else {
            write!(f, "{} {}s", self.multiplier, self.granularity)
        }
    }
}

impl TryFrom<String> for PeriodSpec {
    type Error = PeriodError;

    fn try_from(text: String) -> PeriodResult<Self> {
        Self::parse(&text)
    }
}

impl From<PeriodSpec> for String {
    fn from(spec: PeriodSpec) -> Self {
        spec.to_string()
    }
}

impl PeriodSpec {
    /// Create a validated period specification
    pub fn new(granularity: Granularity, multiplier: u32) -> PeriodResult<Self> {
        let spec = Self {
            granularity,
            multiplier,
            week_start: WeekStart::default(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// A period that never ends
    pub fn once_only() -> Self {
        Self {
            granularity: Granularity::OnceOnly,
            multiplier: 1,
            week_start: WeekStart::default(),
        }
    }

    /// Set the week start convention
    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    /// Parse a period such as `"15 minutes"`, `"2w"` or `"hour"`
    pub fn parse(text: &str) -> PeriodResult<Self> {
        let (count, unit) = split_count(text)?;
        let granularity = Granularity::from_str(unit)?;
        let multiplier = match count {
            Some(n) if n <= 0 => {
                return Err(PeriodError::multiplier(granularity.name(), 0, "must be at least 1"))
            }
            Some(n) => u32::try_from(n)
                .map_err(|_| PeriodError::malformed(format!("multiplier too large in {:?}", text)))?,
            None => 1,
        };
        Self::new(granularity, multiplier)
    }

    /// Check the multiplier against the natural cycle of the granularity
    pub fn validate(&self) -> PeriodResult<()> {
        let n = self.multiplier;
        let unit = self.granularity.name();
        if n == 0 {
            return Err(PeriodError::multiplier(unit, n, "must be at least 1"));
        }

        let within_cycle = |cycle: u32, next: &str| {
            if n >= cycle || cycle % n != 0 {
                Err(PeriodError::multiplier(
                    unit,
                    n,
                    format!("must divide the {} {}s in a {}", cycle, unit, next),
                ))
            } else {
                Ok(())
            }
        };

        match self.granularity {
            Granularity::Second => within_cycle(60, "minute"),
            Granularity::Minute => within_cycle(60, "hour"),
            Granularity::Hour => within_cycle(24, "day"),
            Granularity::Month => within_cycle(12, "year"),
            Granularity::Day if n > 365 => {
                Err(PeriodError::multiplier(unit, n, "must be at most 365"))
            }
            Granularity::Week if n > 52 => {
                Err(PeriodError::multiplier(unit, n, "must be at most 52"))
            }
            Granularity::OnceOnly | Granularity::Unspecified if n != 1 => {
                Err(PeriodError::multiplier(unit, n, "cannot be repeated"))
            }
            _ => Ok(()),
        }
    }

    /// Get the granularity
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Get the multiplier
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Get the week start convention
    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    /// Whether files are ever rotated under this specification
    pub fn rotates(&self) -> bool {
        self.granularity.rotates()
    }

    /// Shortest nominal length of one period in seconds
    pub fn nominal_seconds(&self) -> Option<i64> {
        self.granularity
            .nominal_seconds()
            .map(|secs| secs * i64::from(self.multiplier))
    }
}

/// Offset applied to every period boundary
///
/// A positive delay postpones the switch to a new file: with hourly rotation
/// and a five minute delay, data written at 10:03 still goes to the 09:00
/// file and the 10:00 file is opened at 10:05.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RotationDelay {
    granularity: Granularity,
    amount: i64,
}

impl fmt::Display for RotationDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}s", self.amount, self.granularity)
    }
}

impl TryFrom<String> for RotationDelay {
    type Error = PeriodError;

    fn try_from(text: String) -> PeriodResult<Self> {
        Self::parse(&text)
    }
}

impl From<RotationDelay> for String {
    fn from(delay: RotationDelay) -> Self {
        delay.to_string()
    }
}

impl RotationDelay {
    /// Create a delay of `amount` units
    pub fn new(granularity: Granularity, amount: i64) -> PeriodResult<Self> {
        if granularity.nominal_seconds().is_none() {
            return Err(PeriodError::delay(format!(
                "{} is not a unit of time",
                granularity
            )));
        }
        Ok(Self { granularity, amount })
    }

    /// Parse a delay such as `"5 minutes"` or `"-30s"`
    pub fn parse(text: &str) -> PeriodResult<Self> {
        let (count, unit) = split_count(text)?;
        Self::new(Granularity::from_str(unit)?, count.unwrap_or(1))
    }

    /// Get the unit the delay is expressed in
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Delay in seconds
    pub fn seconds(&self) -> i64 {
        self.granularity
            .nominal_seconds()
            .map_or(0, |secs| secs.saturating_mul(self.amount))
    }

    /// Check that the delay fits inside one period of `spec`
    pub fn validate_for(&self, spec: &PeriodSpec) -> PeriodResult<()> {
        let period = spec.nominal_seconds().ok_or_else(|| {
            PeriodError::delay(format!("a {} period has no boundary to delay", spec.granularity()))
        })?;

        if self.granularity > spec.granularity() {
            return Err(PeriodError::delay(format!(
                "unit {} is coarser than the {} period",
                self.granularity,
                spec.granularity()
            )));
        }

        if self.seconds().unsigned_abs() >= period.unsigned_abs() {
            return Err(PeriodError::delay(format!(
                "{} is not shorter than one {} period",
                self, spec
            )));
        }

        Ok(())
    }
}

/// Split `"15 minutes"` into an optional signed count and a unit name
fn split_count(text: &str) -> PeriodResult<(Option<i64>, &str)> {
    let trimmed = text.trim();
    let digits_end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);

    let (number, unit) = trimmed.split_at(digits_end);
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(PeriodError::malformed(format!("missing unit in {:?}", text)));
    }

    let count = match number {
        "" => None,
        n => Some(
            n.parse::<i64>()
                .map_err(|_| PeriodError::malformed(format!("bad number in {:?}", text)))?,
        ),
    };

    Ok((count, unit))
}
