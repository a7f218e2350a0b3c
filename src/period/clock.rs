//! Period boundary computation
//!
//! The clock maps any instant to the start of the rotation period containing
//! it, measured in local wall-clock time. Boundaries are found by breaking the
//! instant down into local calendar fields and subtracting the time elapsed
//! since the nominal boundary. Because a day-or-longer span may cross a
//! daylight saving transition, the result is broken down once more and the
//! residual difference from the expected wall-clock boundary is added back.
//!
//! The start of the next period is found without any calendar increment
//! logic: a generous upper bound for one period is added and the result is
//! normalized back to the start of the period it falls in.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use tracing::debug;

use crate::period::{
    Granularity, PeriodSpec, WeekStart, DST_ALLOWANCE, LEAP_SECOND_ALLOWANCE, SECS_PER_DAY,
    SECS_PER_HOUR, SECS_PER_MIN, SECS_PER_WEEK,
};

/// Attempts made to step past a period whose length exceeds the overshoot
const MAX_OVERSHOOT_ATTEMPTS: i64 = 4;

/// Computes period boundaries for one period specification in one time zone
#[derive(Debug, Clone)]
pub struct PeriodClock<Tz: TimeZone> {
    tz: Tz,
    spec: PeriodSpec,
}

impl<Tz: TimeZone> PeriodClock<Tz> {
    /// Create a clock for `spec` in the zone `tz`
    pub fn new(tz: Tz, spec: PeriodSpec) -> Self {
        Self { tz, spec }
    }

    /// Get the period specification
    pub fn spec(&self) -> &PeriodSpec {
        &self.spec
    }

    /// Express `t` in the clock's time zone
    pub fn local(&self, t: DateTime<Utc>) -> DateTime<Tz> {
        t.with_timezone(&self.tz)
    }

    /// Sentinel returned when a period never ends
    pub fn far_future() -> DateTime<Utc> {
        DateTime::<Utc>::MAX_UTC
    }

    /// Start of the period containing `t`
    ///
    /// Periods finer than a second do not exist, so sub-second precision is
    /// dropped. Once-only periods have no start; `t` is returned unchanged.
    pub fn start_of_period(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        if !self.spec.rotates() {
            return t;
        }

        let local = self.wall_clock(t);
        let Some(target) = self.boundary_wall_clock(&local) else {
            return t;
        };

        let elapsed = (local - target).num_seconds();
        let nominal = t.timestamp() - elapsed;
        let start = self.correct_dst(nominal, &target);

        DateTime::from_timestamp(start, 0).unwrap_or(t)
    }

    /// Start of the period following the one containing `t`
    ///
    /// Returns [`PeriodClock::far_future`] for once-only periods.
    pub fn start_of_next_period(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let Some((length, allowance)) = self.overshoot() else {
            return Self::far_future();
        };

        let start = self.start_of_period(t);
        let base = start.timestamp();

        // A period can be longer than its nominal length when it spans a
        // repeated DST hour, so keep stepping until normalization moves forward.
        for attempt in 1..=MAX_OVERSHOOT_ATTEMPTS {
            let probe = length
                .checked_mul(attempt)
                .and_then(|len| len.checked_add(allowance))
                .and_then(|offset| base.checked_add(offset))
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            let Some(probe) = probe else {
                return Self::far_future();
            };

            let next = self.start_of_period(probe);
            if next > start {
                return next;
            }
            debug!(start = %start, probe = %probe, attempt, "overshoot landed in the same period");
        }

        base.checked_add(length)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Self::far_future)
    }

    /// Iterate over successive period starts, beginning with the period containing `from`
    pub fn periods(&self, from: DateTime<Utc>) -> Periods<'_, Tz> {
        Periods {
            clock: self,
            next: Some(self.start_of_period(from)),
        }
    }

    /// Upper bound on one period plus slack, in seconds
    fn overshoot(&self) -> Option<(i64, i64)> {
        let n = i64::from(self.spec.multiplier());
        match self.spec.granularity() {
            Granularity::Year => Some((366 * SECS_PER_DAY * n, DST_ALLOWANCE)),
            Granularity::Month => Some((31 * SECS_PER_DAY * n, DST_ALLOWANCE)),
            Granularity::Week => Some((SECS_PER_WEEK * n, DST_ALLOWANCE)),
            Granularity::Day => Some((SECS_PER_DAY * n, DST_ALLOWANCE)),
            Granularity::Hour => Some((SECS_PER_HOUR * n, LEAP_SECOND_ALLOWANCE)),
            Granularity::Minute => Some((SECS_PER_MIN * n, LEAP_SECOND_ALLOWANCE)),
            Granularity::Second => Some((n, 0)),
            Granularity::OnceOnly | Granularity::Unspecified => None,
        }
    }

    /// Local wall-clock time of `t`
    fn wall_clock(&self, t: DateTime<Utc>) -> NaiveDateTime {
        self.tz.from_utc_datetime(&t.naive_utc()).naive_local()
    }

    /// Local wall-clock time of a Unix timestamp
    fn wall_clock_at(&self, secs: i64) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(secs, 0).map(|t| self.wall_clock(t))
    }

    /// Wall-clock time at which the period containing `local` nominally starts
    fn boundary_wall_clock(&self, local: &NaiveDateTime) -> Option<NaiveDateTime> {
        let n = self.spec.multiplier();
        let date = local.date();
        let floor = |value: u32| value - value % n;
        let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;

        let (date, time) = match self.spec.granularity() {
            Granularity::Second => (date, NaiveTime::from_hms_opt(local.hour(), local.minute(), floor(local.second()))?),
            Granularity::Minute => (date, NaiveTime::from_hms_opt(local.hour(), floor(local.minute()), 0)?),
            Granularity::Hour => (date, NaiveTime::from_hms_opt(floor(local.hour()), 0, 0)?),
            Granularity::Day => (align_days(date, n)?, midnight),
            Granularity::Week => (self.week_start_date(date)?, midnight),
            Granularity::Month => (NaiveDate::from_ymd_opt(date.year(), floor(date.month0()) + 1, 1)?, midnight),
            Granularity::Year => {
                let year = date.year() - date.year().rem_euclid(i32::try_from(n).ok()?);
                (NaiveDate::from_ymd_opt(year, 1, 1)?, midnight)
            }
            Granularity::OnceOnly | Granularity::Unspecified => return None,
        };

        Some(date.and_time(time))
    }

    /// First day of the (possibly multi-week) period containing `date`
    fn week_start_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        let weekday = date.weekday();
        let (into_week, anchor) = match self.spec.week_start() {
            WeekStart::Sunday => (weekday.num_days_from_sunday(), 7),
            WeekStart::Monday => (weekday.num_days_from_monday(), 1),
        };
        let first = date.checked_sub_days(Days::new(u64::from(into_week)))?;

        // 0001-01-01 is a Monday and 0001-01-07 a Sunday
        let index = (i64::from(first.num_days_from_ce()) - anchor).div_euclid(7);
        let back = index.rem_euclid(i64::from(self.spec.multiplier())) * 7;
        first.checked_sub_days(Days::new(u64::try_from(back).ok()?))
    }

    /// Adjust a nominal boundary thrown out by a DST transition
    ///
    /// If the nominal boundary does not break down to the expected wall-clock
    /// time, the difference is added once. When the subtraction crossed into
    /// the previous day this moves forward to the first instant of the
    /// expected day, which is later than midnight if midnight was skipped.
    fn correct_dst(&self, nominal: i64, target: &NaiveDateTime) -> i64 {
        let Some(actual) = self.wall_clock_at(nominal) else {
            return nominal;
        };
        if actual == *target {
            return nominal;
        }

        let adjust = (*target - actual).num_seconds();
        debug!(
            expected = %target,
            actual = %actual,
            adjust,
            "adjusting period start for daylight saving time"
        );
        nominal + adjust
    }
}

/// Align a date to a multi-day period counted from 0001-01-01
fn align_days(date: NaiveDate, n: u32) -> Option<NaiveDate> {
    if n == 1 {
        return Some(date);
    }
    let back = i64::from(date.num_days_from_ce()).rem_euclid(i64::from(n));
    date.checked_sub_days(Days::new(u64::try_from(back).ok()?))
}

/// Iterator over successive period starts
#[derive(Debug)]
pub struct Periods<'a, Tz: TimeZone> {
    clock: &'a PeriodClock<Tz>,
    next: Option<DateTime<Utc>>,
}

impl<'a, Tz: TimeZone> Iterator for Periods<'a, Tz> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let following = self.clock.start_of_next_period(current);
        if following != PeriodClock::<Tz>::far_future() {
            self.next = Some(following);
        }
        Some(current)
    }
}
