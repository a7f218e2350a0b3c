//! Configuration for cronolog
//!
//! This module provides the options that control where log data is written
//! and how often files are rotated, whether they come from the command line
//! or a TOML file.

use std::path::{Path, PathBuf};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Serialize, Deserialize};

use crate::error::{Result, Error};
use crate::period::{infer_granularity, FilenameTemplate, PeriodSpec, RotationDelay, WeekStart};
use crate::rotate::LinkSet;

/// Default cap on the length of a rendered path
pub const DEFAULT_MAX_PATH_LEN: usize = 4096;
/// Default size of the input buffer
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

const EUROPEAN_DATE_FORMATS: &[&str] = &[
    "%d %b %Y %T",
    "%d %b %Y %H:%M",
    "%d %b %Y",
    // two-digit years first, %Y would accept "23" as year 23
    "%d-%b-%y %T",
    "%d-%b-%y %H:%M",
    "%d-%b-%Y %T",
    "%d-%b-%Y %H:%M",
    "%d-%b-%Y",
    "%b %d %T %Y",
    "%b %d %Y",
    "%Y-%m-%d %T",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
];

const AMERICAN_DATE_FORMATS: &[&str] = &[
    "%b %d %Y %T",
    "%b %d %Y %H:%M",
    "%b %d %Y",
    "%b-%d-%Y %T",
    "%b-%d-%Y %H:%M",
    "%b-%d-%Y",
    "%b/%d/%Y %T",
    "%b/%d/%Y %H:%M",
    "%b/%d/%Y",
    "%Y-%m-%d %T",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
];

/// Kind of link maintained to the active file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Symbolic link, survives removal of the target
    Symbolic,
    /// Hard link, keeps the target's data alive
    Hard,
}

impl Default for LinkKind {
    fn default() -> Self {
        Self::Symbolic
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl LinkKind {
    /// Parse a link kind from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "symbolic" | "symlink" | "soft" => Ok(Self::Symbolic),
            "hard" | "hardlink" => Ok(Self::Hard),
            _ => Err(Error::config(format!("Unknown link kind: {}", s))),
        }
    }

    /// Get the name of the link kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Symbolic => "symbolic",
            Self::Hard => "hard",
        }
    }
}

/// Field order used when parsing a start time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// Day before month, e.g. `15 May 2023`
    European,
    /// Month before day, e.g. `May 15 2023`
    American,
}

impl Default for DateOrder {
    fn default() -> Self {
        Self::European
    }
}

impl std::fmt::Display for DateOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl DateOrder {
    /// Parse a date order from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "european" => Ok(Self::European),
            "american" => Ok(Self::American),
            _ => Err(Error::config(format!("Unknown date order: {}", s))),
        }
    }

    /// Get the name of the date order
    pub fn name(&self) -> &'static str {
        match self {
            Self::European => "european",
            Self::American => "american",
        }
    }

    fn formats(&self) -> &'static [&'static str] {
        match self {
            Self::European => EUROPEAN_DATE_FORMATS,
            Self::American => AMERICAN_DATE_FORMATS,
        }
    }
}

/// Configuration options for a rotator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct RotationConfig {
    // Output
    /// strftime template for log file paths
    pub template: String,
    /// Cap on the length of a rendered path
    pub max_path_len: usize,

    // Schedule
    /// Explicit rotation period, overriding the one implied by the template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<PeriodSpec>,
    /// First day of week periods, overriding the template's convention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_start: Option<WeekStart>,
    /// Offset applied to every period boundary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<RotationDelay>,
    /// Never rotate, regardless of the template
    pub once_only: bool,
    /// Pretend the program started at this time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// How `start_time` is parsed
    pub date_order: DateOrder,

    // Links
    /// Link that always names the active file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<PathBuf>,
    /// Kind of link to create
    pub link_kind: LinkKind,
    /// Link that names the previously active file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_link: Option<PathBuf>,

    // Performance tuning
    /// Size of the input buffer in bytes
    pub buffer_size: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            template: String::new(),
            max_path_len: DEFAULT_MAX_PATH_LEN,
            period: None,
            week_start: None,
            delay: None,
            once_only: false,
            start_time: None,
            date_order: DateOrder::default(),
            link: None,
            link_kind: LinkKind::default(),
            prev_link: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl RotationConfig {
    /// Create a configuration for `template` with default values
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    /// Set the filename template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Set the maximum rendered path length
    pub fn with_max_path_len(mut self, len: usize) -> Self {
        self.max_path_len = len;
        self
    }

    /// Set an explicit rotation period
    pub fn with_period(mut self, period: PeriodSpec) -> Self {
        self.period = Some(period);
        self
    }

    /// Set the first day of week periods
    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = Some(week_start);
        self
    }

    /// Set the rotation delay
    pub fn with_delay(mut self, delay: RotationDelay) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set whether to write a single file and never rotate
    pub fn with_once_only(mut self, once_only: bool) -> Self {
        self.once_only = once_only;
        self
    }

    /// Set the simulated start time
    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    /// Set how the start time is parsed
    pub fn with_date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    /// Maintain a link of `kind` to the active file
    pub fn with_link<P: AsRef<Path>>(mut self, path: P, kind: LinkKind) -> Self {
        self.link = Some(path.as_ref().to_path_buf());
        self.link_kind = kind;
        self
    }

    /// Maintain a link to the previously active file
    pub fn with_prev_link<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.prev_link = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the input buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.template.is_empty() {
            return Err(Error::config("Filename template must not be empty"));
        }

        if self.max_path_len == 0 {
            return Err(Error::config("Maximum path length must be at least 1"));
        }

        if self.buffer_size == 0 {
            return Err(Error::config("Buffer size must be at least 1 byte"));
        }

        if self.once_only && self.period.is_some() {
            return Err(Error::config(
                "An explicit period cannot be combined with once-only mode"
            ));
        }

        if self.prev_link.is_some() && self.link.is_none() {
            return Err(Error::config(
                "A previous-file link requires a current-file link"
            ));
        }

        self.filename_template()?;
        let period = self.resolve_period()?;

        if let Some(delay) = &self.delay {
            delay.validate_for(&period)?;
        }

        if let Some(text) = &self.start_time {
            parse_start_time(text, self.date_order, &Utc)?;
        }

        Ok(())
    }

    /// Build the validated filename template
    pub fn filename_template(&self) -> Result<FilenameTemplate> {
        Ok(FilenameTemplate::new(self.template.as_str(), self.max_path_len)?)
    }

    /// Determine the effective rotation period
    ///
    /// An explicit period wins over the one inferred from the template. The
    /// week convention comes from the configuration, then from the last week
    /// conversion in the template, then defaults to Sunday.
    pub fn resolve_period(&self) -> Result<PeriodSpec> {
        if self.once_only {
            return Ok(PeriodSpec::once_only());
        }

        let analysis = infer_granularity(&self.template);
        let week_start = self
            .week_start
            .or(analysis.week_start)
            .unwrap_or_default();

        let spec = match self.period {
            Some(period) => {
                period.validate()?;
                period
            }
            None if analysis.granularity.rotates() => PeriodSpec::new(analysis.granularity, 1)?,
            None => PeriodSpec::once_only(),
        };

        Ok(spec.with_week_start(week_start))
    }

    /// Offset between the simulated start time and `now`
    pub fn start_time_offset<Tz: TimeZone>(&self, tz: &Tz, now: DateTime<Utc>) -> Result<chrono::Duration> {
        match &self.start_time {
            Some(text) => Ok(parse_start_time(text, self.date_order, tz)? - now),
            None => Ok(chrono::Duration::zero()),
        }
    }

    /// Links to maintain, if any
    pub fn link_set(&self) -> Option<LinkSet> {
        let link = self.link.as_ref()?;
        let set = LinkSet::new(link, self.link_kind);
        Some(match &self.prev_link {
            Some(prev) => set.with_previous(prev),
            None => set,
        })
    }

    /// Create a human-readable string representation of the configuration
    pub fn to_string_pretty(&self) -> String {
        let mut result = String::new();

        result.push_str("=== cronolog Configuration ===\n\n");

        result.push_str("Output:\n");
        result.push_str(&format!("  Template: {}\n", self.template));
        result.push_str(&format!("  Max Path Length: {}\n", self.max_path_len));

        result.push_str("\nSchedule:\n");
        match self.resolve_period() {
            Ok(period) => result.push_str(&format!("  Period: {}\n", period)),
            Err(e) => result.push_str(&format!("  Period: invalid ({})\n", e)),
        }
        if let Some(week_start) = self.week_start {
            result.push_str(&format!("  Week Start: {}\n", week_start));
        }
        if let Some(delay) = &self.delay {
            result.push_str(&format!("  Delay: {}\n", delay));
        }
        if let Some(start) = &self.start_time {
            result.push_str(&format!("  Start Time: {} ({})\n", start, self.date_order));
        }

        result.push_str("\nLinks:\n");
        match &self.link {
            Some(link) => result.push_str(&format!("  Current: {:?} ({})\n", link, self.link_kind)),
            None => result.push_str("  Current: none\n"),
        }
        if let Some(prev) = &self.prev_link {
            result.push_str(&format!("  Previous: {:?}\n", prev));
        }

        result.push_str("\nPerformance Tuning:\n");
        result.push_str(&format!("  Buffer Size: {} KB\n", self.buffer_size / 1024));

        result
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse TOML: {}", e)))
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize to TOML: {}", e)))?;

        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Parse a start time such as `"15 May 2023 12:30"` in the zone `tz`
///
/// A trailing `GMT` makes the time absolute. Times that fall in a local gap
/// created by a DST change are rejected.
pub fn parse_start_time<Tz: TimeZone>(text: &str, order: DateOrder, tz: &Tz) -> Result<DateTime<Utc>> {
    let trimmed = text.trim();
    let (body, gmt) = match trimmed.strip_suffix("GMT") {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    };

    let naive = order
        .formats()
        .iter()
        .find_map(|format| {
            NaiveDateTime::parse_from_str(body, format)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(body, format)
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
        })
        .ok_or_else(|| Error::start_time(format!("unrecognized {} date {:?}", order, text)))?;

    if gmt {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| Error::start_time(format!("{:?} does not exist in the local time zone", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Granularity;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RotationConfig::default();

        assert_eq!(config.max_path_len, 4096);
        assert_eq!(config.buffer_size, 64 * 1024);
        assert_eq!(config.link_kind, LinkKind::Symbolic);
        assert_eq!(config.date_order, DateOrder::European);
        assert!(!config.once_only);

        // An empty template is never valid
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() -> Result<()> {
        let config = RotationConfig::new("/logs/%Y/%m/%d/access.log")
            .with_period(PeriodSpec::parse("6 hours")?)
            .with_delay(RotationDelay::parse("5 minutes")?)
            .with_link("/logs/current", LinkKind::Hard)
            .with_prev_link("/logs/previous")
            .with_buffer_size(4096);

        config.validate()?;
        let period = config.resolve_period()?;
        assert_eq!(period.granularity(), Granularity::Hour);
        assert_eq!(period.multiplier(), 6);

        let links = config.link_set().unwrap();
        assert_eq!(links.kind, LinkKind::Hard);
        assert_eq!(links.previous, Some(PathBuf::from("/logs/previous")));
        Ok(())
    }

    #[test]
    fn test_config_validation() -> Result<()> {
        let base = RotationConfig::new("/logs/%Y%m%d%H.log");
        base.validate()?;

        assert!(base.clone().with_buffer_size(0).validate().is_err());
        assert!(base.clone().with_max_path_len(0).validate().is_err());
        assert!(base.clone().with_prev_link("/logs/prev").validate().is_err());
        assert!(base
            .clone()
            .with_once_only(true)
            .with_period(PeriodSpec::parse("day")?)
            .validate()
            .is_err());

        // Delay must be finer than the period and shorter than it
        assert!(base.clone().with_delay(RotationDelay::parse("1 day")?).validate().is_err());
        assert!(base.clone().with_delay(RotationDelay::parse("60 min")?).validate().is_err());
        base.clone().with_delay(RotationDelay::parse("-15 min")?).validate()?;

        // No boundary to delay in a once-only file
        let err = RotationConfig::new("/logs/access.log")
            .with_delay(RotationDelay::parse("1 min")?)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPeriod(_)));

        let err = RotationConfig::new("/logs/%Q.log").validate().unwrap_err();
        assert!(matches!(err, Error::Template(_)));

        let err = base.with_start_time("yesterday").validate().unwrap_err();
        assert!(matches!(err, Error::StartTime(_)));
        Ok(())
    }

    #[test]
    fn test_resolve_period() -> Result<()> {
        let daily = RotationConfig::new("/logs/%Y/%m/%d.log").resolve_period()?;
        assert_eq!(daily.granularity(), Granularity::Day);
        assert_eq!(daily.multiplier(), 1);

        let weekly = RotationConfig::new("/logs/%Y-%W.log").resolve_period()?;
        assert_eq!(weekly.granularity(), Granularity::Week);
        assert_eq!(weekly.week_start(), WeekStart::Monday);

        let overridden = RotationConfig::new("/logs/%Y-%W.log")
            .with_week_start(WeekStart::Sunday)
            .resolve_period()?;
        assert_eq!(overridden.week_start(), WeekStart::Sunday);

        let fixed = RotationConfig::new("/logs/access.log").resolve_period()?;
        assert_eq!(fixed.granularity(), Granularity::OnceOnly);

        let once = RotationConfig::new("/logs/%Y%m%d.log")
            .with_once_only(true)
            .resolve_period()?;
        assert!(!once.rotates());

        // An explicit period may be coarser than the template implies
        let coarse = RotationConfig::new("/logs/%Y%m%d%H%M.log")
            .with_period(PeriodSpec::parse("day")?)
            .resolve_period()?;
        assert_eq!(coarse.granularity(), Granularity::Day);
        Ok(())
    }

    #[test]
    fn test_parse_start_time_european() -> Result<()> {
        let expected = Utc.with_ymd_and_hms(2023, 5, 15, 12, 30, 0).unwrap();

        assert_eq!(parse_start_time("15 May 2023 12:30:00", DateOrder::European, &Utc)?, expected);
        assert_eq!(parse_start_time("15 May 2023 12:30", DateOrder::European, &Utc)?, expected);
        assert_eq!(parse_start_time("15-May-23 12:30", DateOrder::European, &Utc)?, expected);
        assert_eq!(
            parse_start_time("15 May 2023", DateOrder::European, &Utc)?,
            Utc.with_ymd_and_hms(2023, 5, 15, 0, 0, 0).unwrap()
        );
        assert!(parse_start_time("May 15 2023 12:30", DateOrder::European, &Utc).is_err());
        Ok(())
    }

    #[test]
    fn test_parse_start_time_american() -> Result<()> {
        let expected = Utc.with_ymd_and_hms(2023, 5, 15, 12, 30, 0).unwrap();

        assert_eq!(parse_start_time("May 15 2023 12:30", DateOrder::American, &Utc)?, expected);
        assert_eq!(parse_start_time("May/15/2023 12:30:00", DateOrder::American, &Utc)?, expected);
        assert!(parse_start_time("15 May 2023 12:30", DateOrder::American, &Utc).is_err());
        Ok(())
    }

    #[test]
    fn test_parse_start_time_zones() -> Result<()> {
        let tz = chrono_tz::America::New_York;

        // Interpreted in the given zone unless marked GMT
        assert_eq!(
            parse_start_time("15 May 2023 12:30", DateOrder::European, &tz)?,
            Utc.with_ymd_and_hms(2023, 5, 15, 16, 30, 0).unwrap()
        );
        assert_eq!(
            parse_start_time("15 May 2023 12:30 GMT", DateOrder::European, &tz)?,
            Utc.with_ymd_and_hms(2023, 5, 15, 12, 30, 0).unwrap()
        );

        // 02:30 does not exist on the spring-forward day
        let err = parse_start_time("10 Mar 2024 02:30", DateOrder::European, &tz).unwrap_err();
        assert!(matches!(err, Error::StartTime(_)));
        Ok(())
    }

    #[test]
    fn test_start_time_offset() -> Result<()> {
        let now = Utc.with_ymd_and_hms(2023, 5, 15, 12, 0, 0).unwrap();
        let config = RotationConfig::new("/logs/%Y.log").with_start_time("15 May 2023 10:00");
        assert_eq!(config.start_time_offset(&Utc, now)?, chrono::Duration::hours(-2));

        let plain = RotationConfig::new("/logs/%Y.log");
        assert_eq!(plain.start_time_offset(&Utc, now)?, chrono::Duration::zero());
        Ok(())
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(LinkKind::from_str("symlink").unwrap(), LinkKind::Symbolic);
        assert_eq!(LinkKind::from_str("HARD").unwrap(), LinkKind::Hard);
        assert!(LinkKind::from_str("junction").is_err());

        assert_eq!(DateOrder::from_str("american").unwrap(), DateOrder::American);
        assert!(DateOrder::from_str("iso").is_err());
    }

    #[test]
    fn test_to_string_pretty() -> Result<()> {
        let config = RotationConfig::new("/logs/%Y%m%d.log")
            .with_delay(RotationDelay::parse("10 min")?)
            .with_link("/logs/current", LinkKind::Symbolic);

        let pretty = config.to_string_pretty();
        assert!(pretty.contains("Template: /logs/%Y%m%d.log"));
        assert!(pretty.contains("Period: day"));
        assert!(pretty.contains("Delay: 10 minutes"));
        assert!(pretty.contains("(symbolic)"));
        Ok(())
    }

    #[test]
    fn test_toml_round_trip() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("cronolog.toml");

        let config = RotationConfig::new("/logs/%Y/%m/%d/%H%M.log")
            .with_period(PeriodSpec::parse("15 minutes")?)
            .with_delay(RotationDelay::parse("-30 seconds")?)
            .with_link("/logs/current", LinkKind::Hard);

        config.to_toml_file(&path)?;
        let loaded = RotationConfig::from_toml_file(&path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_toml_rejects_bad_period() {
        let err = RotationConfig::from_toml_str("template = \"/logs/%H.log\"\nperiod = \"7 hours\"\n")
            .unwrap_err();
        assert!(err.is_config_error());

        let config = RotationConfig::from_toml_str(
            "template = \"/logs/%H.log\"\nperiod = \"6 hours\"\nlink_kind = \"hard\"\n",
        )
        .unwrap();
        assert_eq!(config.period.map(|p| p.multiplier()), Some(6));
        assert_eq!(config.link_kind, LinkKind::Hard);
    }
}
