//! Filename template analysis and rendering
//!
//! Templates are strftime format strings such as `/www/logs/%Y/%m/%d/access.log`.
//! The conversions they contain determine the rotation granularity: a template
//! that names the day of the month needs a new file every day.

use std::fmt::{self, Write};
use std::path::PathBuf;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use tracing::debug;

use crate::error::{Error, Result};
use crate::period::{Granularity, PeriodError, PeriodResult, WeekStart};

/// Result of scanning a template for conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateAnalysis {
    /// Finest granularity named by any conversion
    pub granularity: Granularity,
    /// Week convention of the last week-number conversion seen
    pub week_start: Option<WeekStart>,
}

/// Scan `template` and infer how often it must be rotated
///
/// Unknown conversions are ignored. A template without any date or time
/// conversion yields [`Granularity::OnceOnly`].
pub fn infer_granularity(template: &str) -> TemplateAnalysis {
    let mut granularity = Granularity::OnceOnly;
    let mut week_start = None;
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            continue;
        }

        let mut conv = match chars.next() {
            Some(c) => c,
            None => break,
        };
        // padding flags and E/O modifiers precede the conversion letter
        while matches!(conv, '-' | '_' | '0' | '^' | '#' | 'E' | 'O' | ':' | '.') {
            conv = match chars.next() {
                Some(c) => c,
                None => break,
            };
        }

        let implied = match conv {
            'y' | 'Y' | 'C' | 'G' | 'g' => Granularity::Year,
            'b' | 'h' | 'B' | 'm' => Granularity::Month,
            'U' => {
                week_start = Some(WeekStart::Sunday);
                Granularity::Week
            }
            'W' | 'V' => {
                week_start = Some(WeekStart::Monday);
                Granularity::Week
            }
            'a' | 'A' | 'd' | 'e' | 'j' | 'w' | 'u' | 'D' | 'x' | 'F' => Granularity::Day,
            'H' | 'I' | 'k' | 'l' | 'p' | 'P' => Granularity::Hour,
            'M' => Granularity::Minute,
            'S' | 's' | 'c' | 'T' | 'r' | 'R' | 'X' | '+' => Granularity::Second,
            other => {
                debug!(conversion = %other, "ignoring conversion");
                continue;
            }
        };

        if implied < granularity {
            debug!(conversion = %conv, granularity = %implied, "conversion narrows period");
            granularity = implied;
        }
    }

    TemplateAnalysis {
        granularity,
        week_start,
    }
}

/// A validated filename template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    template: String,
    max_len: usize,
}

impl FilenameTemplate {
    /// Create a template, rejecting conversions the formatter cannot render
    pub fn new(template: impl Into<String>, max_len: usize) -> PeriodResult<Self> {
        let template = template.into();
        if template.is_empty() {
            return Err(PeriodError::Template("template is empty".to_string()));
        }

        if StrftimeItems::new(&template).any(|item| matches!(item, Item::Error)) {
            return Err(PeriodError::Template(format!(
                "unsupported conversion in {:?}",
                template
            )));
        }

        Ok(Self { template, max_len })
    }

    /// Get the raw template text
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Render the path for the period starting at `start`
    pub fn render<Tz>(&self, start: &DateTime<Tz>) -> Result<PathBuf>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut rendered = String::with_capacity(self.template.len() + 16);
        write!(
            rendered,
            "{}",
            start.format_with_items(StrftimeItems::new(&self.template))
        )
        .map_err(|_| Error::template(format!("cannot render {:?}", self.template)))?;

        if rendered.len() > self.max_len {
            return Err(Error::PathTooLong {
                len: rendered.len(),
                max: self.max_len,
            });
        }

        Ok(PathBuf::from(rendered))
    }
}
