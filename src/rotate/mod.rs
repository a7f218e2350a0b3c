//! Schedule controller
//!
//! A [`Rotator`] owns at most one open log file. Every write first checks
//! whether the current period has ended; if so the file is closed and the
//! next write opens the file for the period containing the current time.
//! Periods that pass without any data never produce a file.

mod materialize;

pub use materialize::{open_append, LinkSet, Materializer};

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::config::RotationConfig;
use crate::error::{Error, Result};
use crate::metrics::RotationMetrics;
use crate::period::{FilenameTemplate, PeriodClock, RotationDelay};

/// The file receiving data for the current period
#[derive(Debug)]
pub struct ActiveTarget {
    path: PathBuf,
    file: File,
    period_start: DateTime<Utc>,
    boundary: DateTime<Utc>,
}

impl ActiveTarget {
    /// Path of the open file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start of the period the file belongs to
    pub fn period_start(&self) -> DateTime<Utc> {
        self.period_start
    }

    /// Instant at which the file is closed
    pub fn boundary(&self) -> DateTime<Utc> {
        self.boundary
    }
}

/// Whether a file is currently open
#[derive(Debug, Default)]
pub enum TargetState {
    #[default]
    NoTargetOpen,
    TargetOpen(ActiveTarget),
}

/// Writes data to the file for the current period
pub struct Rotator<Tz: TimeZone> {
    clock: PeriodClock<Tz>,
    template: FilenameTemplate,
    delay: chrono::Duration,
    time_offset: chrono::Duration,
    links: Option<LinkSet>,
    materializer: Materializer,
    state: TargetState,
    previous_path: Option<PathBuf>,
    metrics: Arc<RotationMetrics>,
}

impl<Tz: TimeZone> fmt::Debug for Rotator<Tz> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rotator")
            .field("template", &self.template.as_str())
            .field("period", self.clock.spec())
            .field("delay", &self.delay)
            .field("state", &self.state)
            .finish()
    }
}

impl<Tz> Rotator<Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    /// Create a rotator writing to files named by `template`
    pub fn new(clock: PeriodClock<Tz>, template: FilenameTemplate) -> Self {
        Self {
            clock,
            template,
            delay: chrono::Duration::zero(),
            time_offset: chrono::Duration::zero(),
            links: None,
            materializer: Materializer::new(),
            state: TargetState::NoTargetOpen,
            previous_path: None,
            metrics: Arc::new(RotationMetrics::new()),
        }
    }

    /// Build a rotator from a validated configuration
    pub fn from_config(config: &RotationConfig, tz: Tz) -> Result<Self> {
        config.validate()?;

        let offset = config.start_time_offset(&tz, Utc::now())?;
        let clock = PeriodClock::new(tz, config.resolve_period()?);
        let mut rotator = Self::new(clock, config.filename_template()?).with_time_offset(offset);

        if let Some(delay) = config.delay {
            rotator = rotator.with_delay(delay);
        }
        if let Some(links) = config.link_set() {
            rotator = rotator.with_links(links);
        }

        info!(
            template = %config.template,
            period = %rotator.clock.spec(),
            delay_secs = rotator.delay.num_seconds(),
            "rotator configured"
        );
        Ok(rotator)
    }

    /// Shift every boundary by `delay`
    pub fn with_delay(mut self, delay: RotationDelay) -> Self {
        self.delay = chrono::Duration::seconds(delay.seconds());
        self
    }

    /// Add `offset` to the system clock
    pub fn with_time_offset(mut self, offset: chrono::Duration) -> Self {
        self.time_offset = offset;
        self
    }

    /// Maintain `links` to the active file
    pub fn with_links(mut self, links: LinkSet) -> Self {
        self.links = Some(links);
        self
    }

    /// Current time as seen by the rotator
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.time_offset
    }

    /// Write `buf` at the current time
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let now = self.now();
        self.write_at(now, buf)
    }

    /// Write `buf` as if the current time were `now`
    ///
    /// The whole buffer goes to a single file.
    pub fn write_at(&mut self, now: DateTime<Utc>, buf: &[u8]) -> Result<()> {
        self.close_if_expired(now);

        if matches!(self.state, TargetState::NoTargetOpen) {
            let target = self.open_target(now)?;
            self.state = TargetState::TargetOpen(target);
        }

        let TargetState::TargetOpen(target) = &mut self.state else {
            return Ok(());
        };

        let started = Instant::now();
        target
            .file
            .write_all(buf)
            .map_err(|e| Error::write(&target.path, e))?;
        self.metrics.record_write(buf.len(), started.elapsed());
        Ok(())
    }

    /// Close the active file, if any
    pub fn close(&mut self) -> Result<()> {
        if let TargetState::TargetOpen(mut target) = std::mem::take(&mut self.state) {
            target
                .file
                .flush()
                .map_err(|e| Error::write(&target.path, e))?;
            debug!(path = %target.path.display(), "closed log file");
        }
        Ok(())
    }

    /// Period starts and the paths rendered for them, beginning at `from`
    pub fn preview(&self, from: DateTime<Utc>, count: usize) -> Result<Vec<(DateTime<Tz>, PathBuf)>> {
        self.clock
            .periods(from - self.delay)
            .take(count)
            .map(|start| {
                let local = self.clock.local(start);
                let path = self.template.render(&local)?;
                Ok((local, path))
            })
            .collect()
    }

    /// Get the period clock
    pub fn clock(&self) -> &PeriodClock<Tz> {
        &self.clock
    }

    /// Get the current state
    pub fn state(&self) -> &TargetState {
        &self.state
    }

    /// Path of the open file, if any
    pub fn active_path(&self) -> Option<&Path> {
        match &self.state {
            TargetState::TargetOpen(target) => Some(target.path()),
            TargetState::NoTargetOpen => None,
        }
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> &Arc<RotationMetrics> {
        &self.metrics
    }

    fn close_if_expired(&mut self, now: DateTime<Utc>) {
        let TargetState::TargetOpen(target) = &self.state else {
            return;
        };
        if now < target.boundary {
            return;
        }

        info!(
            path = %target.path.display(),
            boundary = %target.boundary,
            "period ended, closing log file"
        );
        // dropping the handle closes it
        self.state = TargetState::NoTargetOpen;
        self.metrics.increment_rotations();
    }

    fn open_target(&mut self, now: DateTime<Utc>) -> Result<ActiveTarget> {
        let started = Instant::now();

        // The period is chosen as if the clock ran `delay` behind
        let shifted = now - self.delay;
        let period_start = self.clock.start_of_period(shifted);
        let next = self.clock.start_of_next_period(period_start);
        let boundary = if next == PeriodClock::<Tz>::far_future() {
            next
        } else {
            next.checked_add_signed(self.delay)
                .ok_or_else(|| Error::time_out_of_range(format!("boundary after {}", next)))?
        };

        let path = self.template.render(&self.clock.local(period_start))?;
        let file = self.open_file(&path)?;
        self.metrics.record_open(started.elapsed());

        info!(
            path = %path.display(),
            period_start = %period_start,
            boundary = %boundary,
            "opened log file"
        );

        self.update_links(&path);
        self.previous_path = Some(path.clone());

        Ok(ActiveTarget {
            path,
            file,
            period_start,
            boundary,
        })
    }

    fn open_file(&mut self, path: &Path) -> Result<File> {
        match open_append(path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let created = self.materializer.ensure_directories(path)?;
                self.metrics.add_directories_created(created);
                open_append(path).map_err(|e| Error::open(path, e))
            }
            Err(e) => Err(Error::open(path, e)),
        }
    }

    fn update_links(&mut self, path: &Path) {
        let Some(links) = &self.links else {
            return;
        };

        let previous = self.previous_path.as_deref().filter(|prev| *prev != path);
        if let Err(e) = self.materializer.refresh_links(path, links, previous) {
            warn!(
                link = %links.current.display(),
                target = %path.display(),
                error = %e,
                "failed to update link"
            );
            self.metrics.increment_link_failures();
        }
    }
}
