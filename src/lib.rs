//! cronolog
//!
//! A log rotation filter. Bytes read from an input stream are appended to a
//! file whose name is produced by formatting the current time with a
//! strftime template, so `/www/logs/%Y/%m/%d/access.log` yields one file per
//! day in nested directories. Files are opened lazily; a period in which no
//! data arrives leaves no file behind.
//!
//! ```no_run
//! use cronolog::{copy_stream, RotationConfig, Rotator};
//!
//! # fn main() -> cronolog::Result<()> {
//! let config = RotationConfig::new("/var/log/app/%Y/%m/%d/access.log");
//! let mut rotator = Rotator::from_config(&config, chrono::Local)?;
//! copy_stream(&mut std::io::stdin().lock(), &mut rotator, config.buffer_size)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod period;
pub mod pipe;
pub mod rotate;

pub use config::{parse_start_time, DateOrder, LinkKind, RotationConfig};
pub use error::{Error, Result};
pub use metrics::RotationMetrics;
pub use period::{
    infer_granularity, FilenameTemplate, Granularity, PeriodClock, PeriodSpec, RotationDelay,
    WeekStart,
};
pub use pipe::copy_stream;
pub use rotate::{LinkSet, Rotator, TargetState};
