//! Input pump
//!
//! Copies raw bytes from an input stream to a [`Rotator`] until end of input.
//! Data is never reframed: each chunk returned by a read is written as-is to
//! the file for the period current at that moment.

use std::fmt;
use std::io::{self, Read};

use chrono::TimeZone;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::rotate::Rotator;

/// Copy `input` into `rotator` until end of input
///
/// Returns the number of bytes copied. The active file is closed on both
/// end of input and read failure.
pub fn copy_stream<R, Tz>(input: &mut R, rotator: &mut Rotator<Tz>, buffer_size: usize) -> Result<u64>
where
    R: Read,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("read interrupted, retrying");
                continue;
            }
            Err(e) => {
                rotator.close()?;
                return Err(Error::Input(e));
            }
        };

        rotator.write(&buffer[..n])?;
        total += n as u64;
    }

    rotator.close()?;
    info!(bytes = total, "end of input");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::{FilenameTemplate, PeriodClock, PeriodSpec};
    use chrono::Utc;
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::tempdir;

    fn single_file(path: &Path) -> Rotator<Utc> {
        let template = FilenameTemplate::new(path.to_string_lossy().into_owned(), 4096).unwrap();
        Rotator::new(PeriodClock::new(Utc, PeriodSpec::once_only()), template)
    }

    /// Reader that fails once with the given kind before yielding its data
    struct Flaky {
        kind: Option<io::ErrorKind>,
        data: Cursor<Vec<u8>>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.kind.take() {
                Some(kind) => Err(io::Error::new(kind, "flaky")),
                None => self.data.read(buf),
            }
        }
    }

    #[test_log::test]
    fn test_copy_preserves_bytes() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("out.log");
        let mut rotator = single_file(&path);

        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        // a small buffer forces many reads
        let copied = copy_stream(&mut Cursor::new(data.clone()), &mut rotator, 7)?;

        assert_eq!(copied, 10_000);
        assert_eq!(fs::read(&path)?, data);
        assert!(rotator.active_path().is_none());
        Ok(())
    }

    #[test_log::test]
    fn test_empty_input_creates_no_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("out.log");
        let mut rotator = single_file(&path);

        assert_eq!(copy_stream(&mut io::empty(), &mut rotator, 1024)?, 0);
        assert!(!path.exists());
        Ok(())
    }

    #[test_log::test]
    fn test_interrupted_read_is_retried() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("out.log");
        let mut rotator = single_file(&path);

        let mut input = Flaky {
            kind: Some(io::ErrorKind::Interrupted),
            data: Cursor::new(b"line\n".to_vec()),
        };
        copy_stream(&mut input, &mut rotator, 1024)?;
        assert_eq!(fs::read_to_string(&path)?, "line\n");
        Ok(())
    }

    #[test_log::test]
    fn test_read_error_is_input_error() -> Result<()> {
        let temp_dir = tempdir()?;
        let mut rotator = single_file(&temp_dir.path().join("out.log"));

        let mut input = Flaky {
            kind: Some(io::ErrorKind::BrokenPipe),
            data: Cursor::new(Vec::new()),
        };
        let err = copy_stream(&mut input, &mut rotator, 1024).unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(err.exit_code(), 4);
        Ok(())
    }
}
