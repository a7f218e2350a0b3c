//! Filesystem side effects of opening a new log file
//!
//! Creates the missing directories of a rendered log path and keeps the
//! current and previous links pointing at the right files. Several cronolog
//! processes may write into the same directory tree, so "already exists" is
//! always treated as success.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::LinkKind;
use crate::error::{Error, Result};

/// Permissions for new log files (before umask)
#[cfg(unix)]
const FILE_MODE: u32 = 0o664;
/// Permissions for new directories (before umask)
#[cfg(unix)]
const DIR_MODE: u32 = 0o775;

/// Links maintained alongside the active log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSet {
    /// Link that always names the active file
    pub current: PathBuf,
    /// Hard or symbolic
    pub kind: LinkKind,
    /// Link that names the file active before the current one
    pub previous: Option<PathBuf>,
}

impl LinkSet {
    /// Create a link set without a previous link
    pub fn new(current: impl Into<PathBuf>, kind: LinkKind) -> Self {
        Self {
            current: current.into(),
            kind,
            previous: None,
        }
    }

    /// Also maintain a link to the previous file
    pub fn with_previous(mut self, previous: impl Into<PathBuf>) -> Self {
        self.previous = Some(previous.into());
        self
    }
}

/// Creates directories and links for new log files
#[derive(Debug, Default)]
pub struct Materializer {
    /// Directory known to exist after the last successful call
    last_verified: Option<PathBuf>,
}

impl Materializer {
    /// Create a materializer with an empty prefix cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create every missing directory above `path`
    ///
    /// Returns the number of directories this call created. Prefixes of the
    /// last verified directory are assumed to exist; if that assumption turns
    /// out to be wrong the walk is repeated without it.
    pub fn ensure_directories(&mut self, path: &Path) -> Result<usize> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(0);
        };

        debug!(path = %path.display(), "creating missing directories");
        let mut created = self.walk(parent, true)?;

        if !parent.is_dir() {
            debug!(dir = %parent.display(), "cached prefix is stale, checking every component");
            self.last_verified = None;
            created += self.walk(parent, false)?;
        }

        self.last_verified = Some(parent.to_path_buf());
        Ok(created)
    }

    fn walk(&self, dir: &Path, use_cache: bool) -> Result<usize> {
        let mut prefixes: Vec<&Path> = dir
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty() && p.parent().is_some())
            .collect();
        prefixes.reverse();

        let mut created = 0;
        for prefix in prefixes {
            if use_cache && self.last_verified.as_deref().is_some_and(|last| last.starts_with(prefix)) {
                debug!(dir = %prefix.display(), "prefix known to exist");
                continue;
            }

            match fs::metadata(prefix) {
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(dir = %prefix.display(), "directory does not exist, creating");
                    match make_dir(prefix) {
                        Ok(()) => created += 1,
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                            debug!(dir = %prefix.display(), "directory created concurrently");
                        }
                        Err(e) => return Err(Error::open(prefix, e)),
                    }
                }
                Err(e) => return Err(Error::open(prefix, e)),
            }
        }

        Ok(created)
    }

    /// Point the links in `links` at `target`
    ///
    /// When a previous link is configured it is moved to `previous_target`
    /// before the current link is replaced, so a reader polling both always
    /// finds at least one of them. For symbolic links the previous target
    /// defaults to whatever the current link named before.
    pub fn refresh_links(&self, target: &Path, links: &LinkSet, previous_target: Option<&Path>) -> io::Result<()> {
        if let Some(previous) = &links.previous {
            let prior = match (previous_target, links.kind) {
                (Some(prior), _) => Some(prior.to_path_buf()),
                (None, LinkKind::Symbolic) => fs::read_link(&links.current).ok(),
                (None, LinkKind::Hard) => None,
            };

            if let Some(prior) = prior.filter(|p| p != target) {
                replace_link(&prior, previous, links.kind)?;
            }
        }

        replace_link(target, &links.current, links.kind)
    }
}

/// Open `path` for appending, creating it if absent
pub fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options.open(path)
}

fn make_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path)
}

/// Replace whatever occupies `link` with a link to `target`
fn replace_link(target: &Path, link: &Path, kind: LinkKind) -> io::Result<()> {
    match fs::symlink_metadata(link) {
        Ok(_) => match fs::remove_file(link) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let result = match kind {
        LinkKind::Symbolic => symlink(target, link),
        LinkKind::Hard => fs::hard_link(target, link),
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(link = %link.display(), "link replaced concurrently");
            Ok(())
        }
        other => other,
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Barrier};
    use tempfile::tempdir;

    #[test]
    fn test_ensure_directories_creates_missing() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("2023/05/15/access.log");

        let mut materializer = Materializer::new();
        assert_eq!(materializer.ensure_directories(&path)?, 3);
        assert!(temp_dir.path().join("2023/05/15").is_dir());
        assert!(!path.exists());

        // Calling again should be a no-op
        assert_eq!(materializer.ensure_directories(&path)?, 0);
        Ok(())
    }

    #[test]
    fn test_cache_is_prefix_by_component() -> Result<()> {
        let temp_dir = tempdir()?;
        let mut materializer = Materializer::new();

        materializer.ensure_directories(&temp_dir.path().join("2023/01/a.log"))?;
        // "2023/0" is a string prefix of "2023/01" but a different directory
        assert_eq!(materializer.ensure_directories(&temp_dir.path().join("2023/0/a.log"))?, 1);
        assert!(temp_dir.path().join("2023/0").is_dir());
        Ok(())
    }

    #[test]
    fn test_stale_cache_does_not_suppress_creation() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("logs/2023/a.log");

        let mut materializer = Materializer::new();
        materializer.ensure_directories(&path)?;
        fs::remove_dir_all(temp_dir.path().join("logs"))?;

        assert_eq!(materializer.ensure_directories(&path)?, 2);
        assert!(temp_dir.path().join("logs/2023").is_dir());
        Ok(())
    }

    #[test]
    fn test_relative_path_without_directory() -> Result<()> {
        let mut materializer = Materializer::new();
        assert_eq!(materializer.ensure_directories(Path::new("access.log"))?, 0);
        Ok(())
    }

    #[test]
    fn test_concurrent_directory_creation() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = Arc::new(temp_dir.path().join("a/b/c/d/e/access.log"));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = Arc::clone(&path);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    Materializer::new().ensure_directories(&path).map(|_| ())
                })
            })
            .collect();

        for handle in handles {
            let outcome = handle.join().map_err(|_| Error::config("thread panicked"))?;
            assert!(outcome.is_ok(), "{:?}", outcome);
        }
        assert!(temp_dir.path().join("a/b/c/d/e").is_dir());
        Ok(())
    }

    #[test]
    fn test_open_append_preserves_content() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("access.log");

        open_append(&path)?.write_all(b"first\n")?;
        open_append(&path)?.write_all(b"second\n")?;
        assert_eq!(fs::read_to_string(&path)?, "first\nsecond\n");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_refresh() -> Result<()> {
        let temp_dir = tempdir()?;
        let first = temp_dir.path().join("first.log");
        let second = temp_dir.path().join("second.log");
        File::create(&first)?;
        File::create(&second)?;

        let links = LinkSet::new(temp_dir.path().join("current"), LinkKind::Symbolic)
            .with_previous(temp_dir.path().join("previous"));
        let materializer = Materializer::new();

        materializer.refresh_links(&first, &links, None)?;
        assert_eq!(fs::read_link(&links.current)?, first);
        assert!(fs::symlink_metadata(temp_dir.path().join("previous")).is_err());

        materializer.refresh_links(&second, &links, None)?;
        assert_eq!(fs::read_link(&links.current)?, second);
        assert_eq!(fs::read_link(temp_dir.path().join("previous"))?, first);
        Ok(())
    }

    #[test]
    fn test_hardlink_refresh() -> Result<()> {
        let temp_dir = tempdir()?;
        let first = temp_dir.path().join("first.log");
        let second = temp_dir.path().join("second.log");
        fs::write(&first, "one")?;
        fs::write(&second, "two")?;

        let links = LinkSet::new(temp_dir.path().join("current.log"), LinkKind::Hard)
            .with_previous(temp_dir.path().join("previous.log"));
        let materializer = Materializer::new();

        materializer.refresh_links(&first, &links, None)?;
        assert_eq!(fs::read_to_string(&links.current)?, "one");

        materializer.refresh_links(&second, &links, Some(&first))?;
        assert_eq!(fs::read_to_string(&links.current)?, "two");
        assert_eq!(fs::read_to_string(temp_dir.path().join("previous.log"))?, "one");
        Ok(())
    }

    #[test]
    fn test_link_replaces_regular_file() -> Result<()> {
        let temp_dir = tempdir()?;
        let target = temp_dir.path().join("target.log");
        let link = temp_dir.path().join("current.log");
        fs::write(&target, "new")?;
        fs::write(&link, "stale")?;

        Materializer::new().refresh_links(&target, &LinkSet::new(&link, LinkKind::Hard), None)?;
        assert_eq!(fs::read_to_string(&link)?, "new");
        Ok(())
    }
}
