//! Single-flight lock file for monitor cycles.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{AppError, Result};

/// Lock file name inside the data directory.
pub const LOCK_FILE: &str = "monitor.lock";

/// Held while a cycle runs. Removes the lock file on drop.
#[derive(Debug)]
pub struct CycleLock {
    path: PathBuf,
}

impl CycleLock {
    /// Create the lock file exclusively.
    ///
    /// A lock older than `stale_after` is assumed to belong to a crashed
    /// process and is taken over.
    pub fn acquire(path: impl AsRef<Path>, stale_after: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let age = lock_age(&path)?;
                if age < stale_after {
                    return Err(AppError::Lock {
                        path: path.display().to_string(),
                        message: format!("held by another cycle for {}s", age.as_secs()),
                    });
                }
                log::warn!(
                    "Taking over stale lock {} ({}s old)",
                    path.display(),
                    age.as_secs()
                );
                fs::remove_file(&path)?;
                Self::create(&path).map_err(|e| AppError::Lock {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bump the lock file's mtime so a long cycle is not mistaken for a
    /// crashed one.
    pub fn refresh(&self) -> Result<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_modified(SystemTime::now())?;
        Ok(())
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

fn lock_age(path: &Path) -> Result<Duration> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}
