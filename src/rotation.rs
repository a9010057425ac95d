//! Rotation algorithm and advisory file locking (§4.4).
//!
//! The rotation sequence is: flush the current writer, close it, compute the
//! new name (`<base>.<YYYYMMDD-HHMMSS.mmm>`), rename the active file onto
//! that name, reopen a fresh file at `base`, reset the size counter, and
//! (if compression is configured) enqueue the rotated file for the
//! compression pool. Retention then trims the directory.
//!
//! No crate in the teacher's dependency set wraps `flock`/`LockFileEx`, so
//! cross-process exclusion is approximated with a sentinel `<base>.lock`
//! file created via `OpenOptions::create_new`: its existence *is* the lock,
//! and removing it releases it. This is best-effort — it protects
//! cooperating `omnilog` processes, not arbitrary external writers, and is
//! documented as such in DESIGN.md.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::error::{Error, ErrorCode, Result};
use crate::utils::timestamp::rotated_file_name;

pub struct AdvisoryLock {
    lock_path: PathBuf,
}

impl AdvisoryLock {
    /// Blocks (with short sleeps) until the sentinel file can be created,
    /// up to `timeout`; returns a guard that removes it on drop.
    pub fn acquire(base: &Path, timeout: Duration) -> Result<AdvisoryLock> {
        let lock_path = lock_path_for(base);
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&lock_path)
            {
                Ok(_) => return Ok(AdvisoryLock { lock_path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if std::time::Instant::now() >= deadline {
                        return Err(Error::new(ErrorCode::FileLock, "advisory_lock_acquire")
                            .with_path(&lock_path)
                            .with_context("timed out waiting for rotation lock"));
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => {
                    return Err(Error::from_io(ErrorCode::FileLock, "advisory_lock_acquire", e)
                        .with_path(&lock_path))
                }
            }
        }
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Result of a successful rotation, used by the caller to enqueue
/// compression and trigger retention.
pub struct RotationOutcome {
    pub rotated_path: PathBuf,
}

/// Performs the rename step of rotation. The caller is responsible for
/// flushing/closing its writer before calling this and reopening `base`
/// afterward (kept separate so `Destination` can hold the lock across both
/// steps without this module needing a handle to the writer).
pub fn rotate(base: &Path) -> Result<RotationOutcome> {
    let rotated_name = rotated_file_name(
        base.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("log"),
        Utc::now(),
    );
    let rotated_path = base.with_file_name(rotated_name);

    if base.exists() {
        fs::rename(base, &rotated_path)
            .map_err(|e| Error::from_io(ErrorCode::FileRotate, "rotate_rename", e).with_path(base))?;
    }

    Ok(RotationOutcome { rotated_path })
}

#[derive(Debug, Clone, Copy)]
pub enum RotationTrigger {
    Size { max_bytes: u64 },
    Age { max_duration: Duration },
    Both { max_bytes: u64, max_duration: Duration },
    Never,
}

impl RotationTrigger {
    /// `pending_len` is the size of the write about to be appended: rotation
    /// fires *before* a write that would push the file over the threshold,
    /// not after (§4.4 step 3 "current_size + L > max_size").
    pub fn should_rotate(self, current_size: u64, pending_len: u64, age: Duration) -> bool {
        match self {
            RotationTrigger::Size { max_bytes } => current_size + pending_len > max_bytes,
            RotationTrigger::Age { max_duration } => age >= max_duration,
            RotationTrigger::Both { max_bytes, max_duration } => {
                current_size + pending_len > max_bytes || age >= max_duration
            }
            RotationTrigger::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rotate_renames_existing_file_with_sortable_suffix() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        fs::write(&base, b"hello").unwrap();

        let outcome = rotate(&base).unwrap();
        assert!(!base.exists());
        assert!(outcome.rotated_path.exists());
        assert!(outcome
            .rotated_path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("app.log."));
    }

    #[test]
    fn rotate_is_a_no_op_when_base_does_not_exist() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let outcome = rotate(&base).unwrap();
        assert!(!outcome.rotated_path.exists());
    }

    #[test]
    fn advisory_lock_prevents_concurrent_acquisition() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let first = AdvisoryLock::acquire(&base, Duration::from_millis(50)).unwrap();
        let second = AdvisoryLock::acquire(&base, Duration::from_millis(50));
        assert!(second.is_err());
        drop(first);
        assert!(AdvisoryLock::acquire(&base, Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn size_trigger_fires_when_pending_write_would_exceed_threshold() {
        let trigger = RotationTrigger::Size { max_bytes: 100 };
        assert!(!trigger.should_rotate(50, 50, Duration::ZERO));
        assert!(trigger.should_rotate(50, 51, Duration::ZERO));
        assert!(trigger.should_rotate(100, 1, Duration::ZERO));
    }

    #[test]
    fn size_trigger_never_fires_for_a_zero_length_write_at_exact_threshold() {
        let trigger = RotationTrigger::Size { max_bytes: 100 };
        assert!(!trigger.should_rotate(100, 0, Duration::ZERO));
    }
}
