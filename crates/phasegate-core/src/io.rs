use crate::error::{FlowError, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

/// Lock files older than this are considered abandoned by a crashed invocation.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

const LOCK_ATTEMPTS: u32 = 5;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting state files.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// StateLock
// ---------------------------------------------------------------------------

/// Exclusive lock held around a read-modify-write of the state document.
///
/// Acquired by creating the lock file with `create_new` (O_EXCL); released
/// when the guard is dropped. A lock file older than [`LOCK_STALE_AFTER`] is
/// reclaimed and acquisition retried. Reclaiming renames the lock aside and
/// deletes it only if it is still the stale lock that was inspected, so two
/// waiters cannot both break the same lock.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        Self::acquire_with(path, LOCK_STALE_AFTER)
    }

    pub fn acquire_with(path: &Path, stale_after: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        for attempt in 0..LOCK_ATTEMPTS {
            match fs::OpenOptions::new().create_new(true).write(true).open(path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let stale = LockStamp::read(path).filter(|s| s.is_stale(stale_after));
                    if let Some(stamp) = stale {
                        tracing::warn!(
                            lock = %path.display(),
                            owner = %stamp.owner,
                            "reclaiming stale state lock"
                        );
                        reclaim(path, &stamp)?;
                        continue;
                    }
                    let delay = 10u64.saturating_mul(2u64.saturating_pow(attempt));
                    std::thread::sleep(Duration::from_millis(delay.min(100)));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(FlowError::StateLocked(path.display().to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(lock = %self.path.display(), error = %e, "failed to release state lock");
            }
        }
    }
}

/// Owner and modification time of a lock file, as seen by one waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LockStamp {
    owner: String,
    modified: SystemTime,
}

impl LockStamp {
    fn read(path: &Path) -> Option<Self> {
        let modified = fs::metadata(path).ok()?.modified().ok()?;
        let owner = fs::read_to_string(path).ok()?.trim().to_string();
        Some(Self { owner, modified })
    }

    fn is_stale(&self, stale_after: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.modified)
            .map(|age| age > stale_after)
            .unwrap_or(false)
    }
}

/// Remove the lock at `path` if it is still the one described by `stamp`.
///
/// The lock is first renamed to a name unique to this process, which only
/// one waiter can do. If what was moved is not the inspected stale lock,
/// another waiter already reclaimed it and took a fresh lock; that lock is
/// put back. Returns whether the stale lock was removed.
fn reclaim(path: &Path, stamp: &LockStamp) -> Result<bool> {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(".reclaim-{}-{nanos}", std::process::id()));
    let aside = PathBuf::from(aside);

    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    }
    if LockStamp::read(&aside).as_ref() == Some(stamp) {
        fs::remove_file(&aside)?;
        return Ok(true);
    }
    match fs::hard_link(&aside, path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::warn!(lock = %path.display(), "state lock replaced while restoring a live lock");
        }
        Err(e) => return Err(e.into()),
    }
    fs::remove_file(&aside)?;
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/state.yaml");
        atomic_write(&path, b"data").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "data");
    }

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.lock");
        let held = StateLock::acquire(&path).unwrap();
        assert!(path.exists());

        let second = StateLock::acquire_with(&path, Duration::from_secs(3600));
        assert!(matches!(second, Err(FlowError::StateLocked(_))));

        drop(held);
        assert!(!path.exists());
        let again = StateLock::acquire(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.lock");
        fs::write(&path, "12345\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let lock = StateLock::acquire_with(&path, Duration::from_millis(1)).unwrap();
        assert!(lock.path().exists());
        assert_eq!(
            fs::read_to_string(&path).unwrap().trim(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn reclaim_removes_only_the_inspected_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.lock");
        fs::write(&path, "111\n").unwrap();
        let stale = LockStamp::read(&path).unwrap();

        // Another waiter reclaimed first and now holds a fresh lock.
        fs::remove_file(&path).unwrap();
        fs::write(&path, "222\n").unwrap();
        assert!(!reclaim(&path, &stale).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "222\n");

        let current = LockStamp::read(&path).unwrap();
        assert!(reclaim(&path, &current).unwrap());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        // Nothing left to reclaim.
        assert!(!reclaim(&path, &current).unwrap());
    }
}
