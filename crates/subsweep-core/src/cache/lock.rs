use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::constants::cache::LOCK_POLL_INTERVAL_MS;
use crate::error::CacheError;

/// Advisory exclusive lock on a cache entry's sidecar `.lock` file.
///
/// Held for the duration of one read or write. Released on drop; the lock
/// file itself is left in place so a waiter never locks an unlinked inode.
pub(crate) struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Poll for the lock until `wait` elapses.
    pub(crate) async fn acquire(path: &Path, wait: Duration) -> Result<Self, CacheError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                return Err(CacheError::LockUnavailable(path.to_path_buf()));
            }
            sleep(Duration::from_millis(LOCK_POLL_INTERVAL_MS)).await;
        }
    }

    /// `Ok(None)` when another holder has the lock.
    pub(crate) fn try_acquire(path: &Path) -> Result<Option<Self>, CacheError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the descriptor is owned by `file` and stays open for the call.
            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::WouldBlock {
                    return Ok(None);
                }
                return Err(CacheError::Io(err));
            }
        }

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: unlocking a descriptor we still own.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        tracing::trace!(path = %self.path.display(), "Released cache lock");
    }
}
