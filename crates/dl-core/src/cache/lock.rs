use dl_common::ArtifactTier;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Exclusive advisory lock serializing the rebuild of one tier.
///
/// Held from the cache-miss re-check until the artifact is written. Blocks
/// until the current holder, in this or another process, releases it.
#[derive(Debug)]
pub struct BuildLock {
    file: File,
    path: PathBuf,
}

impl BuildLock {
    pub fn lock_path(dir: &Path, tier: ArtifactTier) -> PathBuf {
        dir.join(format!(".{tier}.lock"))
    }

    pub fn acquire(dir: &Path, tier: ArtifactTier) -> io::Result<Self> {
        let path = Self::lock_path(dir, tier);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = file.as_raw_fd();
            loop {
                let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
                if result == 0 {
                    break;
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }

        trace!(path = %path.display(), "build lock acquired");
        Ok(Self { file, path })
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        // The lock file stays: unlinking it would let a waiter lock a dead inode.
        trace!(path = %self.path.display(), "build lock released");
    }
}
