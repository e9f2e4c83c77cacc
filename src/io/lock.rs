use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const RETRY_EVERY: Duration = Duration::from_millis(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Exclusive advisory lock held for one read-modify-write of the store.
///
/// The lock file stays on disk after release; waiters may already hold it
/// open.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("could not lock {path}: {source}")]
    Flock { path: PathBuf, source: io::Error },
    #[error("timed out waiting for {path}; another td process is saving")]
    Timeout { path: PathBuf },
}

impl FileLock {
    /// Lock `path`, creating it and its directory when missing. Retries
    /// while another holder has it, giving up after `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let file = open_lock_file(path).map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let deadline = Instant::now() + timeout;
        loop {
            match try_lock(&file) {
                Ok(()) => return Ok(FileLock { _file: file }),
                Err(e) if e.kind() != io::ErrorKind::WouldBlock => {
                    return Err(LockError::Flock {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
                Err(_) if Instant::now() >= deadline => {
                    return Err(LockError::Timeout {
                        path: path.to_path_buf(),
                    });
                }
                Err(_) => std::thread::sleep(RETRY_EVERY),
            }
        }
    }

    pub fn acquire_default(path: &Path) -> Result<Self, LockError> {
        Self::acquire(path, DEFAULT_TIMEOUT)
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

// released when the descriptor closes
#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor is owned by `file` and open for the call
    match unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> io::Result<()> {
    Ok(())
}
