use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// How long mutating store calls wait for a busy project
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive advisory lock on one project, released when dropped.
///
/// The lock is a `flock` on the hidden `.<project>.lock` file in the data
/// directory. The file stays in place after release: unlinking it would let
/// a waiter lock an orphaned inode while a newcomer locks a fresh file.
#[derive(Debug)]
pub struct ProjectLock {
    // held for the flock; closing the descriptor releases it
    _file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("could not lock {path}: {source}")]
    Flock { path: PathBuf, source: io::Error },
    #[error("project {project} is busy: another process is writing to it")]
    Busy { project: String },
}

pub fn lock_path(datadir: &Path, project_name: &str) -> PathBuf {
    datadir.join(format!(".{}.lock", project_name))
}

impl ProjectLock {
    /// Lock `project_name`, retrying until `wait` has passed.
    pub fn acquire(datadir: &Path, project_name: &str, wait: Duration) -> Result<Self, LockError> {
        let path = lock_path(datadir, project_name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + wait;
        while !try_flock(&file).map_err(|source| LockError::Flock {
            path: path.clone(),
            source,
        })? {
            if Instant::now() >= deadline {
                return Err(LockError::Busy {
                    project: project_name.to_string(),
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }

        tracing::trace!(project = project_name, "acquired project lock");
        Ok(ProjectLock { _file: file })
    }

    pub fn acquire_default(datadir: &Path, project_name: &str) -> Result<Self, LockError> {
        Self::acquire(datadir, project_name, DEFAULT_LOCK_WAIT)
    }
}

/// Ok(false) when another descriptor holds the lock
#[cfg(unix)]
fn try_flock(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and open for the whole call
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> io::Result<bool> {
    Ok(true)
}
