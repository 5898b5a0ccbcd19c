//! Singleton guard: an exclusively flocked file holding the owner's PID
//!
//! The lock is held for as long as the [`PidLock`] lives. Dropping it (or
//! calling [`PidLock::release`]) removes the file before the descriptor is
//! closed, so a competing process never sees a stale PID under a free lock.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use thiserror::Error;
use tracing::{debug, warn};

const LOCK_FILE_MODE: u32 = 0o644;
const ACQUIRE_ATTEMPTS: u32 = 5;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Already running ({})", describe_holder(.pid, .path))]
    AlreadyRunning { path: PathBuf, pid: Option<u32> },

    #[error("Failed to open lock file {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to lock {}: {source}", .path.display())]
    Lock { path: PathBuf, source: Errno },

    #[error("Failed to write pid to {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to remove lock file {}: {source}", .path.display())]
    Remove { path: PathBuf, source: io::Error },
}

fn describe_holder(pid: &Option<u32>, path: &Path) -> String {
    match pid {
        Some(pid) => format!("pid {pid}, lock {}", path.display()),
        None => format!("lock {}", path.display()),
    }
}

pub struct PidLock {
    path: PathBuf,
    file: Option<Flock<File>>,
}

impl PidLock {
    /// Take the lock at `path` without blocking and record our PID in it.
    ///
    /// Fails with [`LockError::AlreadyRunning`] if another open file holds
    /// the lock; the holder's file is not modified.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let mut attempts = 0;
        let locked = loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .mode(LOCK_FILE_MODE)
                .open(&path)
                .map_err(|source| LockError::Open {
                    path: path.clone(),
                    source,
                })?;

            if let Some(locked) = lock_opened(&path, file)? {
                break locked;
            }
            // The holder removed the file between our open and flock
            attempts += 1;
            if attempts >= ACQUIRE_ATTEMPTS {
                return Err(LockError::Lock {
                    path,
                    source: Errno::ESTALE,
                });
            }
            debug!("Lock file {} was replaced, retrying", path.display());
        };

        let write_pid = |mut f: &File| -> io::Result<()> {
            f.set_len(0)?;
            f.rewind()?;
            writeln!(f, "{}", std::process::id())?;
            f.sync_all()
        };
        write_pid(&*locked).map_err(|source| LockError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("Acquired lock {}", path.display());
        Ok(Self {
            path,
            file: Some(locked),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file and drop the lock
    pub fn release(mut self) -> Result<(), LockError> {
        self.remove()
    }

    fn remove(&mut self) -> Result<(), LockError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let result = match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LockError::Remove {
                path: self.path.clone(),
                source,
            }),
        };
        drop(file);
        debug!("Released lock {}", self.path.display());
        result
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("{e}");
        }
    }
}

/// Flock an already opened lock file.
///
/// Returns `None` when the locked inode is no longer the file at `path`: the
/// previous holder unlinked it after we opened it, so holding its lock means
/// nothing.
fn lock_opened(path: &Path, file: File) -> Result<Option<Flock<File>>, LockError> {
    let locked = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(locked) => locked,
        Err((mut file, Errno::EWOULDBLOCK)) => {
            let pid = read_pid(&mut file);
            return Err(LockError::AlreadyRunning {
                path: path.to_path_buf(),
                pid,
            });
        }
        Err((_, source)) => {
            return Err(LockError::Lock {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let held = locked.metadata().map_err(|source| LockError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    match std::fs::metadata(path) {
        Ok(current) if current.dev() == held.dev() && current.ino() == held.ino() => {
            Ok(Some(locked))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LockError::Open {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}
