//! Named FIFO notification channel
//!
//! One writer (the server), one reader (the client). Each notification is a
//! single byte, so every write is atomic and messages can never interleave.
//!
//! Opening either end is a rendezvous: the writer's open blocks until a
//! reader shows up and vice versa. Both opens run on tokio's blocking pool
//! and the pending open is kept in the struct, so awaiting it again after a
//! cancelled `select!` branch picks up the same open instead of starting a
//! second one. On shutdown the pending open is released by completing the
//! rendezvous from our own side.
//!
//! When the reader goes away the next write fails with `EPIPE`. The writer
//! then unlinks and recreates the FIFO and waits for a new reader on the next
//! send; that message is lost, later ones are delivered.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::types::LockKeyChanged;

/// Default channel location, shared with existing deployments
pub const DEFAULT_PATH: &str = "/tmp/caps_lock";

/// Default permission bits: root writes, any user may read
pub const DEFAULT_MODE: u32 = 0o644;

/// How many times the reader retries completing its own rendezvous on
/// shutdown before leaving the blocked open behind
const ABORT_RETRIES: u32 = 100;
const ABORT_RETRY_DELAY: Duration = Duration::from_millis(5);

/// Result of a send that did not hit a hard error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the attached reader
    Sent,
    /// The reader had gone away; the message was dropped and the FIFO has
    /// been recreated for the next reader
    PeerLost,
}

type PendingOpen = JoinHandle<io::Result<File>>;

fn join_error(e: tokio::task::JoinError) -> ChannelError {
    ChannelError::Io(io::Error::other(e))
}

/// Make sure `path` is a FIFO with permission bits `mode`.
///
/// An existing FIFO is left alone so readers already blocked on it keep
/// their rendezvous.
fn ensure_fifo(path: &Path, mode: u32) -> Result<(), ChannelError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => return Ok(()),
        Ok(_) => return Err(ChannelError::NotAFifo(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ChannelError::Create {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    match nix::unistd::mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR) {
        Ok(()) => {}
        // Lost a race with another creator; accept it if it made a FIFO
        Err(Errno::EEXIST) => return ensure_fifo(path, mode),
        Err(errno) => {
            return Err(ChannelError::Create {
                path: path.to_path_buf(),
                source: errno.into(),
            })
        }
    }

    // Explicit chmod so the process umask does not decide who may read
    std::fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|source| {
        ChannelError::Create {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!("Created FIFO {} (mode {:o})", path.display(), mode);
    Ok(())
}

/// Writer side of the channel, owned by the server
pub struct FifoChannel {
    path: PathBuf,
    mode: u32,
    writer: Option<pipe::Sender>,
    pending_open: Option<PendingOpen>,
}

impl FifoChannel {
    /// Create the FIFO if needed. Idempotent.
    pub fn create(path: impl Into<PathBuf>, mode: u32) -> Result<Self, ChannelError> {
        let path = path.into();
        ensure_fifo(&path, mode)?;
        Ok(Self {
            path,
            mode,
            writer: None,
            pending_open: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a reader is currently attached
    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Block until a reader opens the channel. Cancel safe.
    pub async fn wait_for_peer(&mut self) -> Result<(), ChannelError> {
        if self.writer.is_some() {
            return Ok(());
        }

        let handle = self.pending_open.get_or_insert_with(|| {
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || OpenOptions::new().write(true).open(path))
        });
        let joined = handle.await;
        self.pending_open = None;

        let file = joined.map_err(join_error)?.map_err(|source| ChannelError::Open {
            path: self.path.clone(),
            source,
        })?;
        self.writer = Some(pipe::Sender::from_file(file)?);
        info!("Reader attached to {}", self.path.display());
        Ok(())
    }

    /// Send one notification, waiting for a reader first if none is attached
    pub async fn send(&mut self, change: LockKeyChanged) -> Result<Delivery, ChannelError> {
        self.wait_for_peer().await?;
        let Some(writer) = self.writer.as_mut() else {
            return Ok(Delivery::PeerLost);
        };

        match writer.write_all(&[change.to_wire()]).await {
            Ok(()) => {
                debug!("Sent {change}");
                Ok(Delivery::Sent)
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                warn!("Reader went away, dropped {change}; recreating channel");
                self.writer = None;
                self.recreate()?;
                Ok(Delivery::PeerLost)
            }
            Err(e) => Err(ChannelError::Io(e)),
        }
    }

    /// Unlink and create a fresh FIFO at the same path
    pub fn recreate(&mut self) -> Result<(), ChannelError> {
        self.writer = None;
        self.unlink()?;
        ensure_fifo(&self.path, self.mode)
    }

    /// Remove the FIFO from the filesystem. A missing file is fine.
    pub fn unlink(&self) -> Result<(), ChannelError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ChannelError::Unlink {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Release a writer open that is still blocked waiting for a reader
    pub async fn abort_pending_open(&mut self) {
        let Some(handle) = self.pending_open.take() else {
            return;
        };
        // A non-blocking read open always succeeds on a FIFO and satisfies
        // the blocked writer; hold it until the open has returned.
        match OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&self.path)
        {
            Ok(_reader) => {
                let _ = handle.await;
            }
            Err(e) => warn!(
                "Could not release pending open on {}: {e}",
                self.path.display()
            ),
        }
    }

    /// Drop the writer, release any pending open and unlink the FIFO
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        self.abort_pending_open().await;
        self.writer = None;
        self.unlink()
    }
}

/// Reader side of the channel, owned by the client
pub struct FifoReader {
    path: PathBuf,
    receiver: Option<pipe::Receiver>,
    pending_open: Option<PendingOpen>,
    buffered: VecDeque<u8>,
}

impl FifoReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            receiver: None,
            pending_open: None,
            buffered: VecDeque::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.receiver.is_some()
    }

    /// Block until a writer opens the channel. Cancel safe.
    pub async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.receiver.is_some() {
            return Ok(());
        }

        let handle = self.pending_open.get_or_insert_with(|| {
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || OpenOptions::new().read(true).open(path))
        });
        let joined = handle.await;
        self.pending_open = None;

        let file = joined.map_err(join_error)?.map_err(|source| ChannelError::Open {
            path: self.path.clone(),
            source,
        })?;
        self.receiver = Some(pipe::Receiver::from_file(file)?);
        info!("Connected to {}", self.path.display());
        Ok(())
    }

    /// Wait for the next notification.
    ///
    /// Returns [`ChannelError::ProducerGone`] at end of file and
    /// [`ChannelError::Malformed`] for a byte outside the six encodings; the
    /// reader stays usable after the latter.
    pub async fn receive(&mut self) -> Result<LockKeyChanged, ChannelError> {
        loop {
            if let Some(byte) = self.buffered.pop_front() {
                return LockKeyChanged::from_wire(byte).ok_or(ChannelError::Malformed(byte));
            }

            self.connect().await?;
            let Some(receiver) = self.receiver.as_mut() else {
                continue;
            };

            let mut buf = [0u8; 64];
            let n = receiver.read(&mut buf).await?;
            if n == 0 {
                self.receiver = None;
                return Err(ChannelError::ProducerGone);
            }
            self.buffered.extend(&buf[..n]);
        }
    }

    /// Release a reader open that is still blocked waiting for a writer
    pub async fn abort_pending_open(&mut self) {
        let Some(mut handle) = self.pending_open.take() else {
            return;
        };
        // A non-blocking write open only succeeds once our reader is inside
        // open(), so retry briefly until the blocking task gets there.
        for _ in 0..ABORT_RETRIES {
            if handle.is_finished() {
                break;
            }
            match OpenOptions::new()
                .write(true)
                .custom_flags(OFlag::O_NONBLOCK.bits())
                .open(&self.path)
            {
                Ok(_writer) => {
                    let _ = (&mut handle).await;
                    return;
                }
                Err(e) if e.raw_os_error() == Some(nix::libc::ENXIO) => {
                    tokio::time::sleep(ABORT_RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(
                        "Could not release pending open on {}: {e}",
                        self.path.display()
                    );
                    return;
                }
            }
        }
        if handle.is_finished() {
            let _ = handle.await;
        } else {
            warn!("Pending open on {} did not return", self.path.display());
        }
    }

    /// Drop the read end
    pub async fn close(&mut self) {
        self.abort_pending_open().await;
        self.receiver = None;
        self.buffered.clear();
    }
}
