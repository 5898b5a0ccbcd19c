//! Transport error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a raw input event source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open input device {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The device node went away (unplugged, driver unbound, ENODEV)
    #[error("Input device gone")]
    DeviceGone,

    #[error("Failed to read input event: {0}")]
    Read(#[source] std::io::Error),

    /// An injected stream ran dry because every sender was dropped
    #[error("Event source closed")]
    Closed,
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        if e.raw_os_error() == Some(nix::libc::ENODEV) {
            SourceError::DeviceGone
        } else {
            SourceError::Read(e)
        }
    }
}

/// Errors from the notification FIFO
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to create channel at {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exists but is not a FIFO", .0.display())]
    NotAFifo(PathBuf),

    #[error("Failed to open channel {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove channel {}: {source}", .path.display())]
    Unlink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// End of file on the read end: the writer closed the channel
    #[error("Producer closed the channel")]
    ProducerGone,

    /// A byte that is not one of the six lock-key encodings
    #[error("Malformed notification byte 0x{0:02X}")]
    Malformed(u8),

    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}
