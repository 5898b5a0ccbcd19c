//! Fatal errors and loop outcomes

use lockbell_transport::{ChannelError, SourceError};
use thiserror::Error;

use crate::audio::AudioError;
use crate::config::ConfigError;
use crate::pidlock::LockError;

/// Anything that ends a loop with a non-zero exit
#[derive(Error, Debug)]
pub enum Fatal {
    #[error("Input device: {0}")]
    Source(#[from] SourceError),

    #[error("Channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("{0}")]
    Lock(#[from] LockError),

    #[error("Audio: {0}")]
    Audio(#[from] AudioError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Why a server or client loop stopped
#[derive(Debug)]
pub enum Outcome {
    /// Termination signal
    Requested,
    /// Another instance holds the lock
    AlreadyRunning { pid: Option<u32> },
    /// Client only: the server closed the channel
    ProducerGone,
    Fatal(Fatal),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Requested => 0,
            Outcome::Fatal(_) => 1,
            Outcome::AlreadyRunning { .. } => 2,
            Outcome::ProducerGone => 3,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Requested)
    }
}

impl From<Fatal> for Outcome {
    fn from(fatal: Fatal) -> Self {
        match fatal {
            Fatal::Lock(LockError::AlreadyRunning { pid, .. }) => Outcome::AlreadyRunning { pid },
            fatal => Outcome::Fatal(fatal),
        }
    }
}

macro_rules! outcome_from {
    ($($err:ty),*) => {
        $(impl From<$err> for Outcome {
            fn from(e: $err) -> Self {
                Fatal::from(e).into()
            }
        })*
    };
}

outcome_from!(SourceError, ChannelError, LockError, AudioError, ConfigError);
