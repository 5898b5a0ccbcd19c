//! Client loop: lock-key notifications in, audible cues out
//!
//! The client waits for the channel to appear, attaches as its reader and
//! plays one cue per notification. The server closing the channel ends the
//! client with [`Outcome::ProducerGone`]; it does not reconnect.

use lockbell_transport::{wait_for_path, ChannelError, FifoReader};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::audio::{Cue, CueSink};
use crate::error::Outcome;
use crate::phase::{Phase, PhaseTracker, Role};
use crate::pidlock::PidLock;
use crate::shutdown::Shutdown;

pub struct Client<K> {
    reader: FifoReader,
    sink: K,
    lock: Option<PidLock>,
    shutdown: Shutdown,
    phase: PhaseTracker,
    played: u64,
}

impl<K: CueSink> Client<K> {
    pub fn new(reader: FifoReader, sink: K, lock: Option<PidLock>, shutdown: Shutdown) -> Self {
        Self {
            reader,
            sink,
            lock,
            shutdown,
            phase: PhaseTracker::new(Role::Client),
            played: 0,
        }
    }

    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub async fn run(mut self) -> Outcome {
        let outcome = self.serve().await;
        self.shut_down(outcome).await
    }

    async fn serve(&mut self) -> Outcome {
        // Session gate: the server may not have created the channel yet
        let path = self.reader.path().to_path_buf();
        tokio::select! {
            biased;
            _ = self.shutdown.requested() => return Outcome::Requested,
            appeared = wait_for_path(&path) => {
                if let Err(e) = appeared {
                    return ChannelError::Io(e).into();
                }
            }
        }

        self.phase.enter(Phase::WaitingForPeer);
        tokio::select! {
            biased;
            _ = self.shutdown.requested() => return Outcome::Requested,
            connected = self.reader.connect() => {
                if let Err(e) = connected {
                    return e.into();
                }
            }
        }

        self.phase.enter(Phase::Running);
        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.requested() => return Outcome::Requested,
                received = self.reader.receive() => received,
            };
            match received {
                Ok(change) => {
                    info!("{change}");
                    if let Err(e) = self.sink.play(Cue::from(change.state)).await {
                        warn!("Cue playback failed: {e}");
                    }
                    self.played += 1;
                }
                Err(ChannelError::Malformed(byte)) => {
                    warn!("Ignoring malformed notification 0x{byte:02x}");
                }
                Err(ChannelError::ProducerGone) => return Outcome::ProducerGone,
                Err(e) => return e.into(),
            }
        }
    }

    async fn shut_down(mut self, mut outcome: Outcome) -> Outcome {
        self.phase.enter(Phase::ShuttingDown);
        match &outcome {
            Outcome::Requested => info!("Shutdown requested"),
            Outcome::ProducerGone => warn!("Server has gone offline"),
            Outcome::AlreadyRunning { .. } | Outcome::Fatal(_) => {}
        }

        self.reader.close().await;
        if let Some(lock) = self.lock.take() {
            if let Err(e) = lock.release() {
                error!("{e}");
                if outcome.is_success() {
                    outcome = e.into();
                }
            }
        }

        info!("Client stopped after {} cues", self.played);
        self.phase.enter(Phase::Terminated);
        outcome
    }
}
