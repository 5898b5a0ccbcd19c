//! Server loop: raw input events in, lock-key notifications out
//!
//! Owns the event source, the writer end of the channel and the server lock.
//! A reader going away sends the loop back to waiting for the next one; only
//! a source failure, a channel failure or a termination signal ends it.

use lockbell_transport::{decode, Delivery, FifoChannel, RawEventSource};
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::Outcome;
use crate::phase::{Phase, PhaseTracker, Role};
use crate::pidlock::PidLock;
use crate::shutdown::Shutdown;

pub struct Server<S> {
    source: S,
    channel: FifoChannel,
    lock: Option<PidLock>,
    shutdown: Shutdown,
    phase: PhaseTracker,
    sent: u64,
}

impl<S: RawEventSource> Server<S> {
    /// `lock` is released and removed on shutdown; pass `None` when the
    /// caller manages the singleton itself.
    pub fn new(source: S, channel: FifoChannel, lock: Option<PidLock>, shutdown: Shutdown) -> Self {
        Self {
            source,
            channel,
            lock,
            shutdown,
            phase: PhaseTracker::new(Role::Server),
            sent: 0,
        }
    }

    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub async fn run(mut self) -> Outcome {
        info!(
            "Server started: {} -> {}",
            self.source.describe(),
            self.channel.path().display()
        );
        let outcome = self.serve().await;
        self.shut_down(outcome).await
    }

    async fn serve(&mut self) -> Outcome {
        loop {
            self.phase.enter(Phase::WaitingForPeer);
            tokio::select! {
                biased;
                _ = self.shutdown.requested() => return Outcome::Requested,
                opened = self.channel.wait_for_peer() => {
                    if let Err(e) = opened {
                        return e.into();
                    }
                }
            }

            self.phase.enter(Phase::Running);
            if let Some(outcome) = self.forward().await {
                return outcome;
            }
        }
    }

    /// Forward decoded changes until the reader goes away (`None`) or the
    /// loop has to stop
    async fn forward(&mut self) -> Option<Outcome> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.requested() => return Some(Outcome::Requested),
                event = self.source.next_event() => event,
            };
            let event = match event {
                Ok(event) => event,
                Err(e) => return Some(e.into()),
            };
            let Some(change) = decode(&event) else {
                continue;
            };
            info!("{change}");

            let delivery = tokio::select! {
                biased;
                _ = self.shutdown.requested() => return Some(Outcome::Requested),
                delivery = self.channel.send(change) => delivery,
            };
            match delivery {
                Ok(Delivery::Sent) => self.sent += 1,
                Ok(Delivery::PeerLost) => return None,
                Err(e) => return Some(e.into()),
            }
        }
    }

    async fn shut_down(mut self, mut outcome: Outcome) -> Outcome {
        self.phase.enter(Phase::ShuttingDown);
        if outcome.is_success() {
            info!("Shutdown requested");
        }

        if let Err(e) = self.channel.close().await {
            error!("{e}");
            if outcome.is_success() {
                outcome = e.into();
            }
        }
        if let Some(lock) = self.lock.take() {
            if let Err(e) = lock.release() {
                error!("{e}");
                if outcome.is_success() {
                    outcome = e.into();
                }
            }
        }

        info!("Server stopped after {} notifications", self.sent);
        self.phase.enter(Phase::Terminated);
        outcome
    }
}
