//! Run phases shared by the server and client loops
//!
//! ```text
//! Initializing -> WaitingForPeer -> Running -> ShuttingDown -> Terminated
//!                        ^             |
//!                        +-------------+   (server only: reader went away)
//! ```
//!
//! Any phase before `ShuttingDown` may jump straight to it.

use std::fmt;

use tokio::sync::watch;
use tracing::{info, warn};

/// Which process is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Server => "server",
            Role::Client => "client",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    WaitingForPeer,
    Running,
    ShuttingDown,
    Terminated,
}

impl Phase {
    /// Whether `self -> next` is a legal transition for `role`
    pub fn can_advance_to(self, next: Phase, role: Role) -> bool {
        use Phase::*;
        match (self, next) {
            (Initializing, WaitingForPeer) => true,
            (WaitingForPeer, Running) => true,
            (Running, WaitingForPeer) => role == Role::Server,
            (Initializing | WaitingForPeer | Running, ShuttingDown) => true,
            (ShuttingDown, Terminated) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Initializing => "initializing",
            Phase::WaitingForPeer => "waiting for peer",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting down",
            Phase::Terminated => "terminated",
        })
    }
}

/// Current phase of one loop, observable through a watch channel
pub struct PhaseTracker {
    role: Role,
    tx: watch::Sender<Phase>,
}

impl PhaseTracker {
    pub fn new(role: Role) -> Self {
        let (tx, _) = watch::channel(Phase::Initializing);
        Self { role, tx }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    /// Move to `next`. Re-entering the current phase is a no-op.
    pub fn enter(&self, next: Phase) {
        let current = self.current();
        if current == next {
            return;
        }
        if !current.can_advance_to(next, self.role) {
            warn!("{}: unexpected transition {current} -> {next}", self.role);
        }
        info!("{}: {next}", self.role);
        self.tx.send_replace(next);
    }
}
