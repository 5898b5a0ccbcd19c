// lockbell - audible lock-key indicator
// Shared library: config, singleton lock, run phases, server and client loops

pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod phase;
pub mod pidlock;
pub mod server;
pub mod session;
pub mod shutdown;

pub use audio::{BellSink, Cue, CueSink, CueStyle, SilentSink};
pub use client::Client;
pub use config::Config;
pub use error::{Fatal, Outcome};
pub use phase::{Phase, PhaseTracker, Role};
pub use pidlock::{LockError, PidLock};
pub use server::Server;
pub use shutdown::{Shutdown, ShutdownHandle};
