use lockbell::session;
use lockbell::{Config, Outcome, PidLock, Server, Shutdown};
use lockbell_transport::{EvdevSource, FifoChannel};
use tracing::{info, warn};

use super::resolve_device;

/// Run the producer until shutdown or a fatal error
pub async fn run(config: &Config, shutdown: Shutdown) -> Outcome {
    if !session::is_root() {
        warn!("Not running as root; the input device and lock file may be inaccessible");
    }

    let lock = match PidLock::acquire(&config.server.pid_file) {
        Ok(lock) => lock,
        Err(e) => return e.into(),
    };

    let device = match resolve_device(config.server.device.clone()) {
        Ok(device) => device,
        Err(e) => return e.into(),
    };
    let source = match EvdevSource::open(&device) {
        Ok(source) => source,
        Err(e) => return e.into(),
    };
    let channel = match FifoChannel::create(&config.channel.path, config.channel.mode) {
        Ok(channel) => channel,
        Err(e) => return e.into(),
    };
    info!(
        "Channel ready at {} (mode {:o})",
        channel.path().display(),
        config.channel.mode
    );

    Server::new(source, channel, Some(lock), shutdown).run().await
}
