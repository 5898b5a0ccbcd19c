use lockbell::audio::sink_for;
use lockbell::session;
use lockbell::{Client, Config, Outcome, PidLock, Shutdown};
use lockbell_transport::FifoReader;
use tracing::info;

/// Run the cue player until shutdown or until the server goes away
pub async fn run(config: &Config, shutdown: Shutdown) -> Outcome {
    let lock = match PidLock::acquire(config.client.pid_file()) {
        Ok(lock) => lock,
        Err(e) => return e.into(),
    };

    let sink = match sink_for(config.client.cue, config.client.volume) {
        Ok(sink) => sink,
        Err(e) => return e.into(),
    };

    info!(
        "Client started for {} on {}",
        session::user_name(),
        config.channel.path.display()
    );
    let reader = FifoReader::new(&config.channel.path);
    Client::new(reader, sink, Some(lock), shutdown).run().await
}
