use std::path::PathBuf;

use lockbell::Shutdown;
use lockbell_transport::{decode, EvdevSource, RawEventSource};

use super::resolve_device;

/// Print decoded lock-key changes until interrupted
pub async fn run(device: Option<PathBuf>, mut shutdown: Shutdown) -> anyhow::Result<()> {
    let device = resolve_device(device)?;
    let mut source = EvdevSource::open(&device)?;
    println!("Watching {} (Ctrl+C to stop)", source.describe());

    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.requested() => return Ok(()),
            event = source.next_event() => event?,
        };
        if let Some(change) = decode(&event) {
            println!("{change}");
        }
    }
}
