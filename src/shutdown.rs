//! Cooperative shutdown signal
//!
//! The signal handler only flips a flag; the server and client loops `select!`
//! on [`Shutdown::requested`] around every blocking step and run their cleanup
//! on the main task.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Trigger side, cloneable
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/observer pair
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx: Arc::new(tx) }, Shutdown { rx })
}

impl Shutdown {
    /// Install the process-wide SIGINT/SIGTERM/SIGHUP handler.
    ///
    /// Can only be called once per process.
    pub fn install() -> Result<Self, ctrlc::Error> {
        let (handle, shutdown) = channel();
        ctrlc::set_handler(move || {
            info!("Received termination signal");
            handle.trigger();
        })?;
        Ok(shutdown)
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested. Cancel safe; resolves
    /// immediately if the request already happened.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            // Every handle dropped without triggering: never shut down
            std::future::pending::<()>().await;
        }
    }
}
