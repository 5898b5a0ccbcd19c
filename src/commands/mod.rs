//! Command handlers for the CLI application.
//!
//! - `server`: privileged producer loop
//! - `client`: per-user cue loop
//! - `devices`: list candidate keyboards
//! - `watch`: print decoded changes from a keyboard

pub mod client;
pub mod devices;
pub mod server;
pub mod watch;

use std::path::PathBuf;

use lockbell_transport::{discover_keyboard, SourceError};
use tracing::info;

/// Explicit device node, else the first discovered keyboard
pub fn resolve_device(explicit: Option<PathBuf>) -> Result<PathBuf, SourceError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let keyboard = discover_keyboard()?;
    info!("Keyboard found: {} ({})", keyboard.name, keyboard.path.display());
    Ok(keyboard.path)
}
