//! Raw input event sources
//!
//! [`EvdevSource`] reads a real `/dev/input/eventN` node through evdev's
//! tokio stream. [`InjectedSource`] replays synthetic events handed to it
//! through an [`InjectedSender`], so the server loop can be driven without a
//! keyboard.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use evdev::{Device, EventStream, LedType};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::types::{LockKey, LockKeyChanged, LockState, RawEvent};

/// Blocking "read next raw event" over some event stream
#[async_trait]
pub trait RawEventSource: Send {
    /// Wait for the next event; any error ends the stream for good
    async fn next_event(&mut self) -> Result<RawEvent, SourceError>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Kernel evdev node, opened read-only and never grabbed
pub struct EvdevSource {
    stream: EventStream,
    path: PathBuf,
    name: String,
}

impl EvdevSource {
    /// Open an event node. Must be called inside a tokio runtime.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let device = Device::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let name = device.name().unwrap_or("unnamed device").to_string();

        match current_states(&device) {
            Ok(states) => {
                for change in &states {
                    info!("Initial indicator: {change}");
                }
            }
            Err(e) => debug!("Could not read LED state of {}: {e}", path.display()),
        }

        let stream = device
            .into_event_stream()
            .map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            stream,
            path: path.to_path_buf(),
            name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RawEventSource for EvdevSource {
    async fn next_event(&mut self) -> Result<RawEvent, SourceError> {
        let event = self.stream.next_event().await?;
        Ok(RawEvent::from(event))
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.name, self.path.display())
    }
}

/// Current indicator level of every tracked key the device has an LED for
pub fn current_states(device: &Device) -> std::io::Result<Vec<LockKeyChanged>> {
    let lit = device.get_led_state()?;
    let supported = device.supported_leds();
    Ok(LockKey::ALL
        .iter()
        .filter(|key| supported.is_some_and(|leds| leds.contains(LedType(key.led_code()))))
        .map(|&key| {
            let state = if lit.contains(LedType(key.led_code())) {
                LockState::On
            } else {
                LockState::Off
            };
            LockKeyChanged::new(key, state)
        })
        .collect())
}

/// Sending half of an injected event stream
#[derive(Clone)]
pub struct InjectedSender {
    tx: mpsc::UnboundedSender<RawEvent>,
}

impl InjectedSender {
    /// Queue an event; returns false once the source has been dropped
    pub fn send(&self, event: RawEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Queue several events in order
    pub fn send_all<I>(&self, events: I) -> bool
    where
        I: IntoIterator<Item = RawEvent>,
    {
        events.into_iter().all(|event| self.send(event))
    }
}

/// Event source fed from an [`InjectedSender`]
pub struct InjectedSource {
    rx: mpsc::UnboundedReceiver<RawEvent>,
}

/// Create a connected injected sender/source pair
pub fn injected() -> (InjectedSender, InjectedSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InjectedSender { tx }, InjectedSource { rx })
}

#[async_trait]
impl RawEventSource for InjectedSource {
    async fn next_event(&mut self) -> Result<RawEvent, SourceError> {
        self.rx.recv().await.ok_or(SourceError::Closed)
    }

    fn describe(&self) -> String {
        "injected events".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ev, led};

    #[tokio::test]
    async fn test_injected_source_preserves_order() {
        let (tx, mut source) = injected();
        assert!(tx.send_all([
            RawEvent::new(ev::KEY, 58, 1),
            RawEvent::led(LockKey::Caps, 1),
            RawEvent::syn(),
        ]));

        assert_eq!(source.next_event().await.unwrap().kind, ev::KEY);
        let indicator = source.next_event().await.unwrap();
        assert_eq!((indicator.kind, indicator.code), (ev::LED, led::CAPSL));
        assert_eq!(source.next_event().await.unwrap().kind, ev::SYN);
    }

    #[tokio::test]
    async fn test_injected_source_closes_when_sender_dropped() {
        let (tx, mut source) = injected();
        tx.send(RawEvent::syn());
        drop(tx);

        assert!(source.next_event().await.is_ok());
        assert!(matches!(
            source.next_event().await,
            Err(SourceError::Closed)
        ));
    }

    #[test]
    fn test_enodev_maps_to_device_gone() {
        let err = std::io::Error::from_raw_os_error(nix::libc::ENODEV);
        assert!(matches!(SourceError::from(err), SourceError::DeviceGone));

        let err = std::io::Error::from_raw_os_error(nix::libc::EIO);
        assert!(matches!(SourceError::from(err), SourceError::Read(_)));
    }
}
