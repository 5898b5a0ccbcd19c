//! Keyboard device discovery
//!
//! A usable keyboard is any evdev node that reports both the Caps Lock key and
//! a Caps Lock indicator LED. Virtual devices without LEDs (media keys, power
//! buttons, uinput injectors) are skipped.

use std::path::PathBuf;

use evdev::{Device, Key, LedType};
use tracing::debug;

use crate::error::SourceError;
use crate::source::current_states;
use crate::types::LockKeyChanged;

/// A candidate keyboard node
#[derive(Debug, Clone)]
pub struct KeyboardInfo {
    pub path: PathBuf,
    pub name: String,
    /// Current indicator levels, empty if they could not be read
    pub states: Vec<LockKeyChanged>,
}

fn is_lock_keyboard(device: &Device) -> bool {
    let has_key = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::KEY_CAPSLOCK));
    let has_led = device
        .supported_leds()
        .is_some_and(|leds| leds.contains(LedType::LED_CAPSL));
    has_key && has_led
}

/// Every keyboard node with a Caps Lock LED, sorted by path
pub fn list_keyboards() -> Vec<KeyboardInfo> {
    let mut found: Vec<KeyboardInfo> = evdev::enumerate()
        .filter(|(path, device)| {
            let usable = is_lock_keyboard(device);
            debug!(
                "{}: {} ({})",
                path.display(),
                device.name().unwrap_or("unnamed"),
                if usable { "keyboard" } else { "skipped" }
            );
            usable
        })
        .map(|(path, device)| KeyboardInfo {
            name: device.name().unwrap_or("unnamed device").to_string(),
            states: current_states(&device).unwrap_or_default(),
            path,
        })
        .collect();
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

/// Pick the first keyboard node
pub fn discover_keyboard() -> Result<KeyboardInfo, SourceError> {
    list_keyboards().into_iter().next().ok_or_else(|| {
        SourceError::DeviceNotFound(
            "no input device with a Caps Lock LED (is /dev/input readable?)".to_string(),
        )
    })
}
