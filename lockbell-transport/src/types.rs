//! Common types for the lock-key pipeline

use std::fmt;
use std::time::SystemTime;

/// Linux input event classes (`EV_*` in `input-event-codes.h`)
pub mod ev {
    /// Synchronization marker
    pub const SYN: u16 = 0x00;
    /// Key press/release/repeat
    pub const KEY: u16 = 0x01;
    /// Miscellaneous, carries the scan-code echo (`MSC_SCAN`)
    pub const MSC: u16 = 0x04;
    /// Keyboard indicator LED
    pub const LED: u16 = 0x11;
}

/// Indicator LED codes (`LED_*`)
pub mod led {
    pub const NUML: u16 = 0x00;
    pub const CAPSL: u16 = 0x01;
    pub const SCROLLL: u16 = 0x02;
    pub const COMPOSE: u16 = 0x03;
    pub const KANA: u16 = 0x04;
}

/// Key codes of the lock keys (`KEY_*`)
pub mod key {
    pub const CAPSLOCK: u16 = 58;
    pub const NUMLOCK: u16 = 69;
    pub const SCROLLLOCK: u16 = 70;
}

/// One `input_event` record as read from the device, type/code/value verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
    pub timestamp: SystemTime,
}

impl RawEvent {
    /// Build an event stamped with the current time
    pub fn new(kind: u16, code: u16, value: i32) -> Self {
        Self {
            kind,
            code,
            value,
            timestamp: SystemTime::now(),
        }
    }

    /// Indicator event for a lock key
    pub fn led(key: LockKey, value: i32) -> Self {
        Self::new(ev::LED, key.led_code(), value)
    }

    /// Sync marker (`SYN_REPORT`)
    pub fn syn() -> Self {
        Self::new(ev::SYN, 0, 0)
    }
}

impl From<evdev::InputEvent> for RawEvent {
    fn from(event: evdev::InputEvent) -> Self {
        Self {
            kind: event.event_type().0,
            code: event.code(),
            value: event.value(),
            timestamp: event.timestamp(),
        }
    }
}

/// The fixed set of tracked lock keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Caps,
    Num,
    Scroll,
}

impl LockKey {
    pub const ALL: &'static [LockKey] = &[LockKey::Caps, LockKey::Num, LockKey::Scroll];

    /// LED code that reports this key's indicator
    pub fn led_code(self) -> u16 {
        match self {
            LockKey::Caps => led::CAPSL,
            LockKey::Num => led::NUML,
            LockKey::Scroll => led::SCROLLL,
        }
    }

    /// Key code of the physical key
    pub fn key_code(self) -> u16 {
        match self {
            LockKey::Caps => key::CAPSLOCK,
            LockKey::Num => key::NUMLOCK,
            LockKey::Scroll => key::SCROLLLOCK,
        }
    }

    pub fn from_led_code(code: u16) -> Option<Self> {
        match code {
            led::CAPSL => Some(LockKey::Caps),
            led::NUML => Some(LockKey::Num),
            led::SCROLLL => Some(LockKey::Scroll),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LockKey::Caps => "Caps Lock",
            LockKey::Num => "Num Lock",
            LockKey::Scroll => "Scroll Lock",
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Indicator level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    On,
    Off,
}

impl LockState {
    /// Map an indicator value; anything but 0/1 is not a lock state
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            1 => Some(LockState::On),
            0 => Some(LockState::Off),
            _ => None,
        }
    }

    pub fn is_on(self) -> bool {
        self == LockState::On
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockState::On => "on",
            LockState::Off => "off",
        })
    }
}

/// A confirmed indicator transition, the only payload on the channel.
///
/// Wire format is a single byte, in this exact order for compatibility with
/// existing deployments:
///
/// | byte | meaning    |
/// |------|------------|
/// | 0    | Caps on    |
/// | 1    | Caps off   |
/// | 2    | Num on     |
/// | 3    | Num off    |
/// | 4    | Scroll on  |
/// | 5    | Scroll off |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockKeyChanged {
    pub key: LockKey,
    pub state: LockState,
}

impl LockKeyChanged {
    /// Encoded size; well below `PIPE_BUF`, so every send is one atomic write
    pub const WIRE_SIZE: usize = 1;

    pub fn new(key: LockKey, state: LockState) -> Self {
        Self { key, state }
    }

    pub fn to_wire(self) -> u8 {
        let base = match self.key {
            LockKey::Caps => 0,
            LockKey::Num => 2,
            LockKey::Scroll => 4,
        };
        match self.state {
            LockState::On => base,
            LockState::Off => base + 1,
        }
    }

    pub fn from_wire(byte: u8) -> Option<Self> {
        let key = match byte {
            0 | 1 => LockKey::Caps,
            2 | 3 => LockKey::Num,
            4 | 5 => LockKey::Scroll,
            _ => return None,
        };
        let state = if byte % 2 == 0 {
            LockState::On
        } else {
            LockState::Off
        };
        Some(Self { key, state })
    }
}

impl fmt::Display for LockKeyChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.state)
    }
}
