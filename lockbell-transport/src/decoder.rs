//! Indicator-direct lock-key decoding
//!
//! A Caps Lock toggle on a typical keyboard shows up on the event node as:
//!
//! ```text
//! Caps on                          Caps off
//! [EV_MSC, MSC_SCAN,  0x70039]     [EV_MSC, MSC_SCAN,  0x70039]
//! [EV_KEY, KEY_CAPSLOCK, 1]        [EV_KEY, KEY_CAPSLOCK, 1]
//! [EV_SYN, SYN_REPORT,   0]        [EV_SYN, SYN_REPORT,   0]
//! [EV_LED, LED_CAPSL,    1]        [EV_MSC, MSC_SCAN,  0x70039]
//! [EV_SYN, SYN_REPORT,   0]        [EV_KEY, KEY_CAPSLOCK, 0]
//! [EV_MSC, MSC_SCAN,  0x70039]     [EV_SYN, SYN_REPORT,   0]
//! [EV_KEY, KEY_CAPSLOCK, 0]        [EV_LED, LED_CAPSL,    0]
//! [EV_SYN, SYN_REPORT,   0]        [EV_SYN, SYN_REPORT,   0]
//! ```
//!
//! The LED event lands at a different offset from the key press depending on
//! direction, driver and vendor, and a press does not always toggle the
//! indicator. Correlating presses with "the LED event N events later" breaks
//! as soon as one record is missed. So only `EV_LED` events for a tracked key
//! are looked at: each one maps to exactly one [`LockKeyChanged`] and every
//! other event is dropped. No state is carried between events, which is what
//! makes the decoder impossible to desynchronize.

use tracing::{debug, trace};

use crate::types::{ev, LockKey, LockKeyChanged, LockState, RawEvent};

/// What a single raw event means for lock-key tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Indicator event for a tracked key with a valid 0/1 level
    Indicator(LockKeyChanged),
    /// Indicator event for a tracked key with a level that is not 0 or 1
    InvalidIndicator { key: LockKey, value: i32 },
    /// Anything else: sync, scan echo, key press/release, other LEDs
    Ignored,
}

/// Classify one raw event
pub fn classify(event: &RawEvent) -> Classification {
    if event.kind != ev::LED {
        return Classification::Ignored;
    }
    let Some(key) = LockKey::from_led_code(event.code) else {
        return Classification::Ignored;
    };
    match LockState::from_value(event.value) {
        Some(state) => Classification::Indicator(LockKeyChanged::new(key, state)),
        None => Classification::InvalidIndicator {
            key,
            value: event.value,
        },
    }
}

/// Decode one raw event into a lock-key change, if it is one
pub fn decode(event: &RawEvent) -> Option<LockKeyChanged> {
    match classify(event) {
        Classification::Indicator(change) => {
            trace!("decoded {change}");
            Some(change)
        }
        Classification::InvalidIndicator { key, value } => {
            debug!("dropping {key} indicator event with invalid value {value}");
            None
        }
        Classification::Ignored => None,
    }
}

/// Lazy adapter from raw events to lock-key changes
pub struct Decoder<I> {
    events: I,
}

impl<I> Decoder<I>
where
    I: Iterator<Item = RawEvent>,
{
    pub fn new(events: I) -> Self {
        Self { events }
    }
}

impl<I> Iterator for Decoder<I>
where
    I: Iterator<Item = RawEvent>,
{
    type Item = LockKeyChanged;

    fn next(&mut self) -> Option<LockKeyChanged> {
        self.events.by_ref().find_map(|event| decode(&event))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.events.size_hint().1)
    }
}

/// Decode every event of `events`, lazily
pub fn decode_all<I>(events: I) -> Decoder<I::IntoIter>
where
    I: IntoIterator<Item = RawEvent>,
{
    Decoder::new(events.into_iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{key, led};

    fn raw(kind: u16, code: u16, value: i32) -> RawEvent {
        RawEvent::new(kind, code, value)
    }

    fn on(key: LockKey) -> LockKeyChanged {
        LockKeyChanged::new(key, LockState::On)
    }

    fn off(key: LockKey) -> LockKeyChanged {
        LockKeyChanged::new(key, LockState::Off)
    }

    #[test]
    fn test_single_caps_indicator() {
        let out: Vec<_> = decode_all([raw(ev::LED, led::CAPSL, 1)]).collect();
        assert_eq!(out, vec![on(LockKey::Caps)]);
    }

    #[test]
    fn test_press_and_sync_produce_nothing() {
        let input = [
            raw(ev::KEY, key::CAPSLOCK, 1),
            raw(ev::SYN, 0, 0),
            raw(ev::LED, led::CAPSL, 1),
            raw(ev::SYN, 0, 0),
        ];
        let out: Vec<_> = decode_all(input).collect();
        assert_eq!(out, vec![on(LockKey::Caps)]);
    }

    #[test]
    fn test_num_lock_off() {
        let out: Vec<_> = decode_all([raw(ev::LED, led::NUML, 0)]).collect();
        assert_eq!(out, vec![off(LockKey::Num)]);
    }

    #[test]
    fn test_invalid_value_dropped() {
        let event = raw(ev::LED, led::CAPSL, 2);
        assert_eq!(
            classify(&event),
            Classification::InvalidIndicator {
                key: LockKey::Caps,
                value: 2
            }
        );
        assert_eq!(decode_all([event]).count(), 0);
    }

    #[test]
    fn test_full_toggle_cycle() {
        // Caps on then off, with the scan echoes a USB keyboard emits
        let input = [
            raw(ev::MSC, 4, 0x70039),
            raw(ev::KEY, key::CAPSLOCK, 1),
            raw(ev::SYN, 0, 0),
            raw(ev::LED, led::CAPSL, 1),
            raw(ev::SYN, 0, 0),
            raw(ev::MSC, 4, 0x70039),
            raw(ev::KEY, key::CAPSLOCK, 0),
            raw(ev::SYN, 0, 0),
            raw(ev::MSC, 4, 0x70039),
            raw(ev::KEY, key::CAPSLOCK, 1),
            raw(ev::SYN, 0, 0),
            raw(ev::MSC, 4, 0x70039),
            raw(ev::KEY, key::CAPSLOCK, 0),
            raw(ev::SYN, 0, 0),
            raw(ev::LED, led::CAPSL, 0),
            raw(ev::SYN, 0, 0),
        ];
        let out: Vec<_> = decode_all(input).collect();
        assert_eq!(out, vec![on(LockKey::Caps), off(LockKey::Caps)]);
    }

    #[test]
    fn test_untracked_leds_ignored() {
        let input = [raw(ev::LED, led::COMPOSE, 1), raw(ev::LED, led::KANA, 0)];
        assert_eq!(decode_all(input).count(), 0);
    }

    #[test]
    fn test_scroll_lock_treated_like_others() {
        let input = [raw(ev::LED, led::SCROLLL, 1), raw(ev::LED, led::SCROLLL, 0)];
        let out: Vec<_> = decode_all(input).collect();
        assert_eq!(out, vec![on(LockKey::Scroll), off(LockKey::Scroll)]);
    }

    #[test]
    fn test_press_without_indicator_is_silent() {
        // Key held while the OS leaves the indicator alone
        let input = [
            raw(ev::KEY, key::CAPSLOCK, 1),
            raw(ev::KEY, key::CAPSLOCK, 2),
            raw(ev::KEY, key::CAPSLOCK, 0),
            raw(ev::SYN, 0, 0),
        ];
        assert_eq!(decode_all(input).count(), 0);
    }

    #[test]
    fn test_decoder_is_lazy() {
        let mut pulled = 0;
        let events = std::iter::repeat_with(|| {
            pulled += 1;
            raw(ev::LED, led::CAPSL, 1)
        });
        let first: Vec<_> = Decoder::new(events).take(2).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(pulled, 2);
    }
}
