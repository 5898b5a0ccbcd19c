//! Lock-key notification transport for lockbell
//!
//! This crate holds the two halves of the pipeline that sit between the
//! kernel and the audio cue:
//!
//! - Raw input: reading `input_event` records from an evdev node (or from an
//!   injected synthetic stream) and classifying them into lock-key changes
//! - Channel: the single-writer/single-reader named FIFO that carries those
//!   changes from the privileged server to the per-user client

pub mod decoder;
pub mod discovery;
pub mod error;
pub mod fifo;
pub mod source;
pub mod types;
pub mod watch;

pub use decoder::{classify, decode, decode_all, Classification, Decoder};
pub use discovery::{discover_keyboard, list_keyboards, KeyboardInfo};
pub use error::{ChannelError, SourceError};
pub use fifo::{Delivery, FifoChannel, FifoReader};
pub use source::{injected, EvdevSource, InjectedSender, InjectedSource, RawEventSource};
pub use types::{ev, key, led, LockKey, LockKeyChanged, LockState, RawEvent};
pub use watch::wait_for_path;
