//! # midi-relay-core
//!
//! Shared library for the MIDI WebSocket relay containing the MIDI event
//! model, a parser for raw MIDI byte streams, and the JSON encoder that turns
//! each event into the payload sent to viewers.
//!
//! It has no dependencies on async runtimes, MIDI drivers, or sockets.
//!
//! # Architecture overview
//!
//! The relay reads events from one MIDI input device and pushes every event to
//! all connected browser viewers over WebSocket.  This crate is the pure part
//! of that pipeline:
//!
//! - **`event`** – The [`RawMidiEvent`] record and helpers that classify a
//!   status byte into a [`MessageKind`] (note on, control change, ...).
//!
//! - **`parser`** – [`MidiStreamParser`], which turns the byte stream read
//!   from a raw MIDI character device into complete events.  It understands
//!   running status, interleaved real-time bytes, and SysEx blocks.
//!
//! - **`encode`** – [`encode_event`], the deterministic JSON encoder, and
//!   [`decode_message`] for Rust-side viewers and tests.

pub mod encode;
pub mod event;
pub mod parser;

pub use encode::{decode_message, encode_event, EncodeError, EncodedMessage, WireEvent};
pub use event::{MessageKind, RawMidiEvent, StreamClock};
pub use parser::MidiStreamParser;
