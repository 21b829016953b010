//! JSON wire encoding for MIDI events.
//!
//! Every event sent to a viewer is one JSON object:
//!
//! ```json
//! {"Timestamp":1000,"Status":144,"Data1":60,"Data2":100}
//! ```
//!
//! SysEx events add a `"SysEx"` array holding the complete block.  For every
//! other event the `"SysEx"` key is omitted entirely rather than sent as
//! `null` or `[]`; decoders must treat a missing key as "no payload".  Field
//! names and order are fixed, so encoding the same event twice always yields
//! the same bytes.  Browser viewers rely on these exact names.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::RawMidiEvent;

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The event could not be serialized.
    #[error("failed to serialize MIDI event: {0}")]
    Serialize(serde_json::Error),

    /// A wire message was not a valid event object.
    #[error("failed to decode MIDI event: {0}")]
    Decode(serde_json::Error),
}

/// The decoded form of one wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Milliseconds since the input stream was opened.
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
    #[serde(rename = "Status")]
    pub status: i64,
    #[serde(rename = "Data1")]
    pub data1: i64,
    #[serde(rename = "Data2")]
    pub data2: i64,
    #[serde(rename = "SysEx", default, skip_serializing_if = "Option::is_none")]
    pub sysex: Option<Vec<u8>>,
}

/// Borrowing twin of [`WireEvent`] so encoding never clones SysEx payloads.
#[derive(Serialize)]
struct WireEventRef<'a> {
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "Status")]
    status: u8,
    #[serde(rename = "Data1")]
    data1: u8,
    #[serde(rename = "Data2")]
    data2: u8,
    #[serde(rename = "SysEx", skip_serializing_if = "Option::is_none")]
    sysex: Option<&'a [u8]>,
}

/// One encoded event, ready to be sent as a WebSocket text frame.
///
/// Cloning is a reference-count bump: every viewer session shares the same
/// immutable text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedMessage(Arc<str>);

impl EncodedMessage {
    /// Returns the JSON text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EncodedMessage {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl fmt::Display for EncodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encodes `event` as its JSON wire representation.
///
/// # Errors
///
/// Returns [`EncodeError::Serialize`] if serialization fails.  With the fixed
/// field types used here that does not happen for any event the parser or a
/// driver produces.
///
/// # Examples
///
/// ```rust
/// use midi_relay_core::{encode_event, RawMidiEvent};
///
/// let msg = encode_event(&RawMidiEvent::new(1000, 144, 60, 100)).unwrap();
/// assert_eq!(
///     msg.as_str(),
///     r#"{"Timestamp":1000,"Status":144,"Data1":60,"Data2":100}"#
/// );
/// ```
pub fn encode_event(event: &RawMidiEvent) -> Result<EncodedMessage, EncodeError> {
    let wire = WireEventRef {
        timestamp: event.timestamp_ms,
        status: event.status,
        data1: event.data1,
        data2: event.data2,
        sysex: event.sysex.as_deref(),
    };
    serde_json::to_string(&wire)
        .map(EncodedMessage::from)
        .map_err(EncodeError::Serialize)
}

/// Decodes a wire message back into a [`WireEvent`].
///
/// # Errors
///
/// Returns [`EncodeError::Decode`] if `text` is not a JSON object with the
/// four required integer fields.
pub fn decode_message(text: &str) -> Result<WireEvent, EncodeError> {
    serde_json::from_str(text).map_err(EncodeError::Decode)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_wire_text_is_exact() {
        let msg = encode_event(&RawMidiEvent::new(1000, 144, 60, 100)).unwrap();
        assert_eq!(
            msg.as_str(),
            r#"{"Timestamp":1000,"Status":144,"Data1":60,"Data2":100}"#
        );
    }

    #[test]
    fn test_sysex_field_is_present_only_for_sysex() {
        let short = encode_event(&RawMidiEvent::new(0, 0xF8, 0, 0)).unwrap();
        assert!(!short.as_str().contains("SysEx"));

        let long = encode_event(&RawMidiEvent::sysex(2, vec![0xF0, 0x43, 0xF7])).unwrap();
        assert_eq!(
            long.as_str(),
            r#"{"Timestamp":2,"Status":240,"Data1":0,"Data2":0,"SysEx":[240,67,247]}"#
        );
    }

    #[test]
    fn test_non_sysex_event_omits_the_key_instead_of_sending_null() {
        // Arrange
        let event = RawMidiEvent::new(3, 0x80, 60, 0);

        // Act
        let msg = encode_event(&event).unwrap();
        let value: serde_json::Value = serde_json::from_str(msg.as_str()).unwrap();

        // Assert
        let object = value.as_object().unwrap();
        assert!(object.get("SysEx").is_none());
        assert_eq!(object.len(), 4);
    }

    #[test]
    fn test_decode_accepts_missing_sysex() {
        let decoded =
            decode_message(r#"{"Timestamp":5,"Status":128,"Data1":1,"Data2":2}"#).unwrap();
        assert_eq!(decoded.sysex, None);
        assert_eq!(decoded.status, 128);
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let result = decode_message(r#"{"Timestamp":5,"Status":128}"#);
        assert!(matches!(result, Err(EncodeError::Decode(_))));
    }

    #[test]
    fn test_encoded_message_clone_shares_text() {
        let msg = EncodedMessage::from("{}".to_string());
        let clone = msg.clone();
        assert_eq!(msg, clone);
        assert_eq!(clone.as_str(), "{}");
        assert_eq!(clone.to_string(), "{}");
    }
}
