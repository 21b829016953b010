//! Incremental parser for raw MIDI byte streams.
//!
//! A raw MIDI device (e.g. `/dev/snd/midiC1D0`) delivers the wire bytes
//! exactly as they came off the cable.  A single `read()` may end in the
//! middle of a message, and three features of the MIDI wire format make a
//! byte-at-a-time state machine necessary:
//!
//! - **Running status**: after a channel-voice message the status byte may be
//!   omitted; subsequent data bytes reuse the previous status.
//! - **Real-time bytes** (`F8..=FF`) may appear anywhere, even between the two
//!   data bytes of a note-on, and must not disturb the message in progress.
//! - **SysEx** (`F0 .. F7`) is variable length.
//!
//! The parser never fails.  Data bytes with no status to attach to are
//! dropped, which is what hardware receivers do after a cable is plugged in
//! mid-stream.

use tracing::{debug, warn};

use crate::event::{MessageKind, RawMidiEvent};

/// Largest SysEx block (framing included) the parser will buffer.
///
/// Longer blocks are discarded as a whole when their `F7` arrives.
pub const DEFAULT_MAX_SYSEX_LEN: usize = 4096;

/// Byte-at-a-time MIDI stream parser.
///
/// # Examples
///
/// ```rust
/// use midi_relay_core::MidiStreamParser;
///
/// let mut parser = MidiStreamParser::new();
/// // Note-on followed by a running-status note-on.
/// let events = parser.feed(&[0x90, 60, 100, 64, 90], 0);
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[1].status, 0x90);
/// assert_eq!(events[1].data1, 64);
/// ```
#[derive(Debug)]
pub struct MidiStreamParser {
    /// Status of the message currently being assembled.
    status: Option<u8>,
    /// Whether `status` may be reused for the next message (running status).
    running: bool,
    pending: [u8; 2],
    pending_len: usize,
    sysex: Option<Vec<u8>>,
    sysex_overflowed: bool,
    max_sysex_len: usize,
}

impl MidiStreamParser {
    /// Creates a parser with the default SysEx limit.
    pub fn new() -> Self {
        Self::with_max_sysex_len(DEFAULT_MAX_SYSEX_LEN)
    }

    /// Creates a parser that buffers SysEx blocks up to `max_sysex_len` bytes.
    pub fn with_max_sysex_len(max_sysex_len: usize) -> Self {
        Self {
            status: None,
            running: false,
            pending: [0; 2],
            pending_len: 0,
            sysex: None,
            sysex_overflowed: false,
            max_sysex_len,
        }
    }

    /// Feeds a chunk of bytes, returning every event completed by it.
    ///
    /// All events completed by this chunk share `timestamp_ms`.
    pub fn feed(&mut self, bytes: &[u8], timestamp_ms: i64) -> Vec<RawMidiEvent> {
        bytes
            .iter()
            .filter_map(|&b| self.feed_byte(b, timestamp_ms))
            .collect()
    }

    /// Feeds one byte.  Returns `Some` when the byte completes an event.
    pub fn feed_byte(&mut self, byte: u8, timestamp_ms: i64) -> Option<RawMidiEvent> {
        let kind = MessageKind::from_status(byte);

        if byte >= 0xF8 {
            // Real-time bytes pass straight through; reserved ones are ignored.
            return kind
                .is_realtime()
                .then(|| RawMidiEvent::new(timestamp_ms, byte, 0, 0));
        }

        if byte == 0xF7 {
            return self.finish_sysex(timestamp_ms);
        }

        if byte >= 0x80 {
            self.abandon_sysex();
            self.pending_len = 0;

            if byte == 0xF0 {
                self.status = None;
                self.running = false;
                self.sysex = Some(vec![0xF0]);
                self.sysex_overflowed = false;
                return None;
            }

            if kind == MessageKind::Undefined {
                self.status = None;
                self.running = false;
                return None;
            }

            if kind.data_len() == 0 {
                // Tune request: complete on its own, cancels running status.
                self.status = None;
                self.running = false;
                return Some(RawMidiEvent::new(timestamp_ms, byte, 0, 0));
            }

            self.status = Some(byte);
            self.running = kind.is_channel_voice();
            return None;
        }

        // Data byte.
        if let Some(buf) = self.sysex.as_mut() {
            if buf.len() < self.max_sysex_len {
                buf.push(byte);
            } else {
                self.sysex_overflowed = true;
            }
            return None;
        }

        let status = self.status?;

        self.pending[self.pending_len] = byte;
        self.pending_len += 1;

        let needed = MessageKind::from_status(status).data_len();
        if self.pending_len < needed {
            return None;
        }

        let data2 = if needed == 2 { self.pending[1] } else { 0 };
        let event = RawMidiEvent::new(timestamp_ms, status, self.pending[0], data2);
        self.pending_len = 0;
        if !self.running {
            self.status = None;
        }
        Some(event)
    }

    fn finish_sysex(&mut self, timestamp_ms: i64) -> Option<RawMidiEvent> {
        self.status = None;
        self.running = false;
        self.pending_len = 0;

        let mut buf = self.sysex.take()?;
        if self.sysex_overflowed || buf.len() >= self.max_sysex_len {
            warn!(
                "dropping SysEx block longer than {} bytes",
                self.max_sysex_len
            );
            self.sysex_overflowed = false;
            return None;
        }
        buf.push(0xF7);
        Some(RawMidiEvent::sysex(timestamp_ms, buf))
    }

    fn abandon_sysex(&mut self) {
        if let Some(buf) = self.sysex.take() {
            debug!("SysEx block of {} bytes ended without F7; discarded", buf.len());
            self.sysex_overflowed = false;
        }
    }
}

impl Default for MidiStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_note_on() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0x90, 60, 100], 7);
        assert_eq!(events, vec![RawMidiEvent::new(7, 0x90, 60, 100)]);
    }

    #[test]
    fn test_message_split_across_reads() {
        let mut parser = MidiStreamParser::new();
        assert!(parser.feed(&[0xB0, 7], 1).is_empty());
        let events = parser.feed(&[127], 2);
        assert_eq!(events, vec![RawMidiEvent::new(2, 0xB0, 7, 127)]);
    }

    #[test]
    fn test_running_status_reuses_previous_status() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0x91, 60, 100, 62, 90, 64, 0], 0);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.status == 0x91));
        assert_eq!(events[2].data1, 64);
        assert_eq!(events[2].data2, 0);
    }

    #[test]
    fn test_one_data_byte_messages() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0xC2, 5, 6], 0);
        assert_eq!(
            events,
            vec![
                RawMidiEvent::new(0, 0xC2, 5, 0),
                RawMidiEvent::new(0, 0xC2, 6, 0),
            ]
        );
    }

    #[test]
    fn test_realtime_byte_inside_message_does_not_break_it() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0x90, 60, 0xF8, 100], 3);
        assert_eq!(
            events,
            vec![
                RawMidiEvent::new(3, 0xF8, 0, 0),
                RawMidiEvent::new(3, 0x90, 60, 100),
            ]
        );
    }

    #[test]
    fn test_stray_data_bytes_are_dropped() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[60, 100, 0x80, 60, 0], 0);
        assert_eq!(events, vec![RawMidiEvent::new(0, 0x80, 60, 0)]);
    }

    #[test]
    fn test_system_common_cancels_running_status() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0x90, 60, 100, 0xF3, 2, 61, 100], 0);
        // The trailing 61, 100 have no status after Song Select.
        assert_eq!(
            events,
            vec![
                RawMidiEvent::new(0, 0x90, 60, 100),
                RawMidiEvent::new(0, 0xF3, 2, 0),
            ]
        );
    }

    #[test]
    fn test_tune_request_completes_immediately() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0xF6], 0);
        assert_eq!(events, vec![RawMidiEvent::new(0, 0xF6, 0, 0)]);
    }

    #[test]
    fn test_sysex_block_is_captured_with_framing() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7], 9);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].sysex.as_deref(),
            Some(&[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7][..])
        );
    }

    #[test]
    fn test_sysex_with_interleaved_clock() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0xF0, 0x01, 0xF8, 0x02, 0xF7], 0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, 0xF8);
        assert_eq!(events[1].sysex.as_deref(), Some(&[0xF0, 0x01, 0x02, 0xF7][..]));
    }

    #[test]
    fn test_unterminated_sysex_is_discarded_by_next_status() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0xF0, 0x01, 0x02, 0x90, 60, 100], 0);
        assert_eq!(events, vec![RawMidiEvent::new(0, 0x90, 60, 100)]);
    }

    #[test]
    fn test_oversized_sysex_is_dropped() {
        let mut parser = MidiStreamParser::with_max_sysex_len(4);
        let events = parser.feed(&[0xF0, 1, 2, 3, 4, 5, 0xF7, 0x90, 1, 2], 0);
        assert_eq!(events, vec![RawMidiEvent::new(0, 0x90, 1, 2)]);
    }

    #[test]
    fn test_lone_end_of_sysex_is_ignored() {
        let mut parser = MidiStreamParser::new();
        assert!(parser.feed(&[0xF7], 0).is_empty());
    }

    #[test]
    fn test_reserved_status_bytes_are_ignored() {
        let mut parser = MidiStreamParser::new();
        let events = parser.feed(&[0xF9, 0xFD, 0xF4, 1, 2], 0);
        assert!(events.is_empty());
    }
}
