//! The MIDI event record produced by every input backend.
//!
//! A [`RawMidiEvent`] is one complete MIDI message plus the time it arrived,
//! measured in milliseconds since the input stream was opened.  Events are
//! immutable once produced: the encoder reads them and drops them.

use std::time::Instant;

/// One MIDI message as read from the input device.
///
/// `data1` and `data2` are zero when the message carries fewer data bytes
/// (e.g., program change has only `data1`; real-time messages have none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMidiEvent {
    /// Milliseconds since the input stream was opened.
    pub timestamp_ms: i64,
    /// MIDI status byte (always has the high bit set).
    pub status: u8,
    /// First data byte, or 0.
    pub data1: u8,
    /// Second data byte, or 0.
    pub data2: u8,
    /// Complete system-exclusive block including the `F0`/`F7` framing bytes.
    ///
    /// Only set when `status == 0xF0`.
    pub sysex: Option<Vec<u8>>,
}

impl RawMidiEvent {
    /// Creates a short (non-SysEx) event.
    pub fn new(timestamp_ms: i64, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            timestamp_ms,
            status,
            data1,
            data2,
            sysex: None,
        }
    }

    /// Creates a system-exclusive event carrying `bytes` (framing included).
    pub fn sysex(timestamp_ms: i64, bytes: Vec<u8>) -> Self {
        Self {
            timestamp_ms,
            status: 0xF0,
            data1: 0,
            data2: 0,
            sysex: Some(bytes),
        }
    }

    /// Classifies the status byte.
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_status(self.status)
    }

    /// Returns the 1-based MIDI channel for channel-voice messages.
    ///
    /// System messages (`0xF0..=0xFF`) have no channel and return `None`.
    pub fn channel(&self) -> Option<u8> {
        if self.kind().is_channel_voice() {
            Some((self.status & 0x0F) + 1)
        } else {
            None
        }
    }
}

/// The category of a MIDI message, derived from its status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    PolyPressure,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
    SysEx,
    TimeCode,
    SongPosition,
    SongSelect,
    TuneRequest,
    EndOfSysEx,
    TimingClock,
    Start,
    Continue,
    Stop,
    ActiveSensing,
    Reset,
    /// Reserved status (`F4`, `F5`, `F9`, `FD`) or a data byte.
    Undefined,
}

impl MessageKind {
    /// Classifies `status`.  Bytes below `0x80` are data bytes and map to
    /// [`MessageKind::Undefined`].
    pub fn from_status(status: u8) -> Self {
        match status {
            0x80..=0x8F => Self::NoteOff,
            0x90..=0x9F => Self::NoteOn,
            0xA0..=0xAF => Self::PolyPressure,
            0xB0..=0xBF => Self::ControlChange,
            0xC0..=0xCF => Self::ProgramChange,
            0xD0..=0xDF => Self::ChannelPressure,
            0xE0..=0xEF => Self::PitchBend,
            0xF0 => Self::SysEx,
            0xF1 => Self::TimeCode,
            0xF2 => Self::SongPosition,
            0xF3 => Self::SongSelect,
            0xF6 => Self::TuneRequest,
            0xF7 => Self::EndOfSysEx,
            0xF8 => Self::TimingClock,
            0xFA => Self::Start,
            0xFB => Self::Continue,
            0xFC => Self::Stop,
            0xFE => Self::ActiveSensing,
            0xFF => Self::Reset,
            _ => Self::Undefined,
        }
    }

    /// Number of data bytes that follow this status byte.
    ///
    /// SysEx is variable length and reports 0; the parser handles it
    /// separately.
    pub fn data_len(self) -> usize {
        match self {
            Self::NoteOff
            | Self::NoteOn
            | Self::PolyPressure
            | Self::ControlChange
            | Self::PitchBend
            | Self::SongPosition => 2,
            Self::ProgramChange | Self::ChannelPressure | Self::TimeCode | Self::SongSelect => 1,
            _ => 0,
        }
    }

    /// `true` for the seven channel-voice message types (`0x80..=0xEF`).
    pub fn is_channel_voice(self) -> bool {
        matches!(
            self,
            Self::NoteOff
                | Self::NoteOn
                | Self::PolyPressure
                | Self::ControlChange
                | Self::ProgramChange
                | Self::ChannelPressure
                | Self::PitchBend
        )
    }

    /// `true` for single-byte system real-time messages (`0xF8..=0xFF`).
    ///
    /// These may appear between the bytes of any other message.
    pub fn is_realtime(self) -> bool {
        matches!(
            self,
            Self::TimingClock
                | Self::Start
                | Self::Continue
                | Self::Stop
                | Self::ActiveSensing
                | Self::Reset
        )
    }
}

/// Monotonic clock that timestamps events relative to stream start.
#[derive(Debug, Clone, Copy)]
pub struct StreamClock {
    started: Instant,
}

impl StreamClock {
    /// Starts the clock now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds elapsed since [`StreamClock::start`].
    pub fn elapsed_ms(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
