//! MIDI input infrastructure.
//!
//! Exactly one input stream is opened for the lifetime of the process.  A
//! backend owns a reader (a thread or a driver callback) that pushes events
//! into a bounded `std::sync::mpsc` channel; the producer pump pulls from the
//! receiving end, blocking while nothing is pending.
//!
//! # Backends
//!
//! - [`rawmidi::RawMidiSource`] (default): reads a raw MIDI character device
//!   such as `/dev/snd/midiC1D0` and parses the byte stream.  Unix only;
//!   needs no system libraries.
//! - `midir_input::MidirSource` (cargo feature `midir`): opens an input port
//!   through the `midir` crate.
//! - [`mock::MockMidiSource`]: synthetic events for tests.
//!
//! # Testability
//!
//! The [`MidiSource`] trait lets tests inject events without hardware.

use std::sync::mpsc;

use midi_relay_core::RawMidiEvent;

use crate::domain::RelayConfig;

pub mod mock;
#[cfg(unix)]
pub mod rawmidi;

#[cfg(feature = "midir")]
pub mod midir_input;

/// Events buffered between the device reader and the producer pump.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Error type for MIDI input operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to initialise MIDI subsystem: {0}")]
    Init(String),
    #[error("no MIDI input device found ({0})")]
    NoDevice(String),
    #[error("failed to open MIDI input '{device}': {reason}")]
    Open { device: String, reason: String },
    #[error("MIDI input has already been started")]
    AlreadyStarted,
}

/// Trait abstracting the MIDI event producer.
pub trait MidiSource: Send {
    /// Opens the input stream and returns a receiver for its events.
    ///
    /// The receiver yields events until [`MidiSource::stop`] is called or the
    /// device goes away.
    fn start(&self) -> Result<mpsc::Receiver<RawMidiEvent>, SourceError>;

    /// Closes the input stream and releases the device.  The device is no
    /// longer held once this returns.
    fn stop(&self);

    /// Human-readable name of the device, for logs.
    fn describe(&self) -> String;
}

/// Owns a started source and stops it when dropped.
pub struct SourceGuard {
    source: Box<dyn MidiSource>,
}

impl SourceGuard {
    pub fn new(source: Box<dyn MidiSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &dyn MidiSource {
        self.source.as_ref()
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        tracing::info!("closing MIDI input {}", self.source.describe());
        self.source.stop();
    }
}

/// Initialises the platform MIDI backend and selects the default input.
///
/// With the `midir` feature the device setting is a port-name substring;
/// otherwise it is a raw MIDI device path.
///
/// # Errors
///
/// Returns [`SourceError`] if the backend cannot be initialised or no input
/// device exists.
pub fn open_default_source(config: &RelayConfig) -> Result<Box<dyn MidiSource>, SourceError> {
    #[cfg(feature = "midir")]
    {
        let source = midir_input::MidirSource::new(config.device.clone(), config.buffer_capacity)?;
        Ok(Box::new(source))
    }

    #[cfg(all(unix, not(feature = "midir")))]
    {
        let source = match &config.device {
            Some(path) => rawmidi::RawMidiSource::new(path, config.buffer_capacity),
            None => rawmidi::RawMidiSource::discover(config.buffer_capacity)?,
        };
        Ok(Box::new(source))
    }

    #[cfg(all(not(unix), not(feature = "midir")))]
    {
        let _ = config;
        Err(SourceError::Init(
            "raw MIDI devices need a Unix host; build with the `midir` feature".to_string(),
        ))
    }
}
