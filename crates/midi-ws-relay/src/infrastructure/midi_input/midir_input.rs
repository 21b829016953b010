//! `midir` backend (cargo feature `midir`).
//!
//! midir delivers complete MIDI messages to a callback on its own driver
//! thread.  The callback must return quickly, so it only timestamps the
//! message and `try_send`s it into the bounded channel; when the channel is
//! full the event is dropped with a warning.

use std::sync::{mpsc, Mutex};

use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{info, warn};

use midi_relay_core::{RawMidiEvent, StreamClock};

use super::{MidiSource, SourceError};

const CLIENT_NAME: &str = "midi-ws-relay";

/// Input port opened through midir.
pub struct MidirSource {
    input: Mutex<Option<MidiInput>>,
    port_hint: Option<String>,
    buffer_capacity: usize,
    connection: Mutex<Option<MidiInputConnection<()>>>,
    port_name: Mutex<String>,
}

impl MidirSource {
    /// Initialises the midir client.
    ///
    /// `port_hint` selects the first port whose name contains it; `None`
    /// selects the first port.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Init`] if the platform MIDI API is unavailable.
    pub fn new(port_hint: Option<String>, buffer_capacity: usize) -> Result<Self, SourceError> {
        let mut input =
            MidiInput::new(CLIENT_NAME).map_err(|e| SourceError::Init(e.to_string()))?;
        // Forward SysEx, timing, and active sensing like the raw backend does.
        input.ignore(Ignore::None);

        Ok(Self {
            input: Mutex::new(Some(input)),
            port_hint,
            buffer_capacity: buffer_capacity.max(1),
            connection: Mutex::new(None),
            port_name: Mutex::new("<not started>".to_string()),
        })
    }
}

/// Converts one complete midir message into an event.
fn to_event(timestamp_ms: i64, bytes: &[u8]) -> Option<RawMidiEvent> {
    let (&status, data) = bytes.split_first()?;
    if status == 0xF0 {
        return Some(RawMidiEvent::sysex(timestamp_ms, bytes.to_vec()));
    }
    Some(RawMidiEvent::new(
        timestamp_ms,
        status,
        data.first().copied().unwrap_or(0),
        data.get(1).copied().unwrap_or(0),
    ))
}

impl MidiSource for MidirSource {
    fn start(&self) -> Result<mpsc::Receiver<RawMidiEvent>, SourceError> {
        let input = self
            .input
            .lock()
            .map_err(|_| SourceError::Init("midir state lock poisoned".to_string()))?
            .take()
            .ok_or(SourceError::AlreadyStarted)?;

        let ports = input.ports();
        let port = ports
            .iter()
            .find(|port| match &self.port_hint {
                Some(hint) => input
                    .port_name(port)
                    .map(|name| name.contains(hint.as_str()))
                    .unwrap_or(false),
                None => true,
            })
            .cloned()
            .ok_or_else(|| {
                SourceError::NoDevice(match &self.port_hint {
                    Some(hint) => format!("no input port matching '{hint}'"),
                    None => "no input ports".to_string(),
                })
            })?;
        let name = input
            .port_name(&port)
            .unwrap_or_else(|_| "unknown port".to_string());

        let (tx, rx) = mpsc::sync_channel(self.buffer_capacity);
        let clock = StreamClock::start();

        let connection = input
            .connect(
                &port,
                "midi-ws-relay-in",
                move |_stamp_us, bytes, _| {
                    let Some(event) = to_event(clock.elapsed_ms(), bytes) else {
                        return;
                    };
                    if let Err(mpsc::TrySendError::Full(_)) = tx.try_send(event) {
                        warn!("MIDI input buffer full; dropping event");
                    }
                },
                (),
            )
            .map_err(|e| SourceError::Open {
                device: name.clone(),
                reason: e.to_string(),
            })?;

        info!("opened MIDI input port '{name}'");
        if let Ok(mut slot) = self.connection.lock() {
            *slot = Some(connection);
        }
        if let Ok(mut slot) = self.port_name.lock() {
            *slot = name;
        }
        Ok(rx)
    }

    fn stop(&self) {
        let connection = self.connection.lock().ok().and_then(|mut slot| slot.take());
        if let Some(connection) = connection {
            // Closing drops the callback and with it the channel sender.
            connection.close();
        }
    }

    fn describe(&self) -> String {
        self.port_name
            .lock()
            .map(|name| name.clone())
            .unwrap_or_else(|_| "midir".to_string())
    }
}
