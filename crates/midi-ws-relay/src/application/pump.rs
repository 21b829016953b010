//! The producer: input events → JSON → event hub.
//!
//! Runs on a dedicated OS thread for the lifetime of the input stream.  Each
//! pull from the device blocks until an event arrives, and each publish
//! blocks (via the runtime handle) until at least one viewer is attached, so
//! the thread never spins.

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use tokio::runtime::Handle;
use tracing::{error, info, trace};

use midi_relay_core::{encode_event, RawMidiEvent};

use crate::application::event_hub::EventHub;

/// Counters reported when the input stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub published: u64,
    /// Events that could not be encoded and were skipped.
    pub encode_failures: u64,
}

/// Encodes and publishes every event until `events` is exhausted.
///
/// An event that fails to encode is logged and skipped; it does not stop the
/// stream.
///
/// Must not be called from inside the runtime that `runtime` refers to
/// (it uses [`Handle::block_on`]).
pub fn pump_events<I>(events: I, hub: &EventHub, runtime: &Handle) -> PumpStats
where
    I: IntoIterator<Item = RawMidiEvent>,
{
    let mut stats = PumpStats::default();

    for event in events {
        let msg = match encode_event(&event) {
            Ok(msg) => msg,
            Err(e) => {
                error!("dropping MIDI event with status {:#04x}: {e}", event.status);
                stats.encode_failures += 1;
                continue;
            }
        };

        trace!(
            kind = ?event.kind(),
            channel = ?event.channel(),
            "publishing {msg}"
        );
        runtime.block_on(hub.publish(msg));
        stats.published += 1;
    }

    info!(
        "MIDI input stream ended after {} events ({} encode failures)",
        stats.published, stats.encode_failures
    );
    stats
}

/// Spawns [`pump_events`] on a named thread.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be created.
pub fn spawn_pump(
    events: Receiver<RawMidiEvent>,
    hub: EventHub,
    runtime: Handle,
) -> std::io::Result<JoinHandle<PumpStats>> {
    thread::Builder::new()
        .name("midi-pump".to_string())
        .spawn(move || pump_events(events, &hub, &runtime))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
