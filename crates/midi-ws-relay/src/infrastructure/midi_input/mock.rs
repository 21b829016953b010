//! Mock MIDI source for unit testing.
//!
//! Allows tests to inject synthetic [`RawMidiEvent`]s without a MIDI device.
//! Clones share state, so a test can hand one clone to the relay and keep
//! another to inject events.

use std::sync::{
    mpsc::{self, SyncSender},
    Arc, Mutex,
};

use midi_relay_core::RawMidiEvent;

use super::{MidiSource, SourceError, DEFAULT_BUFFER_CAPACITY};

/// A mock implementation of [`MidiSource`] that allows tests to inject events.
#[derive(Clone)]
pub struct MockMidiSource {
    sender: Arc<Mutex<Option<SyncSender<RawMidiEvent>>>>,
    stop_count: Arc<Mutex<u32>>,
}

impl MockMidiSource {
    /// Creates a new mock source.
    pub fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
            stop_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Injects a synthetic event, as if read from the device.
    ///
    /// Panics if `start()` has not been called or if `stop()` has been called.
    pub fn inject_event(&self, event: RawMidiEvent) {
        // Clone the sender so a full buffer blocks without holding the lock.
        let sender = self
            .sender
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("MockMidiSource::inject_event called before start()");
        sender
            .send(event)
            .expect("receiver has been dropped; call start() first");
    }

    /// Returns the number of times [`MidiSource::stop`] was called.
    pub fn stop_count(&self) -> u32 {
        *self.stop_count.lock().expect("lock poisoned")
    }
}

impl Default for MockMidiSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiSource for MockMidiSource {
    fn start(&self) -> Result<mpsc::Receiver<RawMidiEvent>, SourceError> {
        let (tx, rx) = mpsc::sync_channel(DEFAULT_BUFFER_CAPACITY);
        *self.sender.lock().expect("lock poisoned") = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        // Drop the sender to close the channel
        *self.sender.lock().expect("lock poisoned") = None;
        *self.stop_count.lock().expect("lock poisoned") += 1;
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_starts_and_receives_events() {
        // Arrange
        let source = MockMidiSource::new();
        let rx = source.start().expect("start should succeed");

        // Act
        source.inject_event(RawMidiEvent::new(0, 0x90, 60, 100));

        // Assert
        let event = rx.recv().expect("should receive event");
        assert_eq!(event, RawMidiEvent::new(0, 0x90, 60, 100));
    }

    #[test]
    fn test_mock_source_stop_closes_channel() {
        // Arrange
        let source = MockMidiSource::new();
        let rx = source.start().expect("start should succeed");

        // Act
        source.stop();

        // Assert – channel should be disconnected
        assert!(rx.recv().is_err(), "channel should be closed after stop()");
        assert_eq!(source.stop_count(), 1);
    }

    #[test]
    fn test_mock_source_preserves_injection_order() {
        let source = MockMidiSource::new();
        let rx = source.start().expect("start should succeed");

        source.inject_event(RawMidiEvent::new(1, 0xB0, 7, 100));
        source.inject_event(RawMidiEvent::new(2, 0xC0, 5, 0));
        source.inject_event(RawMidiEvent::sysex(3, vec![0xF0, 0xF7]));

        assert_eq!(rx.recv().unwrap().timestamp_ms, 1);
        assert_eq!(rx.recv().unwrap().timestamp_ms, 2);
        assert!(rx.recv().unwrap().sysex.is_some());
    }

    #[test]
    fn test_clones_share_the_stream() {
        let source = MockMidiSource::new();
        let injector = source.clone();
        let rx = source.start().unwrap();

        injector.inject_event(RawMidiEvent::new(5, 0xF8, 0, 0));

        assert_eq!(rx.recv().unwrap().status, 0xF8);
    }
}
