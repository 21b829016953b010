//! midi-ws-relay library crate.
//!
//! Reads events from one MIDI input device and relays each one, as a JSON
//! text frame, to browsers connected over WebSocket.
//!
//! # Architecture
//!
//! ```text
//! MIDI device
//!     ↓  (reader thread, bounded std channel)
//! [midi-ws-relay]
//!   ├── domain/           RelayConfig, FanoutMode, session state machine
//!   ├── application/      EventHub fanout, producer pump, termination signal
//!   └── infrastructure/
//!         ├── midi_input/      MidiSource backends (raw device, midir, mock)
//!         ├── ws_server        axum router: viewer page and upgrade
//!         ├── viewer_session   per-viewer read/write duties
//!         └── relay            startup ordering
//!     ↓  (JSON text frames)
//! Browser viewers
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O and spawns nothing.
//! - `application` depends on `domain`, `midi-relay-core`, and tokio sync
//!   primitives only.
//! - `infrastructure` depends on all other layers plus sockets, threads, and
//!   axum.

/// Domain layer: configuration and session types (no I/O).
pub mod domain;

/// Application layer: event fanout and the producer.
pub mod application;

/// Infrastructure layer: MIDI input, listener, and viewer sessions.
pub mod infrastructure;
