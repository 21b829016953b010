//! Infrastructure layer for midi-ws-relay.
//!
//! Everything that touches a device, a socket, or a thread lives here.
//!
//! # Responsibilities
//!
//! - Opening the MIDI input stream and reading events from it
//! - Binding the listener and routing HTTP requests (axum)
//! - Upgrading viewers to WebSocket with an explicit frame size limit
//! - Running one viewer session per connection
//! - Startup ordering and the graceful shutdown flag
//!
//! # What does NOT belong here?
//!
//! - Fanout policy and the producer loop (application layer)
//! - Configuration and session state types (domain layer)
//! - Event encoding (`midi-relay-core`)

pub mod midi_input;
pub mod relay;
pub mod viewer_session;
pub mod ws_server;

pub use relay::{run_relay, Relay, StartupError};
