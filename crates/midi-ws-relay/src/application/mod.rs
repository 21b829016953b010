//! Application layer for midi-ws-relay.
//!
//! Orchestration that needs only in-process synchronisation: the event hub
//! that fans events out to sessions, the producer pump that feeds it, and the
//! termination signal shared by a session's two duties.
//!
//! # What does NOT belong here?
//!
//! - Sockets, HTTP, WebSocket framing (infrastructure)
//! - MIDI device access (infrastructure)

pub mod event_hub;
pub mod pump;
pub mod termination;

pub use event_hub::{EventHub, FeedError, Subscription};
pub use pump::{pump_events, spawn_pump, PumpStats};
pub use termination::TerminationSignal;
