//! Domain layer for midi-ws-relay.
//!
//! Pure types with no I/O and no async runtime: the relay configuration and
//! the vocabulary used to describe a viewer session's lifecycle.

pub mod config;
pub mod session;

pub use config::{FanoutMode, RelayConfig};
pub use session::{
    InvalidTransition, SessionEnd, SessionId, SessionLifecycle, SessionReport, SessionState,
};
