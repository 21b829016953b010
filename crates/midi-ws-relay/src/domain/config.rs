//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments; tests build it from
//! [`RelayConfig::default`] and override fields.  No global state: the
//! WebSocket upgrade settings live here and are handed to the acceptor
//! explicitly.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// How published events are distributed to attached viewer sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanoutMode {
    /// Every session has its own bounded queue and receives every event.
    ///
    /// A session that falls more than the queue capacity behind loses the
    /// oldest events and is told how many it skipped.
    #[default]
    Broadcast,

    /// All sessions contend for one conduit.  Each event goes to exactly one
    /// of the attached sessions, whichever is waiting first.
    Shared,
}

impl FromStr for FanoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "broadcast" => Ok(Self::Broadcast),
            "shared" => Ok(Self::Shared),
            other => Err(format!(
                "unknown fanout mode '{other}' (expected 'broadcast' or 'shared')"
            )),
        }
    }
}

impl fmt::Display for FanoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast => f.write_str("broadcast"),
            Self::Shared => f.write_str("shared"),
        }
    }
}

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use midi_ws_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.listen_addr.port(), 8080);
/// assert_eq!(cfg.ws_path, "/ws");
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub listen_addr: SocketAddr,

    /// Request path that upgrades to the live event feed.
    pub ws_path: String,

    /// Event distribution policy across sessions.
    pub fanout: FanoutMode,

    /// Per-session queue length in [`FanoutMode::Broadcast`].
    pub queue_capacity: usize,

    /// MIDI input device.  `None` selects the platform default.
    ///
    /// For the raw backend this is a character device path; for the `midir`
    /// backend it is a substring of the port name.
    pub device: Option<String>,

    /// Number of events the input stream buffers before the reader blocks.
    pub buffer_capacity: usize,

    /// HTML file served at `/`.  `None` serves the built-in viewer page.
    pub page: Option<PathBuf>,

    /// Largest frame accepted from a viewer, in bytes.
    ///
    /// Viewers never need to send anything; this only bounds memory.
    pub max_message_size: usize,
}

impl Default for RelayConfig {
    /// | Field            | Default            |
    /// |------------------|--------------------|
    /// | listen_addr      | `127.0.0.1:8080`   |
    /// | ws_path          | `/ws`              |
    /// | fanout           | broadcast          |
    /// | queue_capacity   | 256                |
    /// | device           | auto-detect        |
    /// | buffer_capacity  | 1024               |
    /// | page             | built-in           |
    /// | max_message_size | 64 KiB             |
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            ws_path: "/ws".to_string(),
            fanout: FanoutMode::Broadcast,
            queue_capacity: 256,
            device: None,
            buffer_capacity: 1024,
            page: None,
            max_message_size: 64 * 1024,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
