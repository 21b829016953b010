//! midi-ws-relay entry point.
//!
//! Opens a MIDI input device and relays every event it produces to browsers
//! connected over WebSocket.  Each event is sent as one JSON text frame:
//!
//! ```json
//! {"Timestamp":1000,"Status":144,"Data1":60,"Data2":100}
//! ```
//!
//! # Usage
//!
//! ```text
//! midi-ws-relay [OPTIONS]
//!
//! Options:
//!   --addr <HOST:PORT>         Listen address [default: localhost:8080]
//!   --ws-path <PATH>           WebSocket endpoint [default: /ws]
//!   --fanout <MODE>            broadcast | shared [default: broadcast]
//!   --queue-capacity <N>       Per-viewer queue length [default: 256]
//!   --device <DEVICE>          MIDI input device [default: auto-detect]
//!   --buffer-capacity <N>      Input buffer length [default: 1024]
//!   --page <PATH>              HTML file served at / [default: built-in]
//!   --max-message-size <BYTES> Largest viewer frame accepted [default: 65536]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                    | Flag                 |
//! |-----------------------------|----------------------|
//! | `MIDI_RELAY_ADDR`           | `--addr`             |
//! | `MIDI_RELAY_WS_PATH`        | `--ws-path`          |
//! | `MIDI_RELAY_FANOUT`         | `--fanout`           |
//! | `MIDI_RELAY_QUEUE_CAPACITY` | `--queue-capacity`   |
//! | `MIDI_RELAY_DEVICE`         | `--device`           |
//! | `MIDI_RELAY_BUFFER`         | `--buffer-capacity`  |
//! | `MIDI_RELAY_PAGE`           | `--page`             |
//! | `MIDI_RELAY_MAX_MESSAGE`    | `--max-message-size` |
//!
//! CLI args take precedence when both are present.  Log verbosity follows
//! `RUST_LOG` (default `info`).

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use midi_ws_relay::domain::{FanoutMode, RelayConfig};
use midi_ws_relay::infrastructure::midi_input::open_default_source;
use midi_ws_relay::infrastructure::run_relay;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relays MIDI input events to WebSocket viewers.
#[derive(Debug, Parser)]
#[command(
    name = "midi-ws-relay",
    about = "Relays events from a MIDI input device to browser viewers over WebSocket",
    version
)]
struct Cli {
    /// Address to listen on, as HOST:PORT.  Host names are resolved.
    #[arg(long, default_value = "localhost:8080", env = "MIDI_RELAY_ADDR")]
    addr: String,

    /// Request path that upgrades to the event feed.
    #[arg(long, default_value = "/ws", env = "MIDI_RELAY_WS_PATH")]
    ws_path: String,

    /// How events are distributed when several viewers are attached.
    ///
    /// `broadcast` gives every viewer every event.  `shared` hands each event
    /// to exactly one waiting viewer.
    #[arg(long, default_value = "broadcast", env = "MIDI_RELAY_FANOUT")]
    fanout: FanoutMode,

    /// Events a viewer may fall behind before the oldest are dropped.
    #[arg(long, default_value_t = 256, env = "MIDI_RELAY_QUEUE_CAPACITY")]
    queue_capacity: usize,

    /// MIDI input device.
    ///
    /// A raw MIDI device path such as `/dev/snd/midiC1D0`, or a port-name
    /// substring when built with the `midir` feature.
    #[arg(long, env = "MIDI_RELAY_DEVICE")]
    device: Option<String>,

    /// Events buffered between the device reader and the relay.
    #[arg(long, default_value_t = 1024, env = "MIDI_RELAY_BUFFER")]
    buffer_capacity: usize,

    /// HTML file served at `/` instead of the built-in viewer.
    #[arg(long, env = "MIDI_RELAY_PAGE")]
    page: Option<PathBuf>,

    /// Largest frame accepted from a viewer, in bytes.
    #[arg(long, default_value_t = 65536, env = "MIDI_RELAY_MAX_MESSAGE")]
    max_message_size: usize,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--addr` does not resolve, `--ws-path` is not a
    /// plain absolute path other than `/`, or a capacity is zero.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let listen_addr: SocketAddr = self
            .addr
            .to_socket_addrs()
            .with_context(|| format!("invalid listen address: '{}'", self.addr))?
            .next()
            .with_context(|| format!("listen address '{}' resolved to nothing", self.addr))?;

        anyhow::ensure!(
            self.ws_path.starts_with('/') && self.ws_path != "/",
            "--ws-path must start with '/' and differ from the page path: '{}'",
            self.ws_path
        );
        anyhow::ensure!(
            !self.ws_path.contains(&[':', '*'][..]),
            "--ws-path must not contain route parameters: '{}'",
            self.ws_path
        );
        anyhow::ensure!(self.queue_capacity > 0, "--queue-capacity must be at least 1");
        anyhow::ensure!(self.buffer_capacity > 0, "--buffer-capacity must be at least 1");

        Ok(RelayConfig {
            listen_addr,
            ws_path: self.ws_path,
            fanout: self.fanout,
            queue_capacity: self.queue_capacity,
            device: self.device,
            buffer_capacity: self.buffer_capacity,
            page: self.page,
            max_message_size: self.max_message_size,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_relay_config()?;

    info!(
        "midi-ws-relay starting: listen={}, ws path={}, fanout={}",
        config.listen_addr, config.ws_path, config.fanout
    );

    let source = open_default_source(&config).context("failed to open MIDI input")?;

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_relay(config, source, running)
        .await
        .context("relay failed to start")?;

    info!("midi-ws-relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
