//! Process wiring: MIDI input → producer pump → event hub → listener.
//!
//! Startup order matters.  The input stream is opened first, so a missing
//! or busy device fails the process before any port is bound.

use std::io;
use std::net::SocketAddr;
use std::sync::{atomic::AtomicBool, Arc};
use std::thread::JoinHandle;

use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tracing::info;

use crate::application::{spawn_pump, EventHub, PumpStats};
use crate::domain::RelayConfig;
use crate::infrastructure::midi_input::{MidiSource, SourceError, SourceGuard};
use crate::infrastructure::ws_server::{self, ServerContext};

/// Fatal startup failures.  Everything after startup is scoped to a single
/// event, request, or session.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("MIDI input unavailable: {0}")]
    Source(#[from] SourceError),
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to start producer thread: {0}")]
    Producer(#[source] io::Error),
}

/// A started relay: input open, listener bound, producer running.
pub struct Relay {
    config: RelayConfig,
    listener: TcpListener,
    hub: EventHub,
    source: SourceGuard,
    pump: JoinHandle<PumpStats>,
}

impl Relay {
    /// Opens the input, binds the listener, and starts the producer.
    ///
    /// Must be called from within a multi-threaded Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`StartupError::Source`] if the input cannot be opened.  No listener
    ///   is bound in that case.
    /// - [`StartupError::Bind`] if the listen address is unavailable.  The
    ///   input is closed again before returning.
    pub async fn start(
        config: RelayConfig,
        source: Box<dyn MidiSource>,
    ) -> Result<Self, StartupError> {
        let events = source.start()?;
        let source = SourceGuard::new(source);
        info!("MIDI input open: {}", source.source().describe());

        let listener = ws_server::bind_listener(config.listen_addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: config.listen_addr,
                source,
            })?;

        let hub = EventHub::new(config.fanout, config.queue_capacity);
        let pump =
            spawn_pump(events, hub.clone(), Handle::current()).map_err(StartupError::Producer)?;

        info!(
            "relay ready: fanout={}, ws path {}",
            config.fanout, config.ws_path
        );
        Ok(Self {
            config,
            listener,
            hub,
            source,
            pump,
        })
    }

    /// Address the listener is bound to.  Differs from the configured one
    /// when port 0 was requested.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Serves viewers until `running` is cleared, then closes the input.
    pub async fn serve(self, running: Arc<AtomicBool>) {
        let ctx = Arc::new(ServerContext::new(&self.config, self.hub));
        ws_server::serve(self.listener, ws_server::router(ctx), running).await;

        drop(self.source);
        if self.pump.is_finished() {
            if let Ok(stats) = self.pump.join() {
                info!("producer finished after {} events", stats.published);
            }
        }
    }
}

/// Starts the relay and serves until `running` is cleared.
///
/// # Errors
///
/// Returns [`StartupError`] if startup fails; see [`Relay::start`].
pub async fn run_relay(
    config: RelayConfig,
    source: Box<dyn MidiSource>,
    running: Arc<AtomicBool>,
) -> Result<(), StartupError> {
    let relay = Relay::start(config, source).await?;
    relay.serve(running).await;
    Ok(())
}
