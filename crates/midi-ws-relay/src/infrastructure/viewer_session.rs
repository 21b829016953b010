//! One connected viewer: forwards events, watches for disconnect, tears down.
//!
//! After the WebSocket upgrade the connection is split into a sink and a
//! stream, and two duties run concurrently:
//!
//! - **Write duty** (spawned task): waits on the session's [`Subscription`]
//!   and sends each event as a text frame.
//! - **Read duty** (the session task itself): reads viewer frames only to
//!   notice a Close frame, an error, or end of stream.  Viewer payloads are
//!   ignored.
//!
//! Whichever duty sees the end first fires the [`TerminationSignal`]; the
//! other exits at its next `select!`.  The session task then takes the sink
//! back from the write duty and closes the connection, once.
//!
//! The session is generic over the sink and stream so tests can drive it
//! without sockets.

use std::fmt::Display;
use std::net::SocketAddr;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use axum::extract::ws::Message as WsMessage;
use tracing::{debug, error, info, trace, warn};

use crate::application::{FeedError, Subscription, TerminationSignal};
use crate::domain::{SessionEnd, SessionId, SessionLifecycle, SessionReport, SessionState};

/// A viewer session between handshake and teardown.
pub struct ViewerSession {
    id: SessionId,
    peer: SocketAddr,
    subscription: Subscription,
    lifecycle: SessionLifecycle,
}

/// What the write duty hands back to the session task.
struct WriteOutcome<S> {
    sink: S,
    sent: u64,
    skipped: u64,
    end: Option<SessionEnd>,
}

impl ViewerSession {
    /// Creates a session in [`SessionState::Connecting`] attached to the feed.
    pub fn new(peer: SocketAddr, subscription: Subscription) -> Self {
        Self {
            id: SessionId::new(),
            peer,
            subscription,
            lifecycle: SessionLifecycle::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// Runs both duties to completion and closes the connection.
    ///
    /// Returns once the session is [`SessionState::Closed`].
    pub async fn run<S, R, E>(mut self, sink: S, mut stream: R) -> SessionReport
    where
        S: Sink<WsMessage> + Unpin + Send + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<WsMessage, E>> + Unpin,
        E: Display,
    {
        let id = self.id;
        self.advance(SessionState::Active);
        info!("session {id}: viewer {} attached", self.peer);

        let mut stop = TerminationSignal::new();
        let writer = tokio::spawn(write_duty(id, sink, self.subscription, stop.clone()));

        let read_end = read_duty(id, &mut stream, &mut stop).await;
        stop.fire();
        self.lifecycle
            .advance(SessionState::Closing)
            .unwrap_or_else(|e| warn!("session {id}: {e}"));
        debug!("session {id}: closing");

        let (sent, skipped, write_end) = match writer.await {
            Ok(outcome) => {
                let mut sink = outcome.sink;
                if let Err(e) = sink.close().await {
                    debug!("session {id}: close handshake failed: {e}");
                }
                (outcome.sent, outcome.skipped, outcome.end)
            }
            Err(e) => {
                error!("session {id}: write duty aborted: {e}");
                (0, 0, Some(SessionEnd::WriteFailed(e.to_string())))
            }
        };

        self.lifecycle
            .advance(SessionState::Closed)
            .unwrap_or_else(|e| warn!("session {id}: {e}"));

        let report = SessionReport {
            id,
            messages_sent: sent,
            messages_skipped: skipped,
            end: read_end.or(write_end).unwrap_or(SessionEnd::StreamEnded),
        };
        info!(
            "session {id}: viewer {} detached ({}; {} sent, {} skipped)",
            self.peer, report.end, report.messages_sent, report.messages_skipped
        );
        report
    }

    fn advance(&mut self, next: SessionState) {
        if let Err(e) = self.lifecycle.advance(next) {
            warn!("session {}: {e}", self.id);
        }
    }
}

/// Forwards feed events to the viewer until the signal fires or a send fails.
async fn write_duty<S>(
    id: SessionId,
    mut sink: S,
    mut subscription: Subscription,
    mut stop: TerminationSignal,
) -> WriteOutcome<S>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display + Send,
{
    let mut sent = 0u64;
    let mut skipped = 0u64;

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = stop.fired() => None,
            next = subscription.recv() => Some(next),
        };
        let Some(next) = next else {
            break None;
        };

        match next {
            Ok(msg) => {
                if let Err(e) = sink.send(WsMessage::Text(msg.as_str().to_owned())).await {
                    warn!("session {id}: send to viewer failed: {e}");
                    stop.fire();
                    break Some(SessionEnd::WriteFailed(e.to_string()));
                }
                sent += 1;
            }
            Err(FeedError::Lagged(n)) => {
                warn!("session {id}: viewer fell behind; {n} events skipped");
                skipped += n;
            }
            Err(FeedError::Closed) => {
                debug!("session {id}: event feed closed");
                stop.fire();
                break Some(SessionEnd::FeedClosed);
            }
        }
    };

    debug!("session {id}: write duty exited");
    WriteOutcome {
        sink,
        sent,
        skipped,
        end,
    }
}

/// Reads viewer frames until the viewer goes away or the signal fires.
///
/// Returns `None` when stopped by the signal.
async fn read_duty<R, E>(
    id: SessionId,
    stream: &mut R,
    stop: &mut TerminationSignal,
) -> Option<SessionEnd>
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = stop.fired() => return None,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(WsMessage::Close(_))) => {
                debug!("session {id}: viewer sent Close");
                return Some(SessionEnd::PeerClosed);
            }
            Some(Ok(_)) => {
                trace!("session {id}: ignoring viewer frame");
            }
            Some(Err(e)) => {
                debug!("session {id}: viewer read error: {e}");
                return Some(SessionEnd::PeerError(e.to_string()));
            }
            None => {
                debug!("session {id}: viewer stream ended");
                return Some(SessionEnd::StreamEnded);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
