//! Single-producer, multi-consumer distribution of encoded MIDI events.
//!
//! The producer thread calls [`EventHub::publish`] once per event.  Each
//! viewer session holds a [`Subscription`] for as long as it is attached.
//!
//! # Fan-out modes
//!
//! - [`FanoutMode::Broadcast`]: backed by `tokio::sync::broadcast`.  Each
//!   subscription has its own bounded queue, so every attached session sees
//!   every event in publish order.  A session more than `queue_capacity`
//!   events behind loses the oldest ones and its next `recv` reports
//!   [`FeedError::Lagged`] with the number skipped.
//!
//! - [`FanoutMode::Shared`]: a handoff that every session reads in
//!   contention.  `publish` returns only once some session has taken the
//!   event, so an event is delivered to exactly one session and never waits
//!   in a buffer on behalf of a session that is not receiving.
//!
//! # Publishing with no viewers
//!
//! In both modes `publish` waits while no subscription exists.  The event is
//! neither dropped nor an error; the producer resumes once a viewer attaches.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tracing::trace;

use midi_relay_core::EncodedMessage;

use crate::domain::FanoutMode;

/// Errors returned by [`Subscription::recv`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The subscription fell behind; this many events were discarded.
    #[error("subscription lagged; {0} events skipped")]
    Lagged(u64),

    /// Every [`EventHub`] handle has been dropped.
    #[error("event feed closed")]
    Closed,
}

/// One shared-mode event in flight.  `taken` fires when a session has it.
#[derive(Debug)]
struct Handoff {
    msg: EncodedMessage,
    taken: oneshot::Sender<()>,
}

#[derive(Debug, Clone)]
enum Conduit {
    Broadcast(broadcast::Sender<EncodedMessage>),
    Shared {
        tx: mpsc::Sender<Handoff>,
        rx: Arc<Mutex<mpsc::Receiver<Handoff>>>,
    },
}

/// Publishing side of the event feed.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventHub {
    conduit: Conduit,
    viewers: Arc<watch::Sender<usize>>,
}

impl EventHub {
    /// Creates a hub.  `queue_capacity` is the per-subscription queue length
    /// in broadcast mode and is ignored in shared mode.
    pub fn new(mode: FanoutMode, queue_capacity: usize) -> Self {
        let conduit = match mode {
            FanoutMode::Broadcast => {
                let (tx, _) = broadcast::channel(queue_capacity.max(1));
                Conduit::Broadcast(tx)
            }
            FanoutMode::Shared => {
                let (tx, rx) = mpsc::channel(1);
                Conduit::Shared {
                    tx,
                    rx: Arc::new(Mutex::new(rx)),
                }
            }
        };
        let (viewers, _) = watch::channel(0);
        Self {
            conduit,
            viewers: Arc::new(viewers),
        }
    }

    pub fn mode(&self) -> FanoutMode {
        match self.conduit {
            Conduit::Broadcast(_) => FanoutMode::Broadcast,
            Conduit::Shared { .. } => FanoutMode::Shared,
        }
    }

    /// Number of currently attached subscriptions.
    pub fn viewer_count(&self) -> usize {
        *self.viewers.borrow()
    }

    /// Attaches a new subscription.  It receives events published from now on.
    pub fn subscribe(&self) -> Subscription {
        let feed = match &self.conduit {
            Conduit::Broadcast(tx) => Feed::Broadcast(tx.subscribe()),
            Conduit::Shared { rx, .. } => Feed::Shared(Arc::clone(rx)),
        };
        // Count only after the receiver exists so a woken publisher always
        // finds someone to deliver to.
        self.viewers.send_modify(|n| *n += 1);
        Subscription {
            feed,
            _slot: ViewerSlot(Arc::clone(&self.viewers)),
        }
    }

    /// Publishes one event, waiting while no subscription is attached.
    ///
    /// Returns how many subscriptions the event was queued for.  In shared
    /// mode this is always 1 and the call returns only after a subscription
    /// has taken the event.
    pub async fn publish(&self, mut msg: EncodedMessage) -> usize {
        loop {
            self.wait_for_viewer().await;

            match &self.conduit {
                Conduit::Broadcast(tx) => match tx.send(msg) {
                    Ok(receivers) => {
                        trace!("event queued for {receivers} viewers");
                        return receivers;
                    }
                    // The last viewer detached between the wake-up and the
                    // send; wait for the next one.
                    Err(broadcast::error::SendError(returned)) => msg = returned,
                },
                Conduit::Shared { tx, .. } => {
                    let (taken, taken_rx) = oneshot::channel();
                    let handoff = Handoff {
                        msg: msg.clone(),
                        taken,
                    };
                    // The hub owns the receiver, so the channel cannot close.
                    if tx.send(handoff).await.is_err() {
                        continue;
                    }
                    if taken_rx.await.is_ok() {
                        trace!("event taken by one viewer");
                        return 1;
                    }
                }
            }
        }
    }

    async fn wait_for_viewer(&self) {
        let mut rx = self.viewers.subscribe();
        // `self.viewers` is alive for the whole call, so this cannot fail.
        let _ = rx.wait_for(|n| *n > 0).await;
    }
}

#[derive(Debug)]
enum Feed {
    Broadcast(broadcast::Receiver<EncodedMessage>),
    Shared(Arc<Mutex<mpsc::Receiver<Handoff>>>),
}

/// Receiving side held by one viewer session.  Detaches on drop.
#[derive(Debug)]
pub struct Subscription {
    feed: Feed,
    // Declared after `feed`: the count drops only once the receiver is gone.
    _slot: ViewerSlot,
}

/// Holds one unit of the viewer count and gives it back on drop.
#[derive(Debug)]
struct ViewerSlot(Arc<watch::Sender<usize>>);

impl Drop for ViewerSlot {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Subscription {
    /// Waits for the next event.  Cancel-safe.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Lagged`] if events were discarded for this subscription;
    ///   the next call continues with the oldest retained event.
    /// - [`FeedError::Closed`] once all hub handles are gone.
    pub async fn recv(&mut self) -> Result<EncodedMessage, FeedError> {
        match &mut self.feed {
            Feed::Broadcast(rx) => rx.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Lagged(n) => FeedError::Lagged(n),
                broadcast::error::RecvError::Closed => FeedError::Closed,
            }),
            Feed::Shared(rx) => {
                let handoff = rx.lock().await.recv().await.ok_or(FeedError::Closed)?;
                // The publisher may have given up waiting; the event is ours.
                let _ = handoff.taken.send(());
                Ok(handoff.msg)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
