//! One-shot, session-scoped termination signal.
//!
//! Each viewer session runs a read duty and a write duty concurrently.  The
//! first one to observe the end of the session fires the signal; the other
//! notices it at its next `select!` and exits.  Firing never blocks and
//! firing twice is harmless.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable handle to a one-shot termination flag.
#[derive(Debug, Clone)]
pub struct TerminationSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl TerminationSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Fires the signal.  Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Resolves once the signal has fired (immediately if it already has).
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` loop.
    pub async fn fired(&mut self) {
        // The sender lives as long as any clone of `self`, so this cannot
        // fail while we hold `self`.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

impl Default for TerminationSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
