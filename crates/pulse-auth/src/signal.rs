//! Re-authentication signal.
//!
//! Raised once per failed refresh. The UI layer awaits it and routes the user
//! to sign-in; nothing in this crate navigates.

use tokio::sync::watch;

/// Monotonic counter of "session lost, sign in again" events.
#[derive(Clone, Debug)]
pub struct ReauthSignal {
    tx: watch::Sender<u64>,
}

impl ReauthSignal {
    /// Create a signal with a zero count.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    /// Raise the signal.
    pub fn raise(&self) {
        self.tx.send_modify(|n| *n += 1);
        tracing::info!(count = *self.tx.borrow(), "re-authentication required");
    }

    /// Number of times the signal has been raised.
    pub fn count(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Receiver whose `changed()` resolves on each raise.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for ReauthSignal {
    fn default() -> Self {
        Self::new()
    }
}
