//! services/agent/src/adapters/wake.rs
//!
//! Implementations of the `WakeChannel` port. The trigger loop's own timer is the
//! fallback, so dropping a signal is always acceptable.

use reminder_core::domain::WakeSignal;
use reminder_core::ports::WakeChannel;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Discards every signal.
#[derive(Debug, Clone, Default)]
pub struct NoopWake;

impl WakeChannel for NoopWake {
    fn notify(&self, _signal: WakeSignal) {}
}

/// Hands signals to a trigger loop over a bounded channel without waiting.
#[derive(Debug, Clone)]
pub struct MpscWake {
    tx: mpsc::Sender<WakeSignal>,
}

impl MpscWake {
    /// Creates the sending half and the receiver the trigger loop listens on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WakeSignal>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl WakeChannel for MpscWake {
    fn notify(&self, signal: WakeSignal) {
        match self.tx.try_send(signal) {
            Ok(()) => {}
            Err(TrySendError::Full(signal)) => {
                debug!(owner_id = %signal.owner_id, "Wake channel full; dropping signal");
            }
            Err(TrySendError::Closed(signal)) => {
                debug!(owner_id = %signal.owner_id, "No trigger loop listening; dropping signal");
            }
        }
    }
}
