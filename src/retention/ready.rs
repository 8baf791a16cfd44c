use std::sync::Arc;
use tokio::sync::watch;

/// One-shot latch gating live trimming until a channel's backfill finishes.
///
/// False until fired, then permanently true. Waiters that subscribe after
/// the fire return immediately.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    state: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Mark ready. Returns true only for the call that flipped the latch.
    pub fn fire(&self) -> bool {
        self.state.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Guard that fires the latch when dropped, whichever way the owner exits.
    pub fn guard(&self) -> ReadyGuard {
        ReadyGuard {
            signal: self.clone(),
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ReadyGuard {
    signal: ReadySignal,
}

impl Drop for ReadyGuard {
    fn drop(&mut self) {
        self.signal.fire();
    }
}
