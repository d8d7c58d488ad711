//! Bridge lifecycle: single-fire termination signal plus the
//! `Establishing → Bridging → Closing → Closed` state machine.
//!
//! Both bridge flows share one [`TerminationSignal`]; whichever flow
//! detects connection loss, a write failure or the absolute timeout
//! fires it, and the other flow observes it at its next wait-wakeup.
//! The [`Lifecycle`] guards cleanup so it runs exactly once no matter
//! how many paths reach it.

use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// A single-fire flag safe for concurrent fire and observation.
#[derive(Debug, Clone)]
pub struct TerminationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl TerminationSignal {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::channel(false).0),
        }
    }

    /// Fire the signal. Safe to call more than once.
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn fired(&self) {
        let mut rx = self.tx.subscribe();
        // wait_for checks the current value first, so a signal fired
        // before this call is observed without blocking.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for TerminationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridge connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Dial/PTY/shell setup in progress. Setup failure goes straight
    /// to `Closed` — there is nothing to clean up.
    Establishing,
    /// Both flows running.
    Bridging,
    /// A terminal condition was detected; cleanup in progress.
    Closing,
    /// Terminal. Re-entrant cleanup calls are no-ops.
    Closed,
}

/// Per-connection lifecycle coordinator.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<BridgeState>,
    signal: TerminationSignal,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState::Establishing),
            signal: TerminationSignal::new(),
        }
    }

    /// The shared termination signal for this connection.
    pub fn signal(&self) -> TerminationSignal {
        self.signal.clone()
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enter `Bridging` once establishment succeeded.
    pub fn begin_bridging(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == BridgeState::Establishing {
            *state = BridgeState::Bridging;
        }
    }

    /// Transition into `Closing` and fire the termination signal.
    ///
    /// Returns `true` only for the caller that performed the
    /// transition — the one cleanup routine that may retire handles.
    pub fn begin_close(&self) -> bool {
        let first = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match *state {
                BridgeState::Establishing | BridgeState::Bridging => {
                    *state = BridgeState::Closing;
                    true
                }
                BridgeState::Closing | BridgeState::Closed => false,
            }
        };
        // Fire outside the lock; fire is idempotent anyway.
        self.signal.fire();
        first
    }

    /// Mark cleanup complete. Idempotent.
    pub fn finish_close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = BridgeState::Closed;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_fires_once_and_is_observed() {
        let signal = TerminationSignal::new();
        assert!(!signal.is_fired());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.fired().await })
        };

        signal.fire();
        signal.fire(); // second fire is a no-op
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn wait_after_fire_returns_immediately() {
        let signal = TerminationSignal::new();
        signal.fire();
        tokio::time::timeout(Duration::from_millis(100), signal.fired())
            .await
            .expect("already-fired signal must not block");
    }

    #[test]
    fn normal_state_progression() {
        let lc = Lifecycle::new();
        assert_eq!(lc.state(), BridgeState::Establishing);
        lc.begin_bridging();
        assert_eq!(lc.state(), BridgeState::Bridging);
        assert!(lc.begin_close());
        assert_eq!(lc.state(), BridgeState::Closing);
        lc.finish_close();
        assert_eq!(lc.state(), BridgeState::Closed);
    }

    #[test]
    fn only_first_closer_wins() {
        let lc = Lifecycle::new();
        lc.begin_bridging();
        assert!(lc.begin_close());
        assert!(!lc.begin_close());
        lc.finish_close();
        assert!(!lc.begin_close());
        assert_eq!(lc.state(), BridgeState::Closed);
    }

    #[test]
    fn establishment_failure_closes_directly() {
        let lc = Lifecycle::new();
        assert!(lc.begin_close());
        lc.finish_close();
        assert_eq!(lc.state(), BridgeState::Closed);
    }

    #[test]
    fn begin_close_fires_the_signal() {
        let lc = Lifecycle::new();
        lc.begin_bridging();
        let signal = lc.signal();
        assert!(!signal.is_fired());
        lc.begin_close();
        assert!(signal.is_fired());
        // A losing begin_close still leaves the signal fired.
        lc.begin_close();
        assert!(signal.is_fired());
    }

    #[test]
    fn finish_close_is_idempotent() {
        let lc = Lifecycle::new();
        lc.begin_bridging();
        lc.begin_close();
        lc.finish_close();
        lc.finish_close();
        assert_eq!(lc.state(), BridgeState::Closed);
    }
}
