//! One-shot readiness latch guarding the first wire write.
//!
//! Built on `tokio::sync::watch` rather than `Notify`: `watch` retains the
//! last value, so a waiter that arrives after the gate opened proceeds
//! immediately instead of missing the edge.

use tokio::sync::watch;

/// Monotonic latch: opens exactly once and never closes again.
#[derive(Debug)]
pub struct ReadyGate {
    opened: watch::Sender<bool>,
}

impl ReadyGate {
    /// Create a closed gate.
    pub fn new() -> Self {
        let (opened, _) = watch::channel(false);
        Self { opened }
    }

    /// Open the gate, releasing every current and future waiter.
    ///
    /// Idempotent: a second open is a no-op, never an error. Returns `true`
    /// only for the call that actually transitioned the gate.
    pub fn open(&self) -> bool {
        self.opened.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    /// Whether the gate has opened.
    pub fn is_open(&self) -> bool {
        *self.opened.borrow()
    }

    /// Suspend until the gate opens. Returns immediately if already open.
    pub async fn wait(&self) {
        let mut rx = self.opened.subscribe();
        // Cannot fail: `self` keeps the sender alive for the duration.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_open_is_idempotent() {
        let gate = ReadyGate::new();
        assert!(!gate.is_open());

        assert!(gate.open());
        assert!(gate.is_open());

        // Second open is a no-op, not an error.
        assert!(!gate.open());
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn test_open_releases_all_waiters() {
        let gate = Arc::new(ReadyGate::new());

        let mut waiters = Vec::new();
        for _ in 0..5 {
            let gate = Arc::clone(&gate);
            waiters.push(tokio::spawn(async move { gate.wait().await }));
        }

        tokio::task::yield_now().await;
        gate.open();

        for waiter in waiters {
            waiter.await.expect("waiter panicked");
        }
    }

    #[tokio::test]
    async fn test_wait_after_open_returns_immediately() {
        let gate = ReadyGate::new();
        gate.open();
        gate.wait().await;
    }
}
