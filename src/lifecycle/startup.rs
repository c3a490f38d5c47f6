//! Startup notification.
//!
//! # Responsibilities
//! - Let an instance announce, exactly once, that it is serving
//! - Let the supervisor wait for that announcement before reporting readiness
//!
//! # Design Decisions
//! - Backed by a `watch` channel so late waiters still observe the event
//! - Firing twice is harmless; waiting after firing returns immediately

use tokio::sync::watch;

/// One-shot event that can be awaited any number of times.
#[derive(Debug)]
pub struct Latch {
    tx: watch::Sender<bool>,
}

impl Latch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fire the event. Later calls do nothing.
    pub fn fire(&self) {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true));
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the event has fired.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_after_fire_returns() {
        let latch = Latch::new();
        assert!(!latch.is_fired());
        latch.fire();
        latch.fire();
        assert!(latch.is_fired());
        tokio::time::timeout(Duration::from_millis(100), latch.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn waiter_is_released_by_fire() {
        let latch = Arc::new(Latch::new());
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        latch.fire();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
