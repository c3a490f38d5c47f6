//! In-flight request tracking for graceful drains.
//!
//! # Responsibilities
//! - Admit requests while an instance is open, refuse them once it drains
//! - Count admitted requests that have not completed yet
//! - Let a drain wait until that count reaches zero
//!
//! # Design Decisions
//! - Admission increments first and checks `closed` second; closing stores
//!   `closed` first and reads the count second. With sequentially consistent
//!   ordering either the admission sees `closed` or the drain sees the request.
//! - Waiters are woken through a `Notify`, no polling

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    active: AtomicU64,
    closed: AtomicBool,
    idle: Notify,
}

/// Tracks requests admitted by one service instance.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    inner: Arc<Inner>,
}

impl InFlightTracker {
    /// Create a new, open tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a request. Returns `None` once the tracker has been closed.
    ///
    /// The returned guard keeps the request counted until it is dropped.
    pub fn try_admit(&self) -> Option<InFlightGuard> {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        if self.inner.closed.load(Ordering::SeqCst) {
            self.release();
            return None;
        }
        metrics::gauge!("uploader_inflight_requests").increment(1.0);
        Some(InFlightGuard {
            tracker: self.clone(),
        })
    }

    /// Stop admitting new requests. Idempotent.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Get current in-flight request count.
    pub fn active_count(&self) -> u64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no admitted request is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed.
            notified.as_mut().enable();
            if self.active_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Guard that keeps one request counted. Decrements the count when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: InFlightTracker,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        metrics::gauge!("uploader_inflight_requests").decrement(1.0);
        self.tracker.release();
    }
}
