//! Drain coordination.
//!
//! # Responsibilities
//! - Run an instance's graceful shutdown under an optional deadline
//! - Track drains started by reloads so the final exit can account for them

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::task::TaskTracker;

use crate::lifecycle::instance::ServiceInstance;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every accepted request finished.
    Completed,
    /// The deadline expired first; the instance was abandoned.
    TimedOut(Duration),
}

/// Shut `instance` down, waiting at most `deadline` if one is given.
pub async fn drain<I>(instance: &I, deadline: Option<Duration>) -> DrainOutcome
where
    I: ServiceInstance + ?Sized,
{
    match deadline {
        None => {
            instance.shutdown().await;
            DrainOutcome::Completed
        }
        Some(limit) => match tokio::time::timeout(limit, instance.shutdown()).await {
            Ok(()) => DrainOutcome::Completed,
            Err(_) => DrainOutcome::TimedOut(limit),
        },
    }
}

/// Detached drains of instances superseded by a reload.
///
/// Their completion is only logged; control flow never waits on a single
/// drain. The final shutdown may wait for all of them with [`wait`](Self::wait).
#[derive(Clone, Default)]
pub struct DrainTracker {
    tasks: TaskTracker,
}

impl DrainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start draining `instance` in the background.
    pub fn spawn<I>(&self, generation: u64, instance: Arc<I>, deadline: Option<Duration>)
    where
        I: ServiceInstance,
    {
        self.tasks.spawn(async move {
            let started = Instant::now();
            match drain(&*instance, deadline).await {
                DrainOutcome::Completed => tracing::info!(
                    generation,
                    elapsed = ?started.elapsed(),
                    "Superseded instance drained"
                ),
                DrainOutcome::TimedOut(limit) => tracing::warn!(
                    generation,
                    timeout = ?limit,
                    "Superseded instance did not drain before the deadline"
                ),
            }
        });
    }

    /// Number of drains still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Stop accepting new drains and wait for the running ones.
    pub async fn wait(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

impl std::fmt::Debug for DrainTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainTracker")
            .field("pending", &self.pending())
            .finish()
    }
}
