//! Contract between the supervisor and the service it supervises.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::UploaderConfig;
use crate::net::ListenerError;
use crate::routing::Delegate;

/// How an instance is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The instance binds its own listen address.
    Standalone,
    /// The instance is reached through a shared router's indirection.
    Mounted,
}

/// Why an instance's `run` returned.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The instance was told to shut down. Expected during reloads.
    #[error("instance closed by request")]
    Closed,

    #[error(transparent)]
    Listen(#[from] ListenerError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("instance task panicked: {0}")]
    Panicked(String),
}

impl InstanceError {
    /// `true` for the "closed by request" outcome.
    pub fn is_closed(&self) -> bool {
        matches!(self, InstanceError::Closed)
    }
}

/// One generation of the supervised service.
///
/// Lifecycle: Starting → Running → Draining → Stopped. Never restarted; a
/// reload always builds a new instance.
#[async_trait]
pub trait ServiceInstance: Send + Sync + 'static {
    /// Request handler to install behind a shared router's indirection.
    fn handler(&self) -> Delegate;

    /// Serve until told to stop or until serving fails.
    ///
    /// Returns `Err(InstanceError::Closed)` after [`shutdown`](Self::shutdown).
    async fn run(&self) -> Result<(), InstanceError>;

    /// Stop accepting work and wait until in-flight work has completed.
    async fn shutdown(&self);

    /// Resolves once the instance is actually serving.
    async fn started(&self);

    /// Binding descriptor for logs (listen address or mount).
    fn describe(&self) -> String;
}

/// Builds a fresh instance for each supervisor iteration.
pub trait InstanceFactory: Send + Sync + 'static {
    type Instance: ServiceInstance;

    fn build(&self, generation: u64, config: &UploaderConfig, mode: RunMode) -> Arc<Self::Instance>;
}
