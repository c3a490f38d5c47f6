//! TCP listener binding for standalone instances.
//!
//! # Responsibilities
//! - Parse and bind the configured address
//! - Retry while a previous instance is still releasing the address
//!
//! # Design Decisions
//! - Only `AddrInUse` is retried; every other bind error is final
//! - Retries are bounded, the supervisor decides what a final error means

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::resilience::backoff::RetryPolicy;

/// Retry schedule for an address that stays in use.
pub const REBIND: RetryPolicy = RetryPolicy {
    attempts: 8,
    base: Duration::from_millis(25),
    max: Duration::from_millis(1_000),
};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address is not a socket address.
    #[error("invalid listen address {address:?}: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: std::io::Error,
    },
}

/// Bind `address`, retrying with backoff while it is still in use.
pub async fn bind_with_retry(address: &str) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = address.parse().map_err(|source| ListenerError::Address {
        address: address.to_string(),
        source,
    })?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                tracing::debug!(address = %addr, attempt, "Listener bound");
                return Ok(listener);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && REBIND.allows_retry(attempt) => {
                let delay = REBIND.delay(attempt);
                tracing::debug!(address = %addr, attempt, delay = ?delay, "Address in use, retrying bind");
                tokio::time::sleep(delay).await;
            }
            Err(source) => return Err(ListenerError::Bind { address: addr, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_garbage_address() {
        let err = bind_with_retry("not-an-address").await.unwrap_err();
        assert!(matches!(err, ListenerError::Address { .. }));
    }

    #[tokio::test]
    async fn waits_for_address_to_be_released() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = holder.local_addr().unwrap();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            drop(holder);
        });

        let listener = bind_with_retry(&addr.to_string()).await.unwrap();
        assert_eq!(listener.local_addr().unwrap(), addr);
        release.await.unwrap();
    }
}
