//! The supervised upload server.
//!
//! # Responsibilities
//! - Build the instance's Axum Router under its base path
//! - Wire up middleware (tracing, body limit, timeout, request ID)
//! - Standalone: bind the listen address and serve with graceful shutdown
//! - Mounted: stay alive behind the shared router until told to stop
//! - Drain: stop taking new work, finish what was already accepted

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::UploaderConfig;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::http::upload::{self, UploadState};
use crate::lifecycle::{InstanceError, InstanceFactory, Latch, RunMode, ServiceInstance};
use crate::net::bind_with_retry;
use crate::routing::{route_prefix, Delegate};

/// One generation of the upload service.
pub struct UploadServer {
    generation: u64,
    config: UploaderConfig,
    mode: RunMode,
    prefix: String,
    delegate: Delegate,
    stop: CancellationToken,
    started: Latch,
    stopped: Latch,
    launched: AtomicBool,
    local_addr: OnceLock<SocketAddr>,
}

impl UploadServer {
    /// Create a new upload server from a configuration snapshot.
    pub fn new(generation: u64, config: UploaderConfig, mode: RunMode) -> Self {
        let prefix = route_prefix(&config.server.base_path).unwrap_or_else(|e| {
            tracing::warn!(generation, error = %e, "Unusable base path, serving at root");
            "/".to_string()
        });
        let router = Self::build_router(&config, &prefix, generation);

        Self {
            generation,
            config,
            mode,
            prefix,
            delegate: Delegate::new(router, generation),
            stop: CancellationToken::new(),
            started: Latch::new(),
            stopped: Latch::new(),
            launched: AtomicBool::new(false),
            local_addr: OnceLock::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &UploaderConfig, prefix: &str, generation: u64) -> Router {
        let routes = upload::routes(UploadState {
            upload_dir: PathBuf::from(&config.storage.upload_dir),
            generation,
        });
        let app = if prefix == "/" {
            routes
        } else {
            Router::new().nest(prefix, routes)
        };

        let request_id = HeaderName::from_static(X_REQUEST_ID);
        app.layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.server.max_upload_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, UuidRequestId))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Route prefix the routes are nested under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Address actually bound, once a standalone instance has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    async fn serve(&self) -> Result<(), InstanceError> {
        if self.stop.is_cancelled() {
            return Ok(());
        }

        let listener = bind_with_retry(&self.config.server.listen_address).await?;
        let addr = listener.local_addr().map_err(InstanceError::Serve)?;
        let _ = self.local_addr.set(addr);
        self.started.fire();

        tracing::debug!(generation = self.generation, address = %addr, "HTTP server starting");

        let app = Router::new().fallback_service(self.delegate.clone());
        axum::serve(listener, app)
            .with_graceful_shutdown(self.stop.clone().cancelled_owned())
            .await
            .map_err(InstanceError::Serve)?;

        tracing::debug!(generation = self.generation, "HTTP server stopped");
        Ok(())
    }
}

#[async_trait]
impl ServiceInstance for UploadServer {
    fn handler(&self) -> Delegate {
        self.delegate.clone()
    }

    async fn run(&self) -> Result<(), InstanceError> {
        self.launched.store(true, Ordering::SeqCst);
        let outcome = match self.mode {
            RunMode::Standalone => self.serve().await,
            RunMode::Mounted => {
                self.started.fire();
                self.stop.cancelled().await;
                Ok(())
            }
        };
        self.stopped.fire();
        outcome?;
        Err(InstanceError::Closed)
    }

    async fn shutdown(&self) {
        // Standalone: graceful shutdown stops accepting connections and still
        // serves requests on connections already accepted. Mounted: the
        // indirection routes around a closed delegate.
        if self.mode == RunMode::Mounted {
            self.delegate.close();
        }
        self.stop.cancel();
        if self.launched.load(Ordering::SeqCst) {
            self.stopped.wait().await;
        }
        self.delegate.wait_idle().await;
        tracing::debug!(generation = self.generation, "Instance stopped");
    }

    async fn started(&self) {
        self.started.wait().await;
    }

    fn describe(&self) -> String {
        match self.mode {
            RunMode::Standalone => self
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|| self.config.server.listen_address.clone()),
            RunMode::Mounted => format!("mount {}", self.prefix),
        }
    }
}

/// Builds [`UploadServer`]s for the supervisor.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadServerFactory;

impl InstanceFactory for UploadServerFactory {
    type Instance = UploadServer;

    fn build(&self, generation: u64, config: &UploaderConfig, mode: RunMode) -> Arc<UploadServer> {
        Arc::new(UploadServer::new(generation, config.clone(), mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn config(dir: &std::path::Path, base_path: &str) -> UploaderConfig {
        let mut config = UploaderConfig::default();
        config.server.base_path = base_path.to_string();
        config.server.listen_address = "127.0.0.1:0".to_string();
        config.server.max_upload_bytes = 16;
        config.storage.upload_dir = dir.display().to_string();
        config
    }

    #[tokio::test]
    async fn routes_are_nested_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let server = UploadServer::new(1, config(dir.path(), "/upload/"), RunMode::Mounted);
        assert_eq!(server.prefix(), "/upload");

        let response = server
            .handler()
            .oneshot(Request::get("/upload/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let response = server
            .handler()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = UploadServer::new(1, config(dir.path(), "/"), RunMode::Mounted);

        let response = server
            .handler()
            .oneshot(
                Request::put("/files/big")
                    .body(Body::from(vec![0u8; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn mounted_run_returns_closed_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(UploadServer::new(1, config(dir.path(), "/"), RunMode::Mounted));

        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };
        server.started().await;
        server.shutdown().await;

        let outcome = runner.await.unwrap();
        assert!(matches!(outcome, Err(InstanceError::Closed)));

        let response = server
            .handler()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn standalone_binds_and_reports_address() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(UploadServer::new(2, config(dir.path(), "/"), RunMode::Standalone));

        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };
        server.started().await;
        let addr = server.local_addr().unwrap();
        assert_eq!(server.describe(), addr.to_string());

        server.shutdown().await;
        assert!(runner.await.unwrap().unwrap_err().is_closed());
        // Admission is left to graceful shutdown, not the delegate.
        assert!(!server.handler().inflight().is_closed());
    }
}
