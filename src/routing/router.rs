//! Shared router that other services mount under.
//!
//! # Responsibilities
//! - Accept prefix registrations pointing at handler indirections
//! - Dispatch each request to the longest matching mount
//! - Return explicit 404 when nothing matches
//!
//! # Design Decisions
//! - A pattern ending in `/` matches its whole subtree, any other pattern
//!   matches only itself
//! - Registrations are permanent; a repeated pattern keeps the first mount
//! - Mounts are few, lookup is a linear scan under a read lock

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::Service;

use crate::routing::indirection::HandlerIndirection;

/// Externally owned router the supervisor can mount its indirection on.
///
/// `register` is called at most once per pattern for the life of the process.
pub trait SharedRouter: Send + Sync + 'static {
    fn register(&self, pattern: &str, handler: HandlerIndirection);
}

/// Prefix-mount router, served with [`ParentRouter::into_router`].
#[derive(Debug, Clone, Default)]
pub struct ParentRouter {
    mounts: Arc<RwLock<BTreeMap<String, HandlerIndirection>>>,
}

impl ParentRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the handler for `path`.
    pub fn lookup(&self, path: &str) -> Option<HandlerIndirection> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts
            .iter()
            .filter(|(pattern, _)| pattern_matches(pattern, path))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, handler)| handler.clone())
    }

    /// Registered patterns, sorted.
    pub fn patterns(&self) -> Vec<String> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts.keys().cloned().collect()
    }

    /// Wrap into an axum router that can be passed to `axum::serve`.
    pub fn into_router(self) -> axum::Router {
        axum::Router::new().fallback_service(self)
    }
}

impl SharedRouter for ParentRouter {
    fn register(&self, pattern: &str, handler: HandlerIndirection) {
        let mut mounts = self.mounts.write().unwrap_or_else(PoisonError::into_inner);
        if mounts.contains_key(pattern) {
            tracing::warn!(pattern, "Pattern already mounted, keeping existing handler");
            return;
        }
        mounts.insert(pattern.to_string(), handler);
        tracing::debug!(pattern, "Pattern mounted");
    }
}

impl Service<Request<Body>> for ParentRouter {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let handler = self.lookup(request.uri().path());
        Box::pin(async move {
            match handler {
                Some(handler) => Ok(handler.delegate(request).await),
                None => Ok((StatusCode::NOT_FOUND, "No matching mount").into_response()),
            }
        })
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern.ends_with('/') {
        path.starts_with(pattern)
    } else {
        path == pattern
    }
}
