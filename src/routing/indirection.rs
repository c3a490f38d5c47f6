//! Swappable request handler.
//!
//! # Responsibilities
//! - Hold the handler of the currently active instance in one atomic slot
//! - Forward every request to whichever handler was installed last
//! - Keep a stable identity that a shared router can bind to once
//!
//! # Design Decisions
//! - `ArcSwapOption` gives wait-free reads; a reader holds a full `Arc` of
//!   either the old or the new delegate, never a torn one
//! - A delegate that is draining refuses admission; the request is then
//!   retried against the slot's current delegate
//! - Before the first swap every request gets `503 Service Unavailable`

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::{Service, ServiceExt};

use crate::net::connection::{InFlightGuard, InFlightTracker};

type BoxResponseFuture = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

/// One instance's request handler together with its admission tracker.
#[derive(Debug, Clone)]
pub struct Delegate {
    router: Router,
    inflight: InFlightTracker,
    generation: u64,
}

impl Delegate {
    pub fn new(router: Router, generation: u64) -> Self {
        Self {
            router,
            inflight: InFlightTracker::new(),
            generation,
        }
    }

    /// Generation of the instance this delegate belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn inflight(&self) -> &InFlightTracker {
        &self.inflight
    }

    /// Stop admitting requests.
    pub fn close(&self) {
        self.inflight.close();
    }

    /// Wait until every admitted request has completed.
    pub async fn wait_idle(&self) {
        self.inflight.wait_idle().await;
    }

    fn admit(&self) -> Option<InFlightGuard> {
        self.inflight.try_admit()
    }

    async fn dispatch(&self, request: Request<Body>, guard: InFlightGuard) -> Response {
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        drop(guard);
        response
    }

    /// Serve a request directly, refusing it once the delegate is closed.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        match self.admit() {
            Some(guard) => self.dispatch(request, guard).await,
            None => unavailable(),
        }
    }
}

impl Service<Request<Body>> for Delegate {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.handle(request).await) })
    }
}

#[derive(Debug, Default)]
struct Slot {
    current: ArcSwapOption<Delegate>,
    swaps: AtomicU64,
}

/// Stable handle whose target can be replaced atomically.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct HandlerIndirection {
    slot: Arc<Slot>,
}

impl HandlerIndirection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `delegate` for all requests that start from now on.
    ///
    /// Returns the delegate that was replaced, if any.
    pub fn swap(&self, delegate: Delegate) -> Option<Arc<Delegate>> {
        let generation = delegate.generation;
        let previous = self.slot.current.swap(Some(Arc::new(delegate)));
        self.slot.swaps.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            generation,
            previous = previous.as_ref().map(|d| d.generation),
            "Handler swapped"
        );
        previous
    }

    /// Number of swaps performed so far.
    pub fn swap_count(&self) -> u64 {
        self.slot.swaps.load(Ordering::SeqCst)
    }

    /// The delegate currently installed.
    pub fn current(&self) -> Option<Arc<Delegate>> {
        self.slot.current.load_full()
    }

    /// Forward `request` to the current delegate.
    pub async fn delegate(&self, request: Request<Body>) -> Response {
        let mut candidate = self.current();
        loop {
            let Some(delegate) = candidate else {
                return unavailable();
            };
            if let Some(guard) = delegate.admit() {
                return delegate.dispatch(request, guard).await;
            }
            // Loaded just before a swap and the old delegate began draining.
            let next = self.current();
            let unchanged = next.as_ref().map_or(true, |n| Arc::ptr_eq(n, &delegate));
            if unchanged {
                return unavailable();
            }
            candidate = next;
        }
    }
}

impl Service<Request<Body>> for HandlerIndirection {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.delegate(request).await) })
    }
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "No active upload handler").into_response()
}
