//! Shared utilities for supervisor integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, Uri};
use axum::Router;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use fileuploader::config::{ConfigError, ConfigSource, UploaderConfig};
use fileuploader::lifecycle::{InstanceError, InstanceFactory, Latch, RunMode, ServiceInstance};
use fileuploader::routing::{Delegate, HandlerIndirection, ParentRouter, SharedRouter};

/// Gate that holds `/slow` requests until opened.
#[derive(Clone, Default)]
pub struct SlowGate {
    open: Arc<Latch>,
    entered: Arc<Notify>,
}

impl SlowGate {
    pub fn open(&self) {
        self.open.fire();
    }

    /// Wait until a `/slow` request is being handled.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }
}

/// Instance that serves a tiny router and fails on demand.
pub struct MockInstance {
    pub generation: u64,
    pub config: UploaderConfig,
    delegate: Delegate,
    stop: CancellationToken,
    started: Latch,
    stopped: Latch,
    drained: Latch,
    launched: AtomicBool,
    fault: Notify,
    pending_fault: Mutex<Option<InstanceError>>,
    refuse_start: bool,
}

impl MockInstance {
    fn new(generation: u64, config: UploaderConfig, gate: SlowGate, refuse_start: bool) -> Self {
        let router = Router::new().fallback(move |uri: Uri| {
            let gate = gate.clone();
            async move {
                if uri.path().ends_with("/slow") {
                    gate.entered.notify_one();
                    gate.open.wait().await;
                    format!("slow {generation}")
                } else {
                    generation.to_string()
                }
            }
        });
        Self {
            generation,
            config,
            delegate: Delegate::new(router, generation),
            stop: CancellationToken::new(),
            started: Latch::new(),
            stopped: Latch::new(),
            drained: Latch::new(),
            launched: AtomicBool::new(false),
            fault: Notify::new(),
            pending_fault: Mutex::new(None),
            refuse_start,
        }
    }

    /// Make `run` return `err`.
    pub fn fail(&self, err: InstanceError) {
        *self.pending_fault.lock().unwrap() = Some(err);
        self.fault.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.is_fired()
    }

    pub async fn wait_started(&self) {
        self.started.wait().await;
    }

    pub async fn wait_stopped(&self) {
        self.stopped.wait().await;
    }

    /// `true` once `shutdown` has finished every admitted request.
    pub fn is_drained(&self) -> bool {
        self.drained.is_fired()
    }

    pub async fn wait_drained(&self) {
        self.drained.wait().await;
    }
}

#[async_trait]
impl ServiceInstance for MockInstance {
    fn handler(&self) -> Delegate {
        self.delegate.clone()
    }

    async fn run(&self) -> Result<(), InstanceError> {
        self.launched.store(true, Ordering::SeqCst);
        if self.refuse_start {
            self.stopped.fire();
            return Err(InstanceError::Serve(std::io::Error::other("bind refused")));
        }
        self.started.fire();

        let outcome = tokio::select! {
            () = self.stop.cancelled() => Err(InstanceError::Closed),
            () = self.fault.notified() => {
                let fault = self.pending_fault.lock().unwrap().take();
                Err(fault.unwrap_or(InstanceError::Closed))
            }
        };
        self.stopped.fire();
        outcome
    }

    async fn shutdown(&self) {
        self.delegate.close();
        self.stop.cancel();
        self.delegate.wait_idle().await;
        if self.launched.load(Ordering::SeqCst) {
            self.stopped.wait().await;
        }
        self.drained.fire();
    }

    async fn started(&self) {
        self.started.wait().await;
    }

    fn describe(&self) -> String {
        format!("mock {}", self.generation)
    }
}

/// Factory that remembers every instance it built.
#[derive(Clone, Default)]
pub struct MockFactory {
    built: Arc<Mutex<Vec<Arc<MockInstance>>>>,
    pub gate: SlowGate,
    refuse_start: bool,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose instances fail before they start serving.
    pub fn refusing_start() -> Self {
        Self {
            refuse_start: true,
            ..Self::default()
        }
    }

    pub fn built(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    pub fn instance(&self, generation: u64) -> Arc<MockInstance> {
        let built = self.built.lock().unwrap();
        built[(generation - 1) as usize].clone()
    }

    /// Wait until `count` instances exist and the last one is serving.
    pub async fn wait_for_generation(&self, count: usize) -> Arc<MockInstance> {
        wait_until(|| self.built() >= count).await;
        let instance = self.instance(count as u64);
        within(instance.wait_started()).await;
        instance
    }
}

impl InstanceFactory for MockFactory {
    type Instance = MockInstance;

    fn build(&self, generation: u64, config: &UploaderConfig, _mode: RunMode) -> Arc<MockInstance> {
        let instance = Arc::new(MockInstance::new(
            generation,
            config.clone(),
            self.gate.clone(),
            self.refuse_start,
        ));
        self.built.lock().unwrap().push(instance.clone());
        instance
    }
}

/// Configuration held in memory; can be replaced or broken between reloads.
#[derive(Clone, Default)]
pub struct MemoryConfig {
    current: Arc<Mutex<Option<UploaderConfig>>>,
}

impl MemoryConfig {
    pub fn new(config: UploaderConfig) -> Self {
        let source = Self::default();
        source.set(config);
        source
    }

    /// Source whose every load fails.
    pub fn broken() -> Self {
        Self::default()
    }

    pub fn set(&self, config: UploaderConfig) {
        *self.current.lock().unwrap() = Some(config);
    }
}

impl ConfigSource for MemoryConfig {
    fn load(&self) -> Result<UploaderConfig, ConfigError> {
        self.current.lock().unwrap().clone().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no configuration",
            ))
        })
    }
}

/// Shared router that counts registrations per pattern.
#[derive(Clone, Default)]
pub struct RecordingRouter {
    pub inner: ParentRouter,
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl RecordingRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self, pattern: &str) -> usize {
        self.counts.lock().unwrap().get(pattern).copied().unwrap_or(0)
    }

    pub fn total_registrations(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    /// Send a GET through the router and return status and body.
    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self.inner.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl SharedRouter for RecordingRouter {
    fn register(&self, pattern: &str, handler: HandlerIndirection) {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(pattern.to_string())
            .or_default() += 1;
        self.inner.register(pattern, handler);
    }
}

pub fn config_with_base(base_path: &str) -> UploaderConfig {
    let mut config = UploaderConfig::default();
    config.server.base_path = base_path.to_string();
    config
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

/// Await `future`, failing the test after five seconds.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
