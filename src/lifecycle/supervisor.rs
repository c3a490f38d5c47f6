//! The reload/shutdown supervisor.
//!
//! # State Machine
//! ```text
//!            ┌──────────────── closed by request ───────────────┐
//!            ▼                                                  │
//!   ──▶ Starting ──started──▶ Running ──reload──▶ Draining(old) │
//!            ▲                  │  │                  │         │
//!            │                  │  └──────────────────┼─────────┘
//!            └──────────────────┼─────────────────────┘
//!                               │ (new instance built; old drains in background)
//!                               ▼
//!                   shutdown: drain current ──▶ Stopped
//! ```
//!
//! Every iteration reloads the configuration, builds a new instance, and (in
//! shared-router mode) points the indirection at it. Failures of the running
//! instance arrive on a per-iteration channel; [`Supervisor::on_fault`] is the
//! only place that decides whether a failure restarts the loop or ends it.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{ConfigSource, ReloadConfig, UploaderConfig};
use crate::lifecycle::instance::{InstanceError, InstanceFactory, RunMode, ServiceInstance};
use crate::lifecycle::shutdown::{drain, DrainOutcome, DrainTracker};
use crate::lifecycle::signals::{Intent, IntentReceiver};
use crate::routing::{
    mount_patterns, route_prefix, HandlerIndirection, PrefixError, RegisteredPrefixes, SharedRouter,
};

/// Conditions that end the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The configured base path cannot be mounted on the shared router.
    #[error("invalid base path: {0}")]
    InvalidBasePath(#[source] PrefixError),

    /// The running instance failed for a reason other than a requested close.
    #[error("error running upload server: {0}")]
    Instance(#[source] InstanceError),
}

/// Something went wrong below the supervisor.
#[derive(Debug)]
pub enum Fault {
    Instance(InstanceError),
    InvalidBasePath(PrefixError),
}

/// What the supervisor does about a [`Fault`].
#[derive(Debug)]
pub enum Verdict {
    /// Build a new instance and carry on.
    Restart,
    /// Stop supervising; the process should exit abnormally.
    Fatal(SupervisorError),
}

/// A running (or draining) instance and what the supervisor knows about it.
struct Generation<I> {
    number: u64,
    instance: Arc<I>,
    config: UploaderConfig,
    failures: mpsc::Receiver<InstanceError>,
}

enum SupervisorState<I> {
    Starting,
    Running(Generation<I>),
    /// Superseded by a reload; drains once its replacement is installed.
    Draining(Generation<I>),
    Stopped,
}

enum Event {
    Failed(InstanceError),
    Reload,
    Shutdown,
}

/// Shared-router bookkeeping.
struct Mount {
    router: Arc<dyn SharedRouter>,
    indirection: HandlerIndirection,
    registered: RegisteredPrefixes,
}

impl Mount {
    fn ensure_registered(&mut self, prefix: &str) {
        if !self.registered.insert(prefix) {
            return;
        }
        for pattern in mount_patterns(prefix) {
            self.router.register(&pattern, self.indirection.clone());
        }
        tracing::info!(
            event = "startup",
            route_prefix = %prefix,
            "Upload handler mounted on shared router"
        );
    }
}

/// Owns the restart loop of the upload service.
pub struct Supervisor<F, C> {
    factory: F,
    config: C,
    mount: Option<Mount>,
    drains: DrainTracker,
    reload: ReloadConfig,
    generation: u64,
}

impl<F, C> Supervisor<F, C>
where
    F: InstanceFactory,
    C: ConfigSource,
{
    /// Supervisor whose instances bind their own listen address.
    pub fn standalone(factory: F, config: C) -> Self {
        Self {
            factory,
            config,
            mount: None,
            drains: DrainTracker::new(),
            reload: ReloadConfig::default(),
            generation: 0,
        }
    }

    /// Supervisor whose instances are reached through `router`.
    pub fn shared(factory: F, config: C, router: Arc<dyn SharedRouter>) -> Self {
        let mut supervisor = Self::standalone(factory, config);
        supervisor.mount = Some(Mount {
            router,
            indirection: HandlerIndirection::new(),
            registered: RegisteredPrefixes::new(),
        });
        supervisor
    }

    /// The indirection mounted on the shared router, in shared-router mode.
    pub fn indirection(&self) -> Option<HandlerIndirection> {
        self.mount.as_ref().map(|m| m.indirection.clone())
    }

    fn mode(&self) -> RunMode {
        if self.mount.is_some() {
            RunMode::Mounted
        } else {
            RunMode::Standalone
        }
    }

    /// Run until a shutdown intent has been handled or a fatal fault occurs.
    pub async fn run(mut self, mut intents: IntentReceiver) -> Result<(), SupervisorError> {
        let mut state = SupervisorState::Starting;
        loop {
            state = match state {
                SupervisorState::Starting => self.start(None).await?,
                SupervisorState::Draining(old) => self.start(Some(old)).await?,
                SupervisorState::Running(current) => self.watch(current, &mut intents).await?,
                SupervisorState::Stopped => break,
            };
        }
        self.finish().await;
        Ok(())
    }

    /// Single decision point for recoverable vs fatal faults.
    pub fn on_fault(&self, fault: Fault) -> Verdict {
        match fault {
            Fault::Instance(InstanceError::Closed) => {
                tracing::info!(generation = self.generation, "Instance closed by request, restarting");
                Verdict::Restart
            }
            Fault::Instance(err) => {
                tracing::error!(generation = self.generation, error = %err, "Error running upload server");
                Verdict::Fatal(SupervisorError::Instance(err))
            }
            Fault::InvalidBasePath(err) => {
                tracing::error!(error = %err, "Cannot mount upload handler");
                Verdict::Fatal(SupervisorError::InvalidBasePath(err))
            }
        }
    }

    fn resolve(&self, fault: Fault) -> Result<SupervisorState<F::Instance>, SupervisorError> {
        match self.on_fault(fault) {
            Verdict::Restart => Ok(SupervisorState::Starting),
            Verdict::Fatal(err) => Err(err),
        }
    }

    async fn start(
        &mut self,
        superseded: Option<Generation<F::Instance>>,
    ) -> Result<SupervisorState<F::Instance>, SupervisorError> {
        self.generation += 1;
        let number = self.generation;

        let config = match self.config.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(generation = number, error = %e, "Failed to load config, using defaults");
                UploaderConfig::default()
            }
        };
        self.reload = config.reload.clone();

        if let Some(mount) = self.mount.as_mut() {
            match route_prefix(&config.server.base_path) {
                Ok(prefix) => mount.ensure_registered(&prefix),
                Err(e) => return self.resolve(Fault::InvalidBasePath(e)),
            }
        }

        let mode = self.mode();
        let instance = self.factory.build(number, &config, mode);

        // New requests must have somewhere to go before the old instance
        // stops admitting them.
        if let Some(mount) = &self.mount {
            mount.indirection.swap(instance.handler());
        }
        if let Some(old) = superseded {
            self.retire(old);
        }

        let failures = launch(instance.clone());
        let mut current = Generation {
            number,
            instance,
            config,
            failures,
        };

        let early_failure = tokio::select! {
            biased;
            failure = next_failure(&mut current.failures) => Some(failure),
            () = current.instance.started() => None,
        };
        if let Some(failure) = early_failure {
            return self.resolve(Fault::Instance(failure));
        }

        metrics::counter!("uploader_instances_started_total").increment(1);
        match mode {
            RunMode::Standalone => tracing::info!(
                event = "startup",
                generation = number,
                address = %current.instance.describe(),
                "Server listening"
            ),
            RunMode::Mounted => tracing::debug!(
                generation = number,
                mount = %current.instance.describe(),
                "Instance serving behind shared router"
            ),
        }

        Ok(SupervisorState::Running(current))
    }

    async fn watch(
        &mut self,
        mut current: Generation<F::Instance>,
        intents: &mut IntentReceiver,
    ) -> Result<SupervisorState<F::Instance>, SupervisorError> {
        let event = tokio::select! {
            biased;
            failure = next_failure(&mut current.failures) => Event::Failed(failure),
            intent = intents.next() => match intent {
                Intent::Shutdown => Event::Shutdown,
                Intent::Reload => Event::Reload,
            },
        };

        match event {
            Event::Failed(failure) => self.resolve(Fault::Instance(failure)),
            Event::Reload => {
                tracing::info!(
                    event = "config_reload",
                    generation = current.number,
                    "Reloading server config"
                );
                metrics::counter!("uploader_reloads_total").increment(1);
                Ok(SupervisorState::Draining(current))
            }
            Event::Shutdown => {
                tracing::info!(
                    event = "shutdown_started",
                    generation = current.number,
                    "Shutdown initiated. Handling existing requests"
                );
                let deadline = current.config.server.drain_timeout();
                if let DrainOutcome::TimedOut(limit) = drain(&*current.instance, deadline).await {
                    tracing::warn!(
                        generation = current.number,
                        timeout = ?limit,
                        "Drain deadline expired, abandoning in-flight requests"
                    );
                }
                Ok(SupervisorState::Stopped)
            }
        }
    }

    fn retire(&self, old: Generation<F::Instance>) {
        let deadline = old.config.server.drain_timeout();
        self.drains.spawn(old.number, old.instance, deadline);
    }

    async fn finish(&self) {
        let pending = self.drains.pending();
        if self.reload.await_reload_drains {
            if pending > 0 {
                tracing::info!(pending, "Waiting for superseded instances to drain");
            }
            self.drains.wait().await;
        } else if pending > 0 {
            tracing::warn!(pending, "Exiting while superseded instances are still draining");
        }
        tracing::info!(event = "shutdown", "Shutdown complete");
    }
}

/// Run `instance` on its own task and funnel any failure into a channel.
fn launch<I: ServiceInstance>(instance: Arc<I>) -> mpsc::Receiver<InstanceError> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let outcome = tokio::spawn(async move { instance.run().await }).await;
        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(e) => InstanceError::Panicked(e.to_string()),
        };
        // Nobody listens once the instance has been superseded or stopped.
        let _ = tx.send(failure).await;
    });
    rx
}

/// Next failure of an instance. Pends forever if its task ended quietly.
async fn next_failure(failures: &mut mpsc::Receiver<InstanceError>) -> InstanceError {
    match failures.recv().await {
        Some(failure) => failure,
        None => std::future::pending().await,
    }
}
