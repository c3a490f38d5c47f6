//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to [`Intent`]s
//! - Hand intents to the supervisor without ever blocking
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP → [`Intent::Reload`]; SIGINT and SIGTERM → [`Intent::Shutdown`]
//! - One capacity-1 channel per intent kind: a second occurrence of a kind
//!   that has not been consumed yet is dropped, not queued
//! - Listeners live as long as the process; there is no "done"
//! - Anything holding an [`IntentSender`] can stand in for real signals

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A logical control request derived from an OS notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Rebuild the service from freshly loaded configuration.
    Reload,
    /// Drain the service and exit.
    Shutdown,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Reload => write!(f, "reload"),
            Intent::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Outcome of handing an intent to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The intent is waiting for the supervisor.
    Delivered,
    /// An identical intent was already pending; this one was dropped.
    Coalesced,
    /// The supervisor is gone.
    Closed,
}

/// Create a linked sender/receiver pair for intents.
pub fn intent_channel() -> (IntentSender, IntentReceiver) {
    let (reload_tx, reload_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    (
        IntentSender {
            reload: reload_tx,
            shutdown: shutdown_tx,
        },
        IntentReceiver {
            reload: reload_rx,
            shutdown: shutdown_rx,
        },
    )
}

/// Producer side of the intent channels. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IntentSender {
    reload: mpsc::Sender<()>,
    shutdown: mpsc::Sender<()>,
}

impl IntentSender {
    /// Request an intent without blocking.
    pub fn request(&self, intent: Intent) -> Delivery {
        let tx = match intent {
            Intent::Reload => &self.reload,
            Intent::Shutdown => &self.shutdown,
        };
        match tx.try_send(()) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(())) => Delivery::Coalesced,
            Err(TrySendError::Closed(())) => Delivery::Closed,
        }
    }
}

/// Consumer side of the intent channels, owned by the supervisor.
#[derive(Debug)]
pub struct IntentReceiver {
    reload: mpsc::Receiver<()>,
    shutdown: mpsc::Receiver<()>,
}

impl IntentReceiver {
    /// Wait for the next intent of either kind.
    ///
    /// A pending shutdown is returned before a pending reload. Pends forever
    /// once every sender is gone.
    pub async fn next(&mut self) -> Intent {
        let Self { reload, shutdown } = self;
        let mut reload_open = true;
        let mut shutdown_open = true;
        loop {
            tokio::select! {
                biased;
                received = shutdown.recv(), if shutdown_open => match received {
                    Some(()) => return Intent::Shutdown,
                    None => shutdown_open = false,
                },
                received = reload.recv(), if reload_open => match received {
                    Some(()) => return Intent::Reload,
                    None => reload_open = false,
                },
                else => std::future::pending::<()>().await,
            }
        }
    }
}

/// Process signal subscription.
#[derive(Debug, Default)]
pub struct OsSignals;

impl OsSignals {
    /// Subscribe to SIGHUP, SIGINT and SIGTERM and forward them as intents.
    ///
    /// Must be called from within a Tokio runtime. Spawns one listener task
    /// per signal kind.
    #[cfg(unix)]
    pub fn install(self, intents: IntentSender) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let subscriptions = [
            (SignalKind::hangup(), "SIGHUP", Intent::Reload),
            (SignalKind::interrupt(), "SIGINT", Intent::Shutdown),
            (SignalKind::terminate(), "SIGTERM", Intent::Shutdown),
        ];

        for (kind, name, intent) in subscriptions {
            let mut stream = signal(kind)?;
            let intents = intents.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    forward(&intents, name, intent);
                }
            });
        }

        tracing::debug!("Signal handlers installed");
        Ok(())
    }

    /// Only Ctrl+C is available off unix; it maps to shutdown.
    #[cfg(not(unix))]
    pub fn install(self, intents: IntentSender) -> std::io::Result<()> {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                forward(&intents, "ctrl-c", Intent::Shutdown);
            }
        });
        Ok(())
    }
}

fn forward(intents: &IntentSender, signal: &'static str, intent: Intent) {
    match intents.request(intent) {
        Delivery::Delivered => {
            tracing::info!(signal, intent = %intent, "Signal received");
        }
        Delivery::Coalesced => {
            tracing::debug!(signal, intent = %intent, "Signal coalesced with pending intent");
        }
        Delivery::Closed => {
            tracing::debug!(signal, "Signal ignored, supervisor has exited");
        }
    }
}
