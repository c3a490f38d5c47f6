//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGHUP → Intent::Reload
//!     SIGTERM/SIGINT → Intent::Shutdown
//!
//! Supervisor (supervisor.rs):
//!     load config → mount/swap handler → run instance (instance.rs)
//!     → wait for started (startup.rs)
//!     → wait for failure | reload | shutdown
//!
//! Drains (shutdown.rs):
//!     reload → old instance drains in the background (tracked)
//!     shutdown → current instance drains in the foreground → exit
//! ```
//!
//! # Design Decisions
//! - A reload never waits for the old instance; the new one serves first
//! - Drains may carry a deadline; without one they wait indefinitely
//! - Only the supervisor decides whether a failure is fatal

pub mod instance;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use instance::{InstanceError, InstanceFactory, RunMode, ServiceInstance};
pub use shutdown::{drain, DrainOutcome, DrainTracker};
pub use signals::{intent_channel, Delivery, Intent, IntentReceiver, IntentSender, OsSignals};
pub use startup::Latch;
pub use supervisor::{Fault, Supervisor, SupervisorError, Verdict};
