//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor and instances produce:
//!     → logging.rs (structured log events; lifecycle events carry `event`)
//!     → metrics.rs (counters, gauges)
//!
//! Lifecycle events:
//!     startup, config_reload, shutdown_started, shutdown
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through the HTTP layers
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use self::metrics::init_metrics;
