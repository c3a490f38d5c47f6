//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Standalone instance starting
//!     → listener.rs (bind, retry while the old instance lets go)
//!     → axum serve loop
//!
//! Every request, either mode
//!     → connection.rs (admission + in-flight count)
//!     → instance router
//! ```
//!
//! # Design Decisions
//! - Admission is per instance; a mounted instance that drains refuses new
//!   work while finishing what it already accepted
//! - A standalone instance drains through the server's graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{InFlightGuard, InFlightTracker};
pub use listener::{bind_with_retry, ListenerError};
