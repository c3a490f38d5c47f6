//! Supervised file upload service.
//!
//! A reload/shutdown supervisor keeps exactly one upload service instance
//! accepting work at a time. A reload builds a fresh instance from freshly
//! loaded configuration and lets the previous one finish its in-flight
//! requests in the background; a shutdown drains the current instance and
//! returns.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::UploaderConfig;
pub use http::{UploadServer, UploadServerFactory};
pub use lifecycle::{Intent, Supervisor, SupervisorError};
pub use routing::{HandlerIndirection, ParentRouter, SharedRouter};
