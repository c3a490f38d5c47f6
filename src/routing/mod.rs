//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Shared-router mode:
//!     Incoming Request
//!     → router.rs (ParentRouter, longest matching mount)
//!     → indirection.rs (current delegate, admission)
//!     → active instance's axum Router
//!
//! Mount setup (once per prefix, by the supervisor):
//!     base_path
//!     → prefix.rs (normalize, validate)
//!     → register "/prefix" and "/prefix/" → indirection
//! ```
//!
//! # Design Decisions
//! - The shared router never changes on reload; only the indirection's
//!   target does
//! - Deterministic: same path always reaches the same mount

pub mod indirection;
pub mod prefix;
pub mod router;

pub use indirection::{Delegate, HandlerIndirection};
pub use prefix::{mount_patterns, route_prefix, PrefixError, RegisteredPrefixes};
pub use router::{ParentRouter, SharedRouter};
