//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Instance rebinding its listen address during a reload:
//!     → bind fails with AddrInUse (previous instance still releasing it)
//!     → backoff.rs (exponential delay with jitter)
//!     → retry until bound or attempts exhausted
//! ```

pub mod backoff;
