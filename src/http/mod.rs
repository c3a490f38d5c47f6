//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Request (standalone listener or shared router indirection)
//!     → Delegate admission (net::connection)
//!     → server.rs (middleware: request ID, trace, timeout, body limit)
//!     → upload.rs (store / fetch / health)
//!     → response.rs (errors → status codes)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upload;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::UploadError;
pub use server::{UploadServer, UploadServerFactory};
