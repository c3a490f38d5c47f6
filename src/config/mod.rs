//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → UploaderConfig (validated, immutable)
//!     → handed to exactly one service instance
//!
//! On reload (SIGHUP, or watcher.rs when enabled):
//!     supervisor starts a new iteration
//!     → loader.rs loads the file again
//!     → a fresh instance is built from the new snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new instance
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, ConfigSource, FileConfig};
pub use schema::{LogFormat, ObservabilityConfig, ReloadConfig, ServerConfig, StorageConfig, UploaderConfig};
