//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limit > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: UploaderConfig → Result<(), Vec<ValidationError>>
//! - Base path is not checked here; the supervisor derives the route prefix
//!   and reports a bad one as fatal in shared-router mode

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::UploaderConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.listen_address {0:?} is not a socket address")]
    ListenAddress(String),

    #[error("server.max_upload_bytes must be greater than zero")]
    ZeroUploadLimit,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check a deserialized configuration for semantic errors.
pub fn validate_config(config: &UploaderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.listen_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::ListenAddress(
            config.server.listen_address.clone(),
        ));
    }

    if config.server.max_upload_bytes == 0 {
        errors.push(ValidationError::ZeroUploadLimit);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
