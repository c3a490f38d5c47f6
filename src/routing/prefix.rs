//! Route prefix derivation and registration bookkeeping.
//!
//! # Responsibilities
//! - Turn a configured base path into the prefix mounted on a shared router
//! - Remember which prefixes were registered, for the life of the process
//!
//! # Design Decisions
//! - A trailing `/` is dropped (except for the root) so `/upload` and
//!   `/upload/` name the same mount
//! - Shared router registrations cannot be undone, so the set only grows

use std::collections::HashSet;

use thiserror::Error;

/// Why a base path cannot be mounted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefixError {
    #[error("base path is empty")]
    Empty,

    #[error("base path {0:?} must start with '/'")]
    NotAbsolute(String),

    #[error("base path {path:?} contains forbidden character {ch:?}")]
    ForbiddenChar { path: String, ch: char },

    #[error("base path {0:?} contains an empty, '.' or '..' segment")]
    BadSegment(String),
}

/// Derive the route prefix for `base_path`.
pub fn route_prefix(base_path: &str) -> Result<String, PrefixError> {
    let path = base_path.trim();
    if path.is_empty() {
        return Err(PrefixError::Empty);
    }
    if !path.starts_with('/') {
        return Err(PrefixError::NotAbsolute(path.to_string()));
    }
    if let Some(ch) = path
        .chars()
        .find(|c| matches!(c, '?' | '#' | '*' | '{' | '}') || c.is_control())
    {
        return Err(PrefixError::ForbiddenChar {
            path: path.to_string(),
            ch,
        });
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok("/".to_string());
    }

    let bad_segment = trimmed
        .split('/')
        .skip(1)
        .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad_segment {
        return Err(PrefixError::BadSegment(path.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Patterns a prefix is mounted under: the prefix itself and its subtree.
pub fn mount_patterns(prefix: &str) -> Vec<String> {
    if prefix.ends_with('/') {
        vec![prefix.to_string()]
    } else {
        vec![prefix.to_string(), format!("{prefix}/")]
    }
}

/// Prefixes already registered on a shared router.
#[derive(Debug, Default)]
pub struct RegisteredPrefixes {
    prefixes: HashSet<String>,
}

impl RegisteredPrefixes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `prefix`. Returns `true` only the first time it is seen.
    pub fn insert(&mut self, prefix: &str) -> bool {
        self.prefixes.insert(prefix.to_string())
    }
}
