//! Domain error types
//!
//! This module defines error types raised while turning raw filesystem
//! metadata and configuration values into domain types.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Path has no usable file name or parent component
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Identity key is empty or contains a path separator
    #[error("Invalid identity key: {0}")]
    InvalidKey(String),

    /// Modification time could not be represented
    #[error("Invalid timestamp for {path}: {reason}")]
    InvalidTimestamp {
        /// The path whose metadata was being read
        path: String,
        /// Why the conversion failed
        reason: String,
    },

    /// Unknown enumeration value in configuration
    #[error("Unknown {kind}: {value}")]
    UnknownVariant {
        /// The kind of value, e.g. `copy mode`
        kind: &'static str,
        /// The offending input
        value: String,
    },
}
