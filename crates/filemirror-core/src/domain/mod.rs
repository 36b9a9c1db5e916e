//! Domain entities and business rules
//!
//! This module contains the core domain types for filemirror:
//! - Identity keys and the schemes that derive them
//! - Scanned filesystem entries
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod identity;

// Re-export commonly used types
pub use entry::FileEntry;
pub use errors::DomainError;
pub use identity::{IdentityKey, KeyScheme, KEY_SEPARATOR};
