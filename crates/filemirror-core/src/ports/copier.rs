//! File copier port (driven/secondary port)
//!
//! This module defines the interface for moving bytes from one source file
//! into its mirror in the target directory, and for removing stale mirrors.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transfer errors are adapter-specific.
//! - An `Err` means the transfer did not complete. Callers must not record
//!   the new size for that file.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

// ============================================================================
// CopyMode
// ============================================================================

/// How a grown file is brought up to date in the target directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Append only the bytes past the recorded size
    #[default]
    Append,
    /// Replace the target with the full current content
    WholeFile,
}

impl Display for CopyMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::WholeFile => write!(f, "whole_file"),
        }
    }
}

impl FromStr for CopyMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(Self::Append),
            "whole_file" => Ok(Self::WholeFile),
            other => Err(DomainError::UnknownVariant {
                kind: "copy mode",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// CopyStats
// ============================================================================

/// Outcome of a completed transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Byte offset in the source where the transfer started
    pub offset: u64,
    /// Number of bytes written to the target
    pub bytes_copied: u64,
}

// ============================================================================
// IFileCopier trait
// ============================================================================

/// Port trait for the byte transfer of one file
///
/// ## Implementation Notes
///
/// - `resume_offset` is only meaningful in [`CopyMode::Append`]; whole-file
///   implementations ignore it.
/// - File handles must be released before the method returns, on success
///   and on every error path.
#[async_trait::async_trait]
pub trait IFileCopier: Send + Sync {
    /// The copy mode this copier implements
    fn mode(&self) -> CopyMode;

    /// Transfers `source` into `target`, starting at `resume_offset`
    ///
    /// # Arguments
    /// * `source` - Path of the file being mirrored
    /// * `target` - Path of the mirror file (created if absent)
    /// * `resume_offset` - Number of bytes the target already holds
    ///
    /// # Errors
    /// Returns an error if opening, seeking or transferring fails. The caller
    /// treats the transfer as not having happened.
    async fn copy(
        &self,
        source: &Path,
        target: &Path,
        resume_offset: u64,
    ) -> anyhow::Result<CopyStats>;

    /// Removes a stale mirror from the target directory
    ///
    /// # Errors
    /// Returns the underlying I/O error; the mirror must be considered
    /// still present.
    async fn remove(&self, target: &Path) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_mode_default_is_append() {
        assert_eq!(CopyMode::default(), CopyMode::Append);
    }

    #[test]
    fn test_copy_mode_roundtrip_str() {
        for mode in [CopyMode::Append, CopyMode::WholeFile] {
            assert_eq!(mode.to_string().parse::<CopyMode>().unwrap(), mode);
        }
        assert!("truncate".parse::<CopyMode>().is_err());
    }
}
