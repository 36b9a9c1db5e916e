//! Filemirror Sync - Poll-based mirroring engine
//!
//! Provides:
//! - Lazy directory traversal with per-phase error policy
//! - A concurrent in-memory record of what has been mirrored
//! - Append-resume and whole-file copy strategies
//! - The scan, copy and delete cycle and the tick loop that drives it
//!
//! ## Modules
//!
//! - [`engine`] - Sync engine running one scan/copy/delete cycle
//! - [`scanner`] - Depth-first tree scanner yielding [`FileEntry`](filemirror_core::domain::FileEntry)s
//! - [`state`] - State map of identity key to mirrored size, plus refresh policy
//! - [`copier`] - Local filesystem copier (append-resume, whole-file)
//! - [`scheduler`] - Fixed-tick cycle loop with cooperative shutdown

pub mod copier;
pub mod engine;
pub mod scanner;
pub mod scheduler;
pub mod state;

use std::path::PathBuf;

use thiserror::Error;

pub use scanner::ScanError;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A directory walk failed
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// A stale mirror could not be removed
    #[error("Failed to remove {}: {source}", path.display())]
    Remove {
        /// The file that was being removed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
