//! Tree scanner
//!
//! [`TreeScanner`] walks a directory tree depth-first, pre-order, in file
//! name order, and lazily yields one [`FileEntry`] per non-directory path.
//! Directories are descended into but never yielded. [`TreeScanner::flat`]
//! stops at the root's direct children.
//!
//! Failures are yielded as [`ScanError`] items rather than ending the
//! iteration, so each consumer picks its own [`ScanPolicy`]:
//!
//! ```text
//! survey / copy phases  -> Lenient: root failure aborts, entry failure skipped
//! delete phase          -> Strict:  any failure aborts
//! ```

use std::path::{Path, PathBuf};

use filemirror_core::domain::{DomainError, FileEntry};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

// ============================================================================
// ScanError
// ============================================================================

/// A failure encountered while walking a tree
#[derive(Debug, Error)]
pub enum ScanError {
    /// Reading a directory or stating an entry failed
    #[error("walk failed at {} (depth {depth}): {source}", path.display())]
    Walk {
        path: PathBuf,
        depth: usize,
        #[source]
        source: walkdir::Error,
    },

    /// The entry's metadata could not be turned into a [`FileEntry`]
    #[error("unusable entry {} (depth {depth}): {source}", path.display())]
    Entry {
        path: PathBuf,
        depth: usize,
        #[source]
        source: DomainError,
    },
}

impl ScanError {
    /// Path the failure relates to
    pub fn path(&self) -> &Path {
        match self {
            Self::Walk { path, .. } | Self::Entry { path, .. } => path,
        }
    }

    /// Depth below the scan root (0 is the root itself)
    pub fn depth(&self) -> usize {
        match self {
            Self::Walk { depth, .. } | Self::Entry { depth, .. } => *depth,
        }
    }

    /// Whether the scan root itself could not be read
    pub fn is_root(&self) -> bool {
        self.depth() == 0
    }
}

// ============================================================================
// ScanPolicy
// ============================================================================

/// How a phase reacts to a [`ScanError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Abort on root failures; log and skip anything deeper
    Lenient,
    /// Abort on any failure
    Strict,
}

impl ScanPolicy {
    /// Apply the policy: `Ok` means skip the entry and keep walking.
    ///
    /// # Errors
    /// Returns the error back when the phase must abort.
    pub fn handle(self, err: ScanError) -> Result<(), ScanError> {
        match self {
            Self::Lenient if !err.is_root() => {
                warn!(path = %err.path().display(), error = %err, "Skipping unreadable entry");
                Ok(())
            }
            _ => Err(err),
        }
    }
}

// ============================================================================
// TreeScanner
// ============================================================================

/// Lazy depth-first iterator over the files under a root directory.
///
/// Finite and not restartable: create a new scanner for each pass.
pub struct TreeScanner {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl TreeScanner {
    /// Start a scan of `root`. Nothing touches the disk until the first
    /// call to `next`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let inner = WalkDir::new(&root).sort_by_file_name().into_iter();
        Self { root, inner }
    }

    /// Scan only the direct children of `root`, for flat directories such
    /// as the mirror target.
    pub fn flat(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let inner = WalkDir::new(&root)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter();
        Self { root, inner }
    }

    /// The directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for TreeScanner {
    type Item = Result<FileEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dent = match self.inner.next()? {
                Ok(dent) => dent,
                Err(source) => {
                    let path = source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(ScanError::Walk {
                        path,
                        depth: source.depth(),
                        source,
                    }));
                }
            };

            if dent.file_type().is_dir() {
                continue;
            }

            let depth = dent.depth();
            let metadata = match dent.metadata() {
                Ok(metadata) => metadata,
                Err(source) => {
                    return Some(Err(ScanError::Walk {
                        path: dent.into_path(),
                        depth,
                        source,
                    }))
                }
            };

            return Some(
                FileEntry::from_metadata(dent.path(), &metadata).map_err(|source| {
                    ScanError::Entry {
                        path: dent.path().to_path_buf(),
                        depth,
                        source,
                    }
                }),
            );
        }
    }
}
