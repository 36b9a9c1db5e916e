//! Scanned filesystem entries
//!
//! A [`FileEntry`] is the metadata snapshot the scanner hands to the engine
//! for one path. It is not persisted and lives for one decision.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use super::errors::DomainError;

/// Metadata for one scanned path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Full path of the entry
    pub path: PathBuf,
    /// Base name of the entry
    pub name: String,
    /// Base name of the directory containing the entry
    pub parent_name: String,
    /// Filesystem inode number
    pub inode: u64,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl FileEntry {
    /// Build an entry from a path and its `stat` result.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidPath`] if the path has no file name, or
    /// [`DomainError::InvalidTimestamp`] if the platform cannot report a
    /// modification time.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Result<Self, DomainError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DomainError::InvalidPath(path.display().to_string()))?;

        let parent_name = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .map_err(|e| DomainError::InvalidTimestamp {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            name,
            parent_name,
            inode: inode_of(metadata),
            size: metadata.len(),
            modified,
            is_dir: metadata.is_dir(),
        })
    }

    /// Time elapsed since the last modification, as seen at `now`
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.modified)
    }

    /// Whether the entry was last modified strictly before `now - window`
    ///
    /// A window reaching past the earliest representable time is never
    /// exceeded.
    #[must_use]
    pub fn is_older_than(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.checked_sub_signed(window)
            .is_some_and(|threshold| self.modified < threshold)
    }
}

#[cfg(unix)]
fn inode_of(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn inode_of(_metadata: &Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn entry_modified_at(modified: DateTime<Utc>) -> FileEntry {
        FileEntry {
            path: PathBuf::from("/src/app/application.log"),
            name: "application.log".to_string(),
            parent_name: "app".to_string(),
            inode: 100,
            size: 500,
            modified,
            is_dir: false,
        }
    }

    #[test]
    fn test_from_metadata_reads_names_and_size() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("app");
        fs::create_dir(&sub).unwrap();
        let file = sub.join("application.log");
        fs::write(&file, b"hello").unwrap();

        let metadata = fs::metadata(&file).unwrap();
        let entry = FileEntry::from_metadata(&file, &metadata).unwrap();

        assert_eq!(entry.name, "application.log");
        assert_eq!(entry.parent_name, "app");
        assert_eq!(entry.size, 5);
        assert!(!entry.is_dir);
        #[cfg(unix)]
        assert_ne!(entry.inode, 0);
    }

    #[test]
    fn test_from_metadata_directory() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();

        let entry = FileEntry::from_metadata(&sub, &fs::metadata(&sub).unwrap()).unwrap();
        assert!(entry.is_dir);
    }

    #[test]
    fn test_is_older_than_is_strict() {
        let now = Utc::now();
        let window = Duration::hours(3);

        let exactly = entry_modified_at(now - window);
        assert!(!exactly.is_older_than(now, window));

        let one_second_younger = entry_modified_at(now - window + Duration::seconds(1));
        assert!(!one_second_younger.is_older_than(now, window));

        let one_second_older = entry_modified_at(now - window - Duration::seconds(1));
        assert!(one_second_older.is_older_than(now, window));
    }

    #[test]
    fn test_is_older_than_with_unrepresentable_window() {
        let now = Utc::now();
        let ancient = entry_modified_at(DateTime::<Utc>::MIN_UTC);

        assert!(!ancient.is_older_than(now, Duration::MAX));
        assert!(!ancient.is_older_than(now, Duration::seconds(10_i64.pow(13))));
        assert!(ancient.is_older_than(now, Duration::days(365)));
    }

    #[test]
    fn test_age_at() {
        let now = Utc::now();
        let entry = entry_modified_at(now - Duration::minutes(1));
        assert_eq!(entry.age_at(now), Duration::minutes(1));
    }
}
