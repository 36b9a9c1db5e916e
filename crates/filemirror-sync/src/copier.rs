//! Local filesystem copier (secondary/driven adapter)
//!
//! Implements [`IFileCopier`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Append-resume**: the target is opened without truncation and only
//!   the bytes past the resume offset are streamed. Bytes left past the
//!   offset by an earlier failed transfer are cut off first, so a retry
//!   never duplicates data.
//! - **Whole-file**: writes to `<target>.tmp` and renames over the target,
//!   so a failed transfer leaves the previous mirror intact.
//! - Handles are dropped (closed) on every return path.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use anyhow::Context;
use filemirror_core::ports::copier::{CopyMode, CopyStats, IFileCopier};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

// ============================================================================
// FileCopier struct
// ============================================================================

/// Adapter that bridges the [`IFileCopier`] port to the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCopier {
    mode: CopyMode,
}

impl FileCopier {
    /// Create a copier for the given mode.
    #[must_use]
    pub fn new(mode: CopyMode) -> Self {
        Self { mode }
    }

    async fn copy_append(
        &self,
        source: &Path,
        target: &Path,
        resume_offset: u64,
    ) -> anyhow::Result<CopyStats> {
        let mut source_file = File::open(source)
            .await
            .with_context(|| format!("Open source file failed: {}", source.display()))?;

        let mut target_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(target)
            .await
            .with_context(|| format!("Create target file failed: {}", target.display()))?;

        let target_len = target_file
            .metadata()
            .await
            .with_context(|| format!("Stat target file failed: {}", target.display()))?
            .len();

        let offset = if target_len > resume_offset {
            warn!(
                target_len,
                resume_offset, "Target longer than recorded size, truncating before resume"
            );
            target_file
                .set_len(resume_offset)
                .await
                .with_context(|| format!("Truncate target file failed: {}", target.display()))?;
            resume_offset
        } else {
            if target_len < resume_offset {
                warn!(
                    target_len,
                    resume_offset, "Target shorter than recorded size, resuming from target length"
                );
            }
            target_len
        };

        source_file
            .seek(SeekFrom::Start(offset))
            .await
            .with_context(|| format!("Seek({offset}) source file failed"))?;
        target_file
            .seek(SeekFrom::Start(offset))
            .await
            .with_context(|| format!("Seek({offset}) target file failed"))?;

        let bytes_copied = tokio::io::copy(&mut source_file, &mut target_file)
            .await
            .context("Copy file error")?;
        target_file.flush().await.context("Flush target file failed")?;
        target_file
            .sync_data()
            .await
            .context("Sync target file failed")?;

        Ok(CopyStats {
            offset,
            bytes_copied,
        })
    }

    async fn copy_whole(&self, source: &Path, target: &Path) -> anyhow::Result<CopyStats> {
        let tmp_path = temp_path_for(target);

        debug!(?tmp_path, "writing to temporary file");
        let result = write_whole(source, &tmp_path).await;
        let bytes_copied = match result {
            Ok(n) => n,
            Err(err) => {
                discard_temp(&tmp_path).await;
                return Err(err);
            }
        };

        debug!("renaming temporary file to target");
        if let Err(err) = tokio::fs::rename(&tmp_path, target).await {
            discard_temp(&tmp_path).await;
            return Err(err).with_context(|| format!("Rename into {} failed", target.display()));
        }

        Ok(CopyStats {
            offset: 0,
            bytes_copied,
        })
    }
}

/// `<target>.tmp`, in the same directory so the rename stays atomic.
fn temp_path_for(target: &Path) -> PathBuf {
    let mut p = target.as_os_str().to_owned();
    p.push(".tmp");
    PathBuf::from(p)
}

async fn discard_temp(tmp_path: &Path) {
    if let Err(cleanup) = tokio::fs::remove_file(tmp_path).await {
        debug!(?tmp_path, error = %cleanup, "temporary file not removed");
    }
}

async fn write_whole(source: &Path, tmp_path: &Path) -> anyhow::Result<u64> {
    let mut source_file = File::open(source)
        .await
        .with_context(|| format!("Open source file failed: {}", source.display()))?;
    let mut tmp_file = File::create(tmp_path)
        .await
        .with_context(|| format!("Create target file failed: {}", tmp_path.display()))?;

    let n = tokio::io::copy(&mut source_file, &mut tmp_file)
        .await
        .context("Copy file error")?;
    tmp_file.flush().await.context("Flush target file failed")?;
    tmp_file.sync_data().await.context("Sync target file failed")?;
    Ok(n)
}

// ============================================================================
// IFileCopier implementation
// ============================================================================

#[async_trait::async_trait]
impl IFileCopier for FileCopier {
    fn mode(&self) -> CopyMode {
        self.mode
    }

    #[instrument(skip(self, source, target), fields(mode = %self.mode, source = %source.display(), target = %target.display()))]
    async fn copy(
        &self,
        source: &Path,
        target: &Path,
        resume_offset: u64,
    ) -> anyhow::Result<CopyStats> {
        info!("Copy file");

        let stats = match self.mode {
            CopyMode::Append => self.copy_append(source, target, resume_offset).await?,
            CopyMode::WholeFile => self.copy_whole(source, target).await?,
        };

        info!(
            offset = stats.offset,
            n = stats.bytes_copied,
            "Copy stats"
        );
        Ok(stats)
    }

    async fn remove(&self, target: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(target).await
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, data).unwrap();
        p
    }

    // ------------------------------------------------------------------
    // append mode
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_append_creates_missing_target() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "application.log", b"hello world");
        let target = dir.path().join("app@1@application.log");

        let stats = FileCopier::new(CopyMode::Append)
            .copy(&source, &target, 0)
            .await
            .unwrap();

        assert_eq!(stats, CopyStats { offset: 0, bytes_copied: 11 });
        assert_eq!(std::fs::read(&target).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_append_copies_only_delta() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "application.log", b"line1\nline2\n");
        let target = write(&dir, "mirror", b"line1\n");

        let stats = FileCopier::new(CopyMode::Append)
            .copy(&source, &target, 6)
            .await
            .unwrap();

        assert_eq!(stats, CopyStats { offset: 6, bytes_copied: 6 });
        assert_eq!(std::fs::read(&target).unwrap(), b"line1\nline2\n");
    }

    #[tokio::test]
    async fn test_append_truncates_leftover_bytes() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "application.log", b"abcdef");
        // An earlier failed run left "XX" past the recorded 3 bytes.
        let target = write(&dir, "mirror", b"abcXX");

        let stats = FileCopier::new(CopyMode::Append)
            .copy(&source, &target, 3)
            .await
            .unwrap();

        assert_eq!(stats.offset, 3);
        assert_eq!(std::fs::read(&target).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_append_resumes_from_short_target() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "application.log", b"abcdef");
        let target = write(&dir, "mirror", b"ab");

        let stats = FileCopier::new(CopyMode::Append)
            .copy(&source, &target, 4)
            .await
            .unwrap();

        assert_eq!(stats, CopyStats { offset: 2, bytes_copied: 4 });
        assert_eq!(std::fs::read(&target).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_append_missing_source_fails_without_touching_target() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "mirror", b"keep");

        let result = FileCopier::new(CopyMode::Append)
            .copy(&dir.path().join("nope"), &target, 4)
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(&target).unwrap(), b"keep");
    }

    #[tokio::test]
    async fn test_append_missing_target_dir_fails() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "application.log", b"data");

        let result = FileCopier::new(CopyMode::Append)
            .copy(&source, &dir.path().join("no/such/dir/mirror"), 0)
            .await;

        assert!(result.is_err());
    }

    // ------------------------------------------------------------------
    // whole-file mode
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_whole_file_replaces_target() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "application.log", b"new content");
        let target = write(&dir, "mirror", b"old content that is longer");

        let stats = FileCopier::new(CopyMode::WholeFile)
            .copy(&source, &target, 26)
            .await
            .unwrap();

        assert_eq!(stats, CopyStats { offset: 0, bytes_copied: 11 });
        assert_eq!(std::fs::read(&target).unwrap(), b"new content");
        assert!(!temp_path_for(&target).exists());
    }

    #[tokio::test]
    async fn test_whole_file_failure_keeps_old_target() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "mirror", b"previous");

        let result = FileCopier::new(CopyMode::WholeFile)
            .copy(&dir.path().join("missing"), &target, 0)
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(&target).unwrap(), b"previous");
        assert!(!temp_path_for(&target).exists());
    }

    #[tokio::test]
    async fn test_whole_file_rename_failure_removes_temp() {
        let dir = TempDir::new().unwrap();
        let source = write(&dir, "application.log", b"fresh");
        // A non-empty directory on the mirror path cannot be renamed over.
        let target = dir.path().join("mirror");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupant"), b"x").unwrap();

        let result = FileCopier::new(CopyMode::WholeFile)
            .copy(&source, &target, 0)
            .await;

        assert!(result.is_err());
        assert!(!temp_path_for(&target).exists());
        assert!(target.join("occupant").exists());
    }

    #[tokio::test]
    async fn test_remove_deletes_mirror() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "app@1@application.log", b"old");

        FileCopier::default().remove(&target).await.unwrap();
        assert!(!target.exists());

        let err = FileCopier::default().remove(&target).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_temp_path_for() {
        assert_eq!(
            temp_path_for(Path::new("/t/app@1@application.log")),
            PathBuf::from("/t/app@1@application.log.tmp")
        );
    }

    #[test]
    fn test_mode_reported() {
        assert_eq!(FileCopier::new(CopyMode::WholeFile).mode(), CopyMode::WholeFile);
        assert_eq!(FileCopier::default().mode(), CopyMode::Append);
    }
}
