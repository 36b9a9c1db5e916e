//! Mirroring sync engine
//!
//! The [`SyncEngine`] runs one synchronization cycle over a source tree and
//! a flat target directory.
//!
//! ## Cycle Flow
//!
//! 1. **Refresh** (per [`RefreshPolicy`]): clear the [`StateMap`] and rebuild
//!    it from the files already in the target directory
//! 2. **Copy**: scan the source tree, derive each file's [`IdentityKey`],
//!    decide with [`decide_copy`] and copy new or grown files
//! 3. **Delete**: scan the target directory and remove mirrors idle for
//!    longer than the delete window, decided by [`decide_delete`]
//!
//! A phase that cannot walk its root ends the cycle; the next tick starts
//! over. Individual copy failures are logged and leave the state map
//! untouched so the same file is retried on the next cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use filemirror_core::config::Config;
use filemirror_core::domain::{FileEntry, IdentityKey, KeyScheme};
use filemirror_core::ports::copier::{CopyMode, IFileCopier};
use tracing::{debug, error, info, warn};

use crate::scanner::{ScanError, ScanPolicy, TreeScanner};
use crate::state::{RefreshPolicy, StateMap};
use crate::SyncError;

// ============================================================================
// EngineSettings
// ============================================================================

/// Settings the engine needs, derived from [`Config`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Directory tree scanned for files to mirror
    pub source_dir: PathBuf,
    /// Flat directory holding the mirrors; also the state source
    pub target_dir: PathBuf,
    /// Identity-key prefixes a source file must match (empty admits all)
    pub key_prefixes: Vec<String>,
    /// Exact base name of mirrored files
    pub target_file_name: String,
    /// Maximum idle time of a first-seen file for it to be copied
    pub copy_expire: Option<Duration>,
    /// Minimum idle time of a mirror before it is deleted
    pub delete_expire: Duration,
    /// How identity keys are derived
    pub key_scheme: KeyScheme,
}

impl EngineSettings {
    /// Build settings from the `sync` section of the configuration
    pub fn from_config(config: &Config) -> Self {
        let sync = &config.sync;
        Self {
            source_dir: sync.source_dir.clone(),
            target_dir: sync.target_dir.clone(),
            key_prefixes: sync.key_prefixes.clone(),
            target_file_name: sync.target_file_name.clone(),
            copy_expire: sync.copy_expire_secs.map(window_from_secs),
            delete_expire: window_from_secs(sync.delete_expire_secs),
            key_scheme: sync.key_scheme,
        }
    }

    /// Identity key for a source entry under the configured scheme
    pub fn key_for(&self, entry: &FileEntry) -> IdentityKey {
        self.key_scheme
            .key_for(&entry.parent_name, entry.inode, &self.target_file_name)
    }

    /// Whether a target-side file name follows the mirror naming convention
    pub fn is_managed_name(&self, name: &str) -> bool {
        name.ends_with(&self.target_file_name)
    }
}

/// Seconds as a chrono window, saturating at [`Duration::MAX`].
fn window_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

// ============================================================================
// Decisions
// ============================================================================

/// What to do with one source entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDecision {
    /// Untracked file with the exact target name: copy it whole
    New,
    /// Tracked file that grew: copy from the recorded size
    Grown { from: u64, to: u64 },
    /// Tracked file that shrank: leave it alone and report it
    Shrunk { recorded: u64, current: u64 },
    /// Tracked file with the recorded size
    Unchanged,
    /// Untracked candidate idle for longer than the copy window
    Expired,
    /// Untracked file whose name is not the target name
    NotCandidate,
}

impl CopyDecision {
    /// Whether the decision requires a transfer
    pub fn should_copy(self) -> bool {
        matches!(self, Self::New | Self::Grown { .. })
    }

    /// Offset to resume from for the given copy mode
    pub fn resume_offset(self, mode: CopyMode) -> u64 {
        match (self, mode) {
            (Self::Grown { from, .. }, CopyMode::Append) => from,
            _ => 0,
        }
    }
}

/// Decide whether a source entry must be copied.
///
/// Size is the only change signal: an equal size is a no-op even when the
/// modification time moved. The age filter only applies to untracked files.
pub fn decide_copy(
    entry: &FileEntry,
    recorded: Option<u64>,
    settings: &EngineSettings,
    now: DateTime<Utc>,
) -> CopyDecision {
    match recorded {
        Some(recorded) if entry.size > recorded => CopyDecision::Grown {
            from: recorded,
            to: entry.size,
        },
        Some(recorded) if entry.size < recorded => CopyDecision::Shrunk {
            recorded,
            current: entry.size,
        },
        Some(_) => CopyDecision::Unchanged,
        None if entry.name == settings.target_file_name => match settings.copy_expire {
            Some(window) if entry.is_older_than(now, window) => CopyDecision::Expired,
            _ => CopyDecision::New,
        },
        None => CopyDecision::NotCandidate,
    }
}

/// What to do with one target-side entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDecision {
    /// Idle past the delete window and follows the naming convention
    Delete,
    /// Modified within the delete window
    TooYoung,
    /// Not a mirror this engine manages
    NotManaged,
}

/// Decide whether a target-side entry must be deleted.
///
/// Age is checked first: anything inside the window is never looked at
/// further. The age comparison is strict.
pub fn decide_delete(
    entry: &FileEntry,
    settings: &EngineSettings,
    now: DateTime<Utc>,
) -> DeleteDecision {
    if !entry.is_older_than(now, settings.delete_expire) {
        return DeleteDecision::TooYoung;
    }
    if entry.is_dir || !settings.is_managed_name(&entry.name) {
        return DeleteDecision::NotManaged;
    }
    DeleteDecision::Delete
}

// ============================================================================
// CycleResult
// ============================================================================

/// Summary of one synchronization cycle
#[derive(Debug, Clone, Default)]
pub struct CycleResult {
    /// Whether the state map was rebuilt this cycle
    pub state_refreshed: bool,
    /// Number of completed transfers
    pub files_copied: u32,
    /// Bytes written across all transfers
    pub bytes_copied: u64,
    /// Number of mirrors removed
    pub files_deleted: u32,
    /// Tracked files found smaller than recorded
    pub anomalies: u32,
    /// First-seen files skipped for being too old
    pub skipped_expired: u32,
    /// Non-fatal and phase-aborting errors, in order
    pub errors: Vec<String>,
    /// Wall-clock duration of the cycle in milliseconds
    pub duration_ms: u64,
}

impl CycleResult {
    /// Whether the cycle made any change on disk
    pub fn is_noop(&self) -> bool {
        self.files_copied == 0 && self.files_deleted == 0
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Poll-based mirroring engine
///
/// ## Dependencies
///
/// - `state`: shared record of mirrored sizes, owned by the caller
/// - `copier`: byte transfer (append-resume or whole-file)
/// - `refresh`: when to rebuild `state` from the target directory
pub struct SyncEngine {
    settings: EngineSettings,
    state: Arc<StateMap>,
    copier: Arc<dyn IFileCopier + Send + Sync>,
    refresh: RefreshPolicy,
}

impl SyncEngine {
    /// Creates a new `SyncEngine`
    ///
    /// # Arguments
    /// * `settings` - Directories, windows and naming rules
    /// * `state` - State map shared with any observers
    /// * `copier` - Byte transfer implementation
    /// * `refresh` - State map rebuild cadence
    pub fn new(
        settings: EngineSettings,
        state: Arc<StateMap>,
        copier: Arc<dyn IFileCopier + Send + Sync>,
        refresh: RefreshPolicy,
    ) -> Self {
        Self {
            settings,
            state,
            copier,
            refresh,
        }
    }

    /// The engine's settings
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The shared state map
    pub fn state(&self) -> &Arc<StateMap> {
        &self.state
    }

    /// Runs one cycle against the current wall clock
    pub async fn run_cycle(&mut self) -> CycleResult {
        self.run_cycle_at(Utc::now()).await
    }

    /// Runs one cycle, judging file ages against `now`
    ///
    /// Never fails: a phase that aborts is logged and recorded in
    /// [`CycleResult::errors`], and the remaining phases are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleResult {
        let start = Instant::now();
        let mut result = CycleResult::default();

        info!("Run sync...");

        if let Err(err) = self.run_phases(now, &mut result).await {
            let msg = format!("{err:#}");
            error!(error = %msg, "Sync cycle aborted");
            result.errors.push(msg);
        }

        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            copied = result.files_copied,
            bytes = result.bytes_copied,
            deleted = result.files_deleted,
            anomalies = result.anomalies,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "Run end"
        );

        result
    }

    async fn run_phases(&mut self, now: DateTime<Utc>, result: &mut CycleResult) -> Result<()> {
        result.state_refreshed = self
            .refresh_state(Instant::now())
            .context("Get target file failed")?;

        self.copy_phase(now, result)
            .await
            .context("Copy source file failed")?;

        self.delete_phase(now, result)
            .await
            .context("Delete target file failed")?;

        Ok(())
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Rebuilds the state map if the refresh policy says it is due
    ///
    /// # Returns
    /// `true` if the map was rebuilt
    ///
    /// # Errors
    /// Returns an error if the target directory cannot be walked. The
    /// policy is not marked, so the next cycle tries again.
    pub fn refresh_state(&mut self, now: Instant) -> Result<bool, SyncError> {
        if !self.refresh.is_due(now) {
            debug!(tracked = self.state.len(), "Using cached state map");
            return Ok(false);
        }

        let loaded = self.rebuild_state()?;
        self.refresh.mark_refreshed(now);
        debug!(loaded, "State map rebuilt from target directory");
        Ok(true)
    }

    /// Clears the state map and repopulates it from the target directory
    ///
    /// Every file whose name ends with the target file name is recorded
    /// under its own file name with its current size.
    pub fn rebuild_state(&self) -> Result<usize, SyncError> {
        self.state.clear();

        for item in TreeScanner::flat(&self.settings.target_dir) {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    ScanPolicy::Lenient.handle(err)?;
                    continue;
                }
            };

            if !self.settings.is_managed_name(&entry.name) {
                continue;
            }

            match IdentityKey::from_file_name(entry.name.clone()) {
                Ok(key) => self.state.record(key, entry.size),
                Err(err) => warn!(path = %entry.path.display(), error = %err, "Ignoring target file"),
            }
        }

        for (key, size) in self.state.snapshot() {
            debug!(key = %key, size, "Load target file key");
        }

        Ok(self.state.len())
    }

    // ========================================================================
    // Copy phase
    // ========================================================================

    async fn copy_phase(
        &self,
        now: DateTime<Utc>,
        result: &mut CycleResult,
    ) -> Result<(), ScanError> {
        for item in TreeScanner::new(&self.settings.source_dir) {
            match item {
                Ok(entry) => self.sync_entry(&entry, now, result).await,
                Err(err) => ScanPolicy::Lenient.handle(err)?,
            }
        }
        Ok(())
    }

    /// Applies the copy decision to one source entry
    async fn sync_entry(&self, entry: &FileEntry, now: DateTime<Utc>, result: &mut CycleResult) {
        let key = self.settings.key_for(entry);
        if !key.matches_any_prefix(&self.settings.key_prefixes) {
            return;
        }

        let decision = decide_copy(entry, self.state.get(&key), &self.settings, now);
        match decision {
            CopyDecision::Grown { from, to } => {
                info!(key = %key, recorded = from, size = to, "Exists target file, size changed");
            }
            CopyDecision::Shrunk { recorded, current } => {
                warn!(key = %key, recorded, size = current, "Exists target file, size abnormal");
                result.anomalies += 1;
            }
            CopyDecision::New => {
                info!(key = %key, size = entry.size, "New source file");
            }
            CopyDecision::Expired => {
                debug!(
                    key = %key,
                    age_secs = entry.age_at(now).num_seconds(),
                    "Source file too old for first copy"
                );
                result.skipped_expired += 1;
            }
            CopyDecision::Unchanged | CopyDecision::NotCandidate => {}
        }

        if !decision.should_copy() {
            return;
        }

        let target = self.settings.target_dir.join(key.as_str());
        let offset = decision.resume_offset(self.copier.mode());

        match self.copier.copy(&entry.path, &target, offset).await {
            Ok(stats) => {
                self.state.record(key, entry.size);
                result.files_copied += 1;
                result.bytes_copied += stats.bytes_copied;
            }
            Err(err) => {
                let detail = format!("{err:#}");
                error!(key = %key, error = %detail, "Copy failed, will retry next cycle");
                result
                    .errors
                    .push(format!("Copy {} failed: {detail}", entry.path.display()));
            }
        }
    }

    // ========================================================================
    // Delete phase
    // ========================================================================

    async fn delete_phase(
        &self,
        now: DateTime<Utc>,
        result: &mut CycleResult,
    ) -> Result<(), SyncError> {
        for item in TreeScanner::flat(&self.settings.target_dir) {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    ScanPolicy::Strict.handle(err)?;
                    continue;
                }
            };

            if decide_delete(&entry, &self.settings, now) != DeleteDecision::Delete {
                continue;
            }

            self.copier
                .remove(&entry.path)
                .await
                .map_err(|source| SyncError::Remove {
                    path: entry.path.clone(),
                    source,
                })?;

            if let Ok(key) = IdentityKey::from_file_name(entry.name.clone()) {
                self.state.evict(&key);
            }
            result.files_deleted += 1;

            info!(
                name = %entry.name,
                path = %entry.path.display(),
                modified = %entry.modified,
                expire_secs = self.settings.delete_expire.num_seconds(),
                "Delete file"
            );
        }
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
