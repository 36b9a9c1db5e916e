//! Cycle scheduler - drives the sync engine on a fixed tick
//!
//! The [`CycleScheduler`] owns a [`SyncEngine`] and runs one cycle per tick
//! until its [`CancellationToken`] is cancelled.
//!
//! ## Flow
//!
//! ```text
//! loop:
//!   cancelled? ──yes──→ stop
//!       │no
//!   run_cycle()              (never interrupted)
//!       │
//!   select! { sleep(tick) | cancelled() }
//! ```
//!
//! Cancellation is only observed between cycles, so a cycle that has
//! started always finishes its copy and delete phases.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::SyncEngine;

// ============================================================================
// CycleScheduler struct
// ============================================================================

/// Runs synchronization cycles at a fixed interval
pub struct CycleScheduler {
    engine: SyncEngine,
    tick_interval: Duration,
    cycles_completed: u64,
}

impl CycleScheduler {
    /// Creates a new `CycleScheduler`
    ///
    /// # Arguments
    /// * `engine` - The engine to drive
    /// * `tick_interval` - Pause between the end of one cycle and the start
    ///   of the next
    pub fn new(engine: SyncEngine, tick_interval: Duration) -> Self {
        info!(
            tick_ms = tick_interval.as_millis() as u64,
            "Creating cycle scheduler"
        );
        Self {
            engine,
            tick_interval,
            cycles_completed: 0,
        }
    }

    /// The driven engine
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Number of cycles run to completion so far
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Main loop
    ///
    /// Returns once `shutdown` is cancelled. A cancellation that arrives
    /// mid-cycle takes effect after the cycle completes.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!("Cycle scheduler starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let result = self.engine.run_cycle().await;
            self.cycles_completed += 1;
            debug!(
                cycle = self.cycles_completed,
                copied = result.files_copied,
                deleted = result.files_deleted,
                "Cycle finished"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        info!(cycles = self.cycles_completed, "Cycle scheduler stopped");
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use filemirror_core::domain::KeyScheme;
    use filemirror_core::ports::copier::{CopyMode, CopyStats, IFileCopier};
    use tempfile::TempDir;

    use super::*;
    use crate::engine::EngineSettings;
    use crate::state::{RefreshPolicy, StateMap};

    /// Copier that cancels the shutdown token the first time it is called.
    struct CancellingCopier {
        token: CancellationToken,
    }

    #[async_trait::async_trait]
    impl IFileCopier for CancellingCopier {
        fn mode(&self) -> CopyMode {
            CopyMode::Append
        }

        async fn copy(
            &self,
            source: &Path,
            target: &Path,
            _resume_offset: u64,
        ) -> anyhow::Result<CopyStats> {
            self.token.cancel();
            let n = tokio::fs::copy(source, target).await?;
            Ok(CopyStats {
                offset: 0,
                bytes_copied: n,
            })
        }

        async fn remove(&self, target: &Path) -> std::io::Result<()> {
            tokio::fs::remove_file(target).await
        }
    }

    fn engine(
        source: &Path,
        target: &Path,
        copier: Arc<dyn IFileCopier + Send + Sync>,
    ) -> SyncEngine {
        let settings = EngineSettings {
            source_dir: source.to_path_buf(),
            target_dir: target.to_path_buf(),
            key_prefixes: Vec::new(),
            target_file_name: "application.log".to_string(),
            copy_expire: Some(ChronoDuration::hours(1)),
            delete_expire: ChronoDuration::hours(3),
            key_scheme: KeyScheme::Qualified,
        };
        SyncEngine::new(
            settings,
            Arc::new(StateMap::new()),
            copier,
            RefreshPolicy::every_cycle(),
        )
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_runs_no_cycle() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let copier = Arc::new(CancellingCopier {
            token: token.clone(),
        });
        let mut scheduler = CycleScheduler::new(
            engine(source.path(), target.path(), copier),
            Duration::from_millis(10),
        );

        scheduler.run(token).await;
        assert_eq!(scheduler.cycles_completed(), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_cycle_lets_cycle_finish() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        for dir in ["a", "b"] {
            std::fs::create_dir(source.path().join(dir)).unwrap();
            std::fs::write(source.path().join(dir).join("application.log"), b"data").unwrap();
        }

        let token = CancellationToken::new();
        let copier = Arc::new(CancellingCopier {
            token: token.clone(),
        });
        let mut scheduler = CycleScheduler::new(
            engine(source.path(), target.path(), copier),
            Duration::from_secs(3600),
        );

        tokio::time::timeout(Duration::from_secs(5), scheduler.run(token))
            .await
            .expect("scheduler should stop after the current cycle");

        assert_eq!(scheduler.cycles_completed(), 1);
        // Both files were copied even though cancellation arrived on the first.
        assert_eq!(scheduler.engine().state().len(), 2);
        assert_eq!(std::fs::read_dir(target.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_runs_repeatedly_until_cancelled() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let token = CancellationToken::new();

        let copier = Arc::new(CancellingCopier {
            token: CancellationToken::new(),
        });
        let mut scheduler = CycleScheduler::new(
            engine(source.path(), target.path(), copier),
            Duration::from_millis(5),
        );

        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        tokio::time::timeout(Duration::from_secs(5), scheduler.run(token))
            .await
            .expect("scheduler should stop once cancelled");

        assert!(scheduler.cycles_completed() >= 2);
    }
}
