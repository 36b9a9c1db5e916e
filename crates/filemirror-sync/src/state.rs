//! State map of mirrored files
//!
//! [`StateMap`] records, per [`IdentityKey`], the size the engine last saw
//! mirrored. A missing key means the file has not been copied yet. The map
//! is owned by whoever builds the engine and shared as `Arc<StateMap>`, so a
//! shutdown listener or status reporter can read it while cycles run.
//!
//! [`RefreshPolicy`] decides when the map is rebuilt from the target
//! directory instead of trusting the in-memory snapshot.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use filemirror_core::domain::IdentityKey;

// ============================================================================
// StateMap
// ============================================================================

/// Concurrent mapping of identity key to last mirrored size.
///
/// Uses DashMap so readers on other tasks never block the cycle.
#[derive(Debug, Default)]
pub struct StateMap {
    sizes: DashMap<IdentityKey, u64>,
}

impl StateMap {
    /// Create an empty state map.
    pub fn new() -> Self {
        Self {
            sizes: DashMap::new(),
        }
    }

    /// Recorded size for `key`, if the key is tracked.
    pub fn get(&self, key: &IdentityKey) -> Option<u64> {
        self.sizes.get(key).map(|r| *r)
    }

    /// Record `size` for `key`, replacing any previous value.
    pub fn record(&self, key: IdentityKey, size: u64) {
        self.sizes.insert(key, size);
    }

    /// Stop tracking `key`, returning the size it had.
    pub fn evict(&self, key: &IdentityKey) -> Option<u64> {
        self.sizes.remove(key).map(|(_, size)| size)
    }

    /// Whether `key` is tracked.
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.sizes.contains_key(key)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.sizes.clear();
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Check if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Copy of all entries, sorted by key.
    pub fn snapshot(&self) -> Vec<(IdentityKey, u64)> {
        let mut entries: Vec<_> = self
            .sizes
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        entries.sort();
        entries
    }
}

// ============================================================================
// RefreshPolicy
// ============================================================================

/// Decides when the state map is rebuilt from the target directory.
///
/// Without an interval the map is rebuilt on every cycle. With one, it is
/// rebuilt on the first cycle and then whenever the interval has elapsed
/// since the last successful rebuild. Between rebuilds the engine keeps the
/// map current itself by recording copies and evicting deletions.
#[derive(Debug, Clone, Default)]
pub struct RefreshPolicy {
    interval: Option<Duration>,
    last_refreshed: Option<Instant>,
}

impl RefreshPolicy {
    /// Rebuild on every cycle.
    pub fn every_cycle() -> Self {
        Self::default()
    }

    /// Rebuild at most once per `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            last_refreshed: None,
        }
    }

    /// Build from the `sync.refresh_interval_secs` configuration value.
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) => Self::every(Duration::from_secs(secs)),
            None => Self::every_cycle(),
        }
    }

    /// The configured interval, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether a rebuild is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match (self.interval, self.last_refreshed) {
            (None, _) | (_, None) => true,
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
        }
    }

    /// Note a successful rebuild at `now`.
    pub fn mark_refreshed(&mut self, now: Instant) {
        self.last_refreshed = Some(now);
    }
}
