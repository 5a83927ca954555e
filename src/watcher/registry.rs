//! Registry of loaded shards.
//!
//! Maps each tracked shard path to the modification time it had when it
//! was last handed to the loader. The key set is exactly the set of shards
//! believed loaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Paths to hand to the loader after reconciling against disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryDiff {
    /// New shards, or tracked shards whose modification time changed.
    pub to_load: Vec<PathBuf>,
    /// Tracked shards no longer present in the selected set.
    pub to_drop: Vec<PathBuf>,
}

impl RegistryDiff {
    /// True when the scan found nothing to do.
    pub fn is_empty(&self) -> bool {
        self.to_load.is_empty() && self.to_drop.is_empty()
    }
}

/// Registry of loaded shard paths and their last-seen modification times.
///
/// Owned by a single scanner; scans never overlap, so no lock is needed.
#[derive(Debug, Default)]
pub struct ShardRegistry {
    entries: HashMap<PathBuf, SystemTime>,
}

impl ShardRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents with `current` and report the difference.
    ///
    /// Both additions and removals take effect immediately, before the
    /// loader has seen them. Returned paths are sorted.
    pub fn reconcile(&mut self, current: HashMap<PathBuf, SystemTime>) -> RegistryDiff {
        let mut to_load = Vec::new();
        for (path, mod_time) in &current {
            if self.entries.get(path) != Some(mod_time) {
                to_load.push(path.clone());
                self.entries.insert(path.clone(), *mod_time);
            }
        }

        let mut to_drop = Vec::new();
        self.entries.retain(|path, _| {
            let keep = current.contains_key(path);
            if !keep {
                to_drop.push(path.clone());
            }
            keep
        });

        to_load.sort();
        to_drop.sort();
        RegistryDiff { to_load, to_drop }
    }

    /// Check if a path is tracked.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Modification time recorded for a tracked path.
    pub fn mod_time(&self, path: &Path) -> Option<SystemTime> {
        self.entries.get(path).copied()
    }

    /// All tracked paths, sorted.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.entries.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }

    /// Get count of tracked shards.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
