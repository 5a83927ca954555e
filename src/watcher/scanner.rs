//! Directory scanning and reconciliation against the shard registry.
//!
//! A scan recomputes the full picture from disk every time, so it is
//! idempotent and self-correcting: whatever a previous scan missed, the
//! next one picks up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::config::WatcherConfig;

use super::error::WatchError;
use super::loader::{BoundedLoader, ShardLoader};
use super::registry::ShardRegistry;
use super::version::version_from_path;

/// A shard file selected as the authoritative version of its logical shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFile {
    pub path: PathBuf,
    /// Path with the version suffix stripped.
    pub name: String,
    pub version: u64,
    pub mod_time: SystemTime,
}

/// What a single scan handed to the loader.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub loaded: Vec<PathBuf>,
    pub dropped: Vec<PathBuf>,
}

impl ScanOutcome {
    /// True when the directory matched the registry already.
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.dropped.is_empty()
    }
}

/// Reconciles one shard directory with the registry of loaded shards.
pub struct Scanner {
    dir: PathBuf,
    extension: String,
    format_version: u64,
    registry: ShardRegistry,
    loader: BoundedLoader,
}

impl Scanner {
    /// Create a scanner with an empty registry.
    pub fn new(
        dir: impl Into<PathBuf>,
        loader: Arc<dyn ShardLoader>,
        config: &WatcherConfig,
    ) -> Self {
        Self {
            dir: dir.into(),
            extension: config.extension.clone(),
            format_version: config.format_version,
            registry: ShardRegistry::new(),
            loader: BoundedLoader::new(loader, config.max_concurrent_loads),
        }
    }

    /// Get the scanned directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the registry of shards currently believed loaded.
    pub fn registry(&self) -> &ShardRegistry {
        &self.registry
    }

    /// Run one full reconciliation pass.
    ///
    /// Unloads shards that left the selected set, then loads new and
    /// changed shards. Returns once every load of this pass has completed.
    pub async fn scan(&mut self) -> Result<ScanOutcome, WatchError> {
        let current: HashMap<PathBuf, SystemTime> = self
            .selected()?
            .into_iter()
            .map(|shard| (shard.path, shard.mod_time))
            .collect();

        let diff = self.registry.reconcile(current);
        if diff.is_empty() {
            crate::debug_event!("scan", "unchanged", "{}", self.dir.display());
            return Ok(ScanOutcome::default());
        }

        self.loader.apply(&diff).await;

        crate::log_event!(
            "scan",
            "complete",
            "{} loaded, {} unloaded, {} tracked",
            diff.to_load.len(),
            diff.to_drop.len(),
            self.registry.len()
        );

        Ok(ScanOutcome {
            loaded: diff.to_load,
            dropped: diff.to_drop,
        })
    }

    /// List the shard selected for each logical name, without loading anything.
    ///
    /// Files that vanish between listing and stat are left out.
    pub fn selected(&self) -> Result<Vec<ShardFile>, WatchError> {
        let candidates = select_latest(self.list()?, self.format_version);
        Ok(stat_candidates(candidates))
    }

    /// List files in the directory whose name ends in `.<extension>`, sorted.
    fn list(&self) -> Result<Vec<PathBuf>, WatchError> {
        let list_failed = |reason: String| WatchError::ListFailed {
            dir: self.dir.clone(),
            reason,
        };

        let suffix = format!(".{}", self.extension);
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(list_failed(e.to_string())),
                Err(e) => {
                    crate::debug_event!("scan", "skipping entry", "{e}");
                    continue;
                }
            };

            if entry.depth() == 0 {
                if !entry.file_type().is_dir() {
                    return Err(list_failed("not a directory".to_string()));
                }
                continue;
            }

            if entry.file_type().is_dir() {
                continue;
            }

            // Suffix match, so a file named just `.zoekt` still counts.
            if entry
                .file_name()
                .as_encoded_bytes()
                .ends_with(suffix.as_bytes())
            {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Attach modification times to selected candidates.
///
/// A candidate that cannot be stat'ed (removed since listing) is left out,
/// which is the same as it not being there; the next scan sees it if it
/// comes back.
fn stat_candidates(candidates: Vec<(String, u64, PathBuf)>) -> Vec<ShardFile> {
    let mut shards = Vec::with_capacity(candidates.len());
    for (name, version, path) in candidates {
        match std::fs::symlink_metadata(&path).and_then(|meta| meta.modified()) {
            Ok(mod_time) => shards.push(ShardFile {
                path,
                name,
                version,
                mod_time,
            }),
            Err(e) => {
                crate::debug_event!("scan", "stat failed", "{}: {e}", path.display());
            }
        }
    }
    shards
}

/// Pick the highest readable version per logical name.
///
/// Versions above `format_version` are skipped entirely. An exact
/// (name, version) tie goes to the lexicographically greatest path.
/// Output is sorted by path.
fn select_latest(files: Vec<PathBuf>, format_version: u64) -> Vec<(String, u64, PathBuf)> {
    let mut latest: HashMap<String, (u64, PathBuf)> = HashMap::new();

    for path in files {
        let (name, version) = {
            let raw = path.to_string_lossy();
            let (name, version) = version_from_path(&raw);
            (name.to_string(), version)
        };

        // A newer builder may have written shards this process cannot read.
        if version > format_version {
            crate::debug_event!(
                "scan",
                "skipping newer format",
                "{} (v{version} > v{format_version})",
                path.display()
            );
            continue;
        }

        let wins = match latest.get(&name) {
            Some((best_version, best_path)) => (version, &path) > (*best_version, best_path),
            None => true,
        };
        if wins {
            latest.insert(name, (version, path));
        }
    }

    let mut selected: Vec<(String, u64, PathBuf)> = latest
        .into_iter()
        .map(|(name, (version, path))| (name, version, path))
        .collect();
    selected.sort_by(|a, b| a.2.cmp(&b.2));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn files(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|name| PathBuf::from(format!("/shards/{name}"))).collect()
    }

    fn selected_paths(selected: &[(String, u64, PathBuf)]) -> Vec<PathBuf> {
        selected.iter().map(|(_, _, path)| path.clone()).collect()
    }

    #[test]
    fn test_select_highest_version() {
        let selected = select_latest(files(&["foo_v1.zoekt", "foo_v2.zoekt"]), 16);

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, "/shards/foo");
        assert_eq!(selected[0].1, 2);
        assert_eq!(selected[0].2, PathBuf::from("/shards/foo_v2.zoekt"));
    }

    #[test]
    fn test_select_skips_newer_format() {
        let selected = select_latest(files(&["foo_v5.zoekt"]), 2);
        assert!(selected.is_empty());

        let selected = select_latest(files(&["foo_v1.zoekt", "foo_v5.zoekt"]), 2);
        assert_eq!(selected_paths(&selected), files(&["foo_v1.zoekt"]));
    }

    #[test]
    fn test_select_tie_prefers_greatest_path() {
        // Both resolve to ("/shards/foo", 1).
        let selected = select_latest(files(&["foo_v1.b.zoekt", "foo_v1.a.zoekt"]), 16);
        assert_eq!(selected_paths(&selected), files(&["foo_v1.b.zoekt"]));

        let selected = select_latest(files(&["foo_v1.a.zoekt", "foo_v1.b.zoekt"]), 16);
        assert_eq!(selected_paths(&selected), files(&["foo_v1.b.zoekt"]));
    }

    #[test]
    fn test_select_independent_names() {
        let selected = select_latest(
            files(&["bar_v1.zoekt", "weird.zoekt", "foo_v3.zoekt", "foo_v2.zoekt"]),
            16,
        );

        assert_eq!(
            selected_paths(&selected),
            files(&["bar_v1.zoekt", "foo_v3.zoekt", "weird.zoekt"])
        );
        let weird = &selected[2];
        assert_eq!(weird.0, "/shards/weird.zoekt");
        assert_eq!(weird.1, 0);
    }

    struct Noop;

    #[async_trait::async_trait]
    impl ShardLoader for Noop {
        async fn load(&self, _path: &Path) {}
        async fn unload(&self, _path: &Path) {}
    }

    #[test]
    fn test_list_filters_extension_and_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join("a_v1.zoekt"), b"a").unwrap();
        std::fs::write(dir.join(".zoekt"), b"z").unwrap();
        std::fs::write(dir.join("notes.txt"), b"n").unwrap();
        std::fs::write(dir.join("a_v1.zoekt.tmp"), b"t").unwrap();
        std::fs::write(dir.join("azoekt"), b"x").unwrap();
        std::fs::create_dir(dir.join("nested.zoekt")).unwrap();
        std::fs::write(dir.join("nested.zoekt").join("b_v1.zoekt"), b"b").unwrap();

        let scanner = Scanner::new(dir, Arc::new(Noop), &WatcherConfig::default());
        let listed = scanner.list().unwrap();

        assert_eq!(listed, vec![dir.join(".zoekt"), dir.join("a_v1.zoekt")]);
    }

    #[test]
    fn test_select_skips_oversized_version() {
        let selected = select_latest(
            files(&["foo_v5000000000.zoekt", "foo_v99999999999999999999999.zoekt", "foo_v1.zoekt"]),
            16,
        );
        assert_eq!(selected_paths(&selected), files(&["foo_v1.zoekt"]));
    }

    #[test]
    fn test_stat_omits_vanished_candidate() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("foo_v1.zoekt");
        let vanished = temp_dir.path().join("bar_v1.zoekt");
        std::fs::write(&present, b"f").unwrap();

        let shards = stat_candidates(vec![
            ("bar".to_string(), 1, vanished),
            ("foo".to_string(), 1, present.clone()),
        ]);

        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].path, present);
        assert_eq!(shards[0].name, "foo");
        assert_eq!(shards[0].version, 1);
    }

    #[test]
    fn test_list_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let scanner = Scanner::new(&missing, Arc::new(Noop), &WatcherConfig::default());

        match scanner.list() {
            Err(WatchError::ListFailed { dir, .. }) => assert_eq!(dir, missing),
            other => panic!("expected ListFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_list_file_instead_of_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain_v1.zoekt");
        std::fs::write(&file, b"x").unwrap();

        let scanner = Scanner::new(&file, Arc::new(Noop), &WatcherConfig::default());

        assert!(matches!(scanner.list(), Err(WatchError::ListFailed { .. })));
    }

    #[test]
    fn test_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join("a_v1.zoekt"), b"a").unwrap();
        std::fs::write(dir.join("a_v1.shard"), b"a").unwrap();

        let config = WatcherConfig {
            extension: "shard".to_string(),
            ..WatcherConfig::default()
        };
        let scanner = Scanner::new(dir, Arc::new(Noop), &config);

        let selected = scanner.selected().unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].path, dir.join("a_v1.shard"));
    }
}
