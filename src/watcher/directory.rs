//! Lifecycle of a shard directory watcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WatcherConfig;

use super::debouncer::{RescanSignal, run_event_loop, run_rescan_loop, subscribe};
use super::error::WatchError;
use super::loader::ShardLoader;
use super::scanner::Scanner;

/// Keeps a loader in sync with the shards in one directory.
///
/// Construction scans the directory once and loads everything selected,
/// then rescans in the background whenever the directory changes. Closing
/// (explicitly or by dropping the handle) stops the background tasks; a
/// scan already in flight runs to completion.
///
/// Must be created inside a tokio runtime.
pub struct DirectoryWatcher {
    dir: PathBuf,
    shutdown: CancellationToken,
    closed: AtomicBool,
    tasks: Vec<JoinHandle<()>>,
}

impl DirectoryWatcher {
    /// Start watching `dir` with default settings.
    pub async fn new(
        dir: impl Into<PathBuf>,
        loader: Arc<dyn ShardLoader>,
    ) -> Result<Self, WatchError> {
        Self::with_config(dir, loader, &WatcherConfig::default()).await
    }

    /// Start watching `dir`.
    ///
    /// Fails if the initial scan cannot list the directory or the change
    /// subscription cannot be set up. Nothing keeps running in that case.
    pub async fn with_config(
        dir: impl Into<PathBuf>,
        loader: Arc<dyn ShardLoader>,
        config: &WatcherConfig,
    ) -> Result<Self, WatchError> {
        let dir = dir.into();

        let mut scanner = Scanner::new(dir.clone(), loader, config);
        scanner.scan().await?;
        crate::log_event!(
            "watcher",
            "initial scan",
            "{} shards in {}",
            scanner.registry().len(),
            dir.display()
        );

        let (watcher, events) = subscribe(&dir, config.event_buffer)?;

        let shutdown = CancellationToken::new();
        let (signal, pending) = RescanSignal::channel();
        let tasks = vec![
            tokio::spawn(run_event_loop(
                events,
                watcher,
                signal,
                shutdown.clone(),
                dir.clone(),
            )),
            tokio::spawn(run_rescan_loop(scanner, pending)),
        ];

        crate::log_event!("watcher", "started", "{}", dir.display());

        Ok(Self {
            dir,
            shutdown,
            closed: AtomicBool::new(false),
            tasks,
        })
    }

    /// Get the watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stop watching. Safe to call any number of times.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        crate::log_event!("watcher", "closing", "{}", self.dir.display());
        self.shutdown.cancel();
    }

    /// Check if close has been requested.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close and wait for the background tasks to finish.
    pub async fn shutdown(mut self) {
        self.close();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::error!("[watcher] background task failed: {e}");
            }
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("dir", &self.dir)
            .field("closed", &self.is_closed())
            .finish()
    }
}
