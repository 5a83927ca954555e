//! Loader trait and bounded dispatch of load/unload calls.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::registry::RegistryDiff;

/// Collaborator that owns the actual shard data structures.
///
/// The watcher only decides *when* a shard should be loaded or unloaded.
/// Failures are the implementor's to handle; nothing is reported back.
#[async_trait]
pub trait ShardLoader: Send + Sync {
    /// Load a new shard, or reload one whose file changed.
    ///
    /// Must be safe to call concurrently for different paths.
    async fn load(&self, path: &Path);

    /// Release a shard whose file is gone or has been superseded.
    async fn unload(&self, path: &Path);
}

/// Dispatches a scan's unloads sequentially and its loads with a fixed
/// concurrency ceiling.
pub struct BoundedLoader {
    loader: Arc<dyn ShardLoader>,
    limit: usize,
}

impl BoundedLoader {
    /// Create a dispatcher allowing at most `limit` loads in flight (minimum 1).
    pub fn new(loader: Arc<dyn ShardLoader>, limit: usize) -> Self {
        Self {
            loader,
            limit: limit.max(1),
        }
    }

    /// Get the concurrency ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Apply a registry diff.
    ///
    /// All unloads finish before the first load is dispatched. Returns only
    /// once every load of this batch has completed.
    pub async fn apply(&self, diff: &RegistryDiff) {
        for path in &diff.to_drop {
            crate::log_event!("scan", "unloading", "{}", path.display());
            self.loader.unload(path).await;
        }

        let permits = Arc::new(Semaphore::new(self.limit));
        let mut tasks = JoinSet::new();

        for path in &diff.to_load {
            // Acquire before spawning so at most `limit` tasks exist at once.
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let loader = Arc::clone(&self.loader);
            let path = path.clone();
            tasks.spawn(async move {
                let _permit = permit;
                crate::debug_event!("scan", "loading", "{}", path.display());
                loader.load(&path).await;
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("[scan] shard load task failed: {e}");
            }
        }
    }
}
