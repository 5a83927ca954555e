//! Shard lifecycle watcher for a search-index server.
//!
//! Keeps an in-memory registry of on-disk index shards synchronized with a
//! directory and drives load/unload calls on a [`ShardLoader`] whenever the
//! directory changes.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use shardwatch::{DirectoryWatcher, ShardLoader};
//!
//! struct Index;
//!
//! #[async_trait::async_trait]
//! impl ShardLoader for Index {
//!     async fn load(&self, path: &Path) { /* open and swap in the shard */ }
//!     async fn unload(&self, path: &Path) { /* release it */ }
//! }
//!
//! # async fn run() -> Result<(), shardwatch::WatchError> {
//! let watcher = DirectoryWatcher::new("/data/index", Arc::new(Index)).await?;
//! // ... serve queries ...
//! watcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod watcher;

pub use config::{LoggingConfig, Settings, WatcherConfig};
pub use watcher::{
    DirectoryWatcher, INDEX_FORMAT_VERSION, ScanOutcome, Scanner, ShardFile, ShardLoader,
    WatchError,
};
