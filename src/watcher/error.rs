//! Error types for the shard watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
///
/// Only startup surfaces these to callers. Once the watcher is running,
/// scan and notification errors are logged and the next event retries.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to list shards in {dir}: {reason}")]
    ListFailed { dir: PathBuf, reason: String },

    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
