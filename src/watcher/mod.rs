//! Shard directory watcher.
//!
//! Keeps an external shard loader in sync with the index shards in one
//! directory: new and changed shards are loaded, vanished or superseded
//! ones are unloaded.
//!
//! # Architecture
//!
//! ```text
//! DirectoryWatcher (startup scan, close)
//!   - event loop:  notify events -> RescanSignal (single slot)
//!   - rescan loop: RescanSignal -> Scanner::scan
//!         |
//!      Scanner
//!   - list *.<ext>, resolve name/version, select latest readable
//!   - ShardRegistry::reconcile -> RegistryDiff
//!   - BoundedLoader: unloads in order, then bounded parallel loads
//! ```

mod debouncer;
mod directory;
mod error;
mod loader;
mod registry;
mod scanner;
mod version;

pub use debouncer::RescanSignal;
pub use directory::DirectoryWatcher;
pub use error::WatchError;
pub use loader::{BoundedLoader, ShardLoader};
pub use registry::{RegistryDiff, ShardRegistry};
pub use scanner::{ScanOutcome, Scanner, ShardFile};
pub use version::{INDEX_FORMAT_VERSION, version_from_path};
