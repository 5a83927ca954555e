//! Coalescing of file change events into serialized rescans.
//!
//! Bursts of events (a builder writing and renaming several shards) must
//! not turn into a burst of scans. Every event posts to a single-slot
//! signal; when a rescan is already pending the event is dropped, since
//! the pending scan will read the latest directory state anyway.

use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::WatchError;
use super::scanner::Scanner;

/// Single-slot mailbox requesting a rescan.
#[derive(Debug, Clone)]
pub struct RescanSignal {
    tx: mpsc::Sender<()>,
}

impl RescanSignal {
    /// Create a signal and the receiver the rescan loop drains.
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Request a rescan without blocking.
    ///
    /// Returns false when a rescan is already pending (or nobody is
    /// listening anymore), in which case the request is dropped.
    pub fn post(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Subscribe to change notifications for `dir` (non-recursive).
///
/// Events are buffered in a channel of `buffer` entries. The returned
/// watcher must be kept alive for events to keep flowing.
pub(crate) fn subscribe(
    dir: &Path,
    buffer: usize,
) -> Result<(RecommendedWatcher, mpsc::Receiver<notify::Result<Event>>), WatchError> {
    let (tx, rx) = mpsc::channel(buffer.max(1));

    // notify invokes the callback on its own thread, outside the runtime.
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.blocking_send(res);
    })?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| WatchError::PathWatchFailed {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok((watcher, rx))
}

/// Forward file events into the rescan signal until shutdown.
///
/// Owns the subscription (the notify watcher) that feeds `events`.
/// Dropping it on exit releases the subscription, and dropping the signal
/// lets the rescan loop finish. Watch errors are logged and do not trigger
/// a rescan.
pub(crate) async fn run_event_loop<S: Send + 'static>(
    mut events: mpsc::Receiver<notify::Result<Event>>,
    subscription: S,
    signal: RescanSignal,
    shutdown: CancellationToken,
    dir: PathBuf,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            received = events.recv() => {
                match received {
                    Some(Ok(event)) => {
                        if event.need_rescan() {
                            // Queue overflow: events were lost, but a full rescan covers them.
                            crate::debug_event!("watcher", "event overflow", "{}", dir.display());
                        } else {
                            crate::debug_event!("watcher", "event", "{:?} {:?}", event.kind, event.paths);
                        }
                        if !signal.post() {
                            tracing::trace!("[watcher] rescan already pending");
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("[watcher] file watch error: {e}");
                    }
                    None => break,
                }
            }
        }
    }

    drop(subscription);
    drop(signal);
    crate::log_event!("watcher", "stopped", "{}", dir.display());
}

/// Run one scan per pending signal until the signal is closed.
///
/// The only consumer of the signal, so scans never overlap.
pub(crate) async fn run_rescan_loop(mut scanner: Scanner, mut pending: mpsc::Receiver<()>) {
    while pending.recv().await.is_some() {
        if let Err(e) = scanner.scan().await {
            tracing::error!("[scan] rescan failed: {e}");
        }
    }
    crate::debug_event!("scan", "rescan loop exited", "{}", scanner.dir().display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherConfig;
    use crate::watcher::ShardLoader;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::{Notify, Semaphore};
    use tokio::time::{Duration, timeout};

    #[test]
    fn test_signal_coalesces() {
        let (signal, mut rx) = RescanSignal::channel();

        let posted: Vec<bool> = (0..5).map(|_| signal.post()).collect();
        assert_eq!(posted, vec![true, false, false, false, false]);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        // Slot drained, next post is accepted again.
        assert!(signal.post());
    }

    #[test]
    fn test_signal_after_receiver_dropped() {
        let (signal, rx) = RescanSignal::channel();
        drop(rx);
        assert!(!signal.post());
    }

    /// Loader that blocks each load until released.
    struct Gated {
        entered: Notify,
        release: Semaphore,
        loads: AtomicUsize,
    }

    impl Gated {
        fn new() -> Self {
            Self {
                entered: Notify::new(),
                release: Semaphore::new(0),
                loads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ShardLoader for Gated {
        async fn load(&self, _path: &Path) {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }

        async fn unload(&self, _path: &Path) {}
    }

    #[tokio::test]
    async fn test_event_loop_signals_on_events_not_errors() {
        let (tx, events) = mpsc::channel(8);
        let (signal, mut pending) = RescanSignal::channel();
        let shutdown = CancellationToken::new();
        let event_loop = tokio::spawn(run_event_loop(
            events,
            (),
            signal,
            shutdown.clone(),
            PathBuf::from("/shards"),
        ));

        tx.send(Err(notify::Error::generic("watch backend failed")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(pending.try_recv().is_err(), "a watch error must not request a rescan");

        tx.send(Ok(
            Event::new(notify::EventKind::Other).set_flag(notify::event::Flag::Rescan)
        ))
        .await
        .unwrap();

        timeout(Duration::from_secs(5), pending.recv())
            .await
            .expect("overflow event should request a rescan")
            .expect("signal should still be open");

        shutdown.cancel();
        timeout(Duration::from_secs(5), event_loop)
            .await
            .expect("event loop should exit on cancel")
            .unwrap();

        // Exactly one request, and the signal is closed on exit.
        assert!(pending.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_event_loop_exits_when_events_close() {
        let (tx, events) = mpsc::channel::<notify::Result<Event>>(1);
        let (signal, mut pending) = RescanSignal::channel();
        let event_loop = tokio::spawn(run_event_loop(
            events,
            (),
            signal,
            CancellationToken::new(),
            PathBuf::from("/shards"),
        ));

        drop(tx);

        timeout(Duration::from_secs(5), event_loop)
            .await
            .expect("event loop should exit when the source closes")
            .unwrap();
        assert!(pending.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_events_during_scan_queue_one_rescan() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a_v1.zoekt"), b"a").unwrap();

        let gated = Arc::new(Gated::new());
        let scanner = Scanner::new(temp_dir.path(), gated.clone(), &WatcherConfig::default());
        let (signal, rx) = RescanSignal::channel();
        let rescans = tokio::spawn(run_rescan_loop(scanner, rx));

        assert!(signal.post());
        gated.entered.notified().await;

        // The first scan is blocked inside load; five more events arrive.
        let posted: Vec<bool> = (0..5).map(|_| signal.post()).collect();
        assert_eq!(posted, vec![true, false, false, false, false]);

        gated.release.add_permits(1);
        drop(signal);

        timeout(Duration::from_secs(5), rescans)
            .await
            .expect("rescan loop should exit once the signal closes")
            .unwrap();

        // The queued rescan found nothing new.
        assert_eq!(gated.loads.load(Ordering::SeqCst), 1);
    }
}
