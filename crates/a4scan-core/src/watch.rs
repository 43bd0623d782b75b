//! Status watcher: a cancellable, pull-driven sequence of status changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::error::ErrorCode;
use crate::protocol::messages::StatusInternalMessage;
use crate::scanner::CustomA4Scanner;
use crate::status::convert_from_internal_status;
use crate::transport::DuplexChannel;
use crate::types::ScannerStatus;

/// Default pause between polls that observed no change.
pub const WATCH_INTERVAL: Duration = Duration::from_millis(250);

/// Stops a [`StatusWatcher`] from another thread.
///
/// Stopping makes the next pull report exhaustion; a poll already in
/// flight is not aborted.
#[derive(Clone, Debug, Default)]
pub struct WatchHandle {
    stopped: Arc<AtomicBool>,
}

impl WatchHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Infinite, non-restartable iterator over status changes.
///
/// Each pull polls the raw status until it differs from the last
/// observed value, sleeping `interval` between identical polls, then
/// yields the interpreted status. Identical consecutive errors are
/// also suppressed. The watcher reads status directly on the channel
/// lock and never takes the public-operation lock, so it neither blocks
/// nor is blocked by a concurrent scan or move.
pub struct StatusWatcher<'a, C: DuplexChannel> {
    scanner: &'a CustomA4Scanner<C>,
    interval: Duration,
    handle: WatchHandle,
    last: Option<Result<StatusInternalMessage, ErrorCode>>,
}

impl<C: DuplexChannel> CustomA4Scanner<C> {
    /// Starts watching the scanner status with the default interval.
    pub fn watch_status(&self) -> StatusWatcher<'_, C> {
        self.watch_status_with_interval(WATCH_INTERVAL)
    }

    /// Starts watching the scanner status, pausing `interval` between
    /// polls that observed no change.
    pub fn watch_status_with_interval(&self, interval: Duration) -> StatusWatcher<'_, C> {
        debug!("watching status");
        StatusWatcher {
            scanner: self,
            interval,
            handle: WatchHandle::default(),
            last: None,
        }
    }
}

impl<C: DuplexChannel> StatusWatcher<'_, C> {
    /// A handle that can stop this watcher from another thread.
    pub fn handle(&self) -> WatchHandle {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }
}

impl<C: DuplexChannel> Iterator for StatusWatcher<'_, C> {
    type Item = Result<ScannerStatus, ErrorCode>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.handle.is_stopped() {
                debug!("status watcher stopped");
                return None;
            }

            let result = self.scanner.get_status_internal();
            let unchanged = match (&self.last, &result) {
                (Some(Ok(last)), Ok(current)) => last == current,
                (Some(Err(last)), Err(current)) => last == current,
                _ => false,
            };

            if unchanged {
                std::thread::sleep(self.interval);
                continue;
            }

            let item = result
                .as_ref()
                .map(|internal| convert_from_internal_status(internal).status)
                .map_err(|&error| error);
            self.last = Some(result);
            return Some(item);
        }
    }
}
