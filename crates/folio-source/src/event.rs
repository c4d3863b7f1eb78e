//! Source change notifications.
//!
//! Events only say that something under the source root changed. They are a
//! trigger for a refresh, never a substitute for one: the next scan is what
//! decides which pages are affected.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use crate::page::PageId;

/// Kind of change seen on a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceEventKind {
    Created,
    Modified,
    Removed,
}

/// A debounced change to one page source file, or to a directory that may
/// hold some.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceEvent {
    /// Page the path maps to.
    pub id: PageId,
    /// Path relative to the source root.
    pub path: PathBuf,
    pub kind: SourceEventKind,
}

/// Receiving end of a [`SourceWatcher`](crate::SourceWatcher).
///
/// Can also wrap a plain channel, for feeding events from another source.
pub struct SourceEventReceiver {
    rx: mpsc::Receiver<SourceEvent>,
}

impl From<mpsc::Receiver<SourceEvent>> for SourceEventReceiver {
    fn from(rx: mpsc::Receiver<SourceEvent>) -> Self {
        Self::new(rx)
    }
}

impl SourceEventReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<SourceEvent>) -> Self {
        Self { rx }
    }

    /// Block until the next event. `None` once the watcher has stopped.
    #[must_use]
    pub fn recv(&self) -> Option<SourceEvent> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for an event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SourceEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    #[must_use]
    pub fn try_recv(&self) -> Option<SourceEvent> {
        self.rx.try_recv().ok()
    }

    /// Take every event already queued, without blocking.
    ///
    /// Used to fold a burst of notifications into a single refresh.
    pub fn drain(&self) -> Vec<SourceEvent> {
        self.rx.try_iter().collect()
    }

    /// Blocking iterator that ends when the watcher stops.
    pub fn iter(&self) -> impl Iterator<Item = SourceEvent> + '_ {
        self.rx.iter()
    }
}

/// Keeps a watcher alive. Dropping it (or calling [`stop`](Self::stop))
/// shuts the watcher thread down.
pub struct WatchHandle {
    _shutdown: mpsc::Sender<()>,
}

impl WatchHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: shutdown,
        }
    }

    pub fn stop(self) {}
}
