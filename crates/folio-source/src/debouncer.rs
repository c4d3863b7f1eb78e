//! Per-path coalescing of raw filesystem notifications.
//!
//! Editors commonly emit several events for a single save (truncate, write,
//! rename over). Events for the same path are merged until the path has been
//! quiet for the debounce interval.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::event::SourceEventKind;

struct Pending {
    kind: SourceEventKind,
    deadline: Instant,
}

pub(crate) struct Debouncer {
    pending: Mutex<HashMap<PathBuf, Pending>>,
    quiet: Duration,
}

impl Debouncer {
    pub(crate) fn new(quiet: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            quiet,
        }
    }

    /// Record a raw event for `path`, merging with any pending one.
    pub(crate) fn record(&self, path: PathBuf, kind: SourceEventKind) {
        use std::collections::hash_map::Entry;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.quiet;

        match pending.entry(path) {
            Entry::Vacant(slot) => {
                slot.insert(Pending { kind, deadline });
            }
            Entry::Occupied(mut slot) => match merge(slot.get().kind, kind) {
                Some(kind) => {
                    *slot.get_mut() = Pending { kind, deadline };
                }
                None => {
                    slot.remove();
                }
            },
        }
    }

    /// Remove and return every event whose quiet period has elapsed.
    pub(crate) fn take_ready(&self) -> Vec<(PathBuf, SourceEventKind)> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut ready = Vec::new();
        pending.retain(|path, event| {
            if event.deadline <= now {
                ready.push((path.clone(), event.kind));
                false
            } else {
                true
            }
        });
        ready
    }
}

/// Merge a new event into a pending one. `None` drops both: a file created
/// and removed within one window never existed as far as pages go.
#[allow(clippy::match_same_arms)]
fn merge(pending: SourceEventKind, new: SourceEventKind) -> Option<SourceEventKind> {
    use SourceEventKind::{Created, Modified, Removed};

    match (pending, new) {
        (Created, Removed) => None,
        (Created, _) => Some(Created),
        (Modified, kind) => Some(kind),
        (Removed, Created) => Some(Modified),
        (Removed, _) => Some(Removed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use SourceEventKind::{Created, Modified, Removed};

    fn settle(debouncer: &Debouncer) -> Vec<(PathBuf, SourceEventKind)> {
        thread::sleep(Duration::from_millis(15));
        debouncer.take_ready()
    }

    #[test]
    fn test_event_held_until_quiet() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.record(PathBuf::from("/src/a.html"), Modified);

        assert!(debouncer.take_ready().is_empty());
        assert_eq!(
            settle(&debouncer),
            vec![(PathBuf::from("/src/a.html"), Modified)]
        );
        assert!(debouncer.take_ready().is_empty());
    }

    #[test]
    fn test_burst_for_one_path_collapses() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        for _ in 0..5 {
            debouncer.record(PathBuf::from("/src/a.html"), Modified);
        }
        assert_eq!(settle(&debouncer).len(), 1);
    }

    #[test]
    fn test_create_then_remove_cancels() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.record(PathBuf::from("/src/tmp.html"), Created);
        debouncer.record(PathBuf::from("/src/tmp.html"), Removed);
        assert!(settle(&debouncer).is_empty());
    }

    #[test]
    fn test_paths_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.record(PathBuf::from("/src/a.html"), Modified);
        debouncer.record(PathBuf::from("/src/b.html"), Created);
        assert_eq!(settle(&debouncer).len(), 2);
    }

    #[test]
    fn test_merge_table() {
        assert_eq!(merge(Created, Created), Some(Created));
        assert_eq!(merge(Created, Modified), Some(Created));
        assert_eq!(merge(Created, Removed), None);

        assert_eq!(merge(Modified, Created), Some(Created));
        assert_eq!(merge(Modified, Modified), Some(Modified));
        assert_eq!(merge(Modified, Removed), Some(Removed));

        assert_eq!(merge(Removed, Created), Some(Modified));
        assert_eq!(merge(Removed, Modified), Some(Removed));
        assert_eq!(merge(Removed, Removed), Some(Removed));
    }
}
