//! Debounced notification of page source changes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use glob::Pattern;
use notify::{RecursiveMode, Watcher};

use crate::debouncer::Debouncer;
use crate::error::WatchError;
use crate::event::{SourceEvent, SourceEventKind, SourceEventReceiver, WatchHandle};
use crate::page::page_id_from_path;
use crate::scanner::{MATCH_OPTIONS, slash_path};

/// How often the drain thread checks for settled events and shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Watches a source root for changes to files matching the page glob.
pub struct SourceWatcher;

impl SourceWatcher {
    /// Start watching `root` recursively.
    ///
    /// Raw notifications are coalesced per path and delivered once the path
    /// has been quiet for `debounce`. Hidden paths and files that do not
    /// match `pattern` are ignored. Directories that come or go are reported
    /// too, since the platform may say nothing about the pages inside them. Watching stops when the returned [`WatchHandle`] is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] if the pattern is invalid or the platform
    /// watcher cannot be attached to `root`.
    pub fn start(
        root: &Path,
        pattern: &str,
        debounce: Duration,
    ) -> Result<(SourceEventReceiver, WatchHandle), WatchError> {
        let glob = Pattern::new(pattern).map_err(|source| WatchError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        let notify_error = |source| WatchError::Notify {
            path: root.to_path_buf(),
            source,
        };

        let (event_tx, event_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let debouncer = Arc::new(Debouncer::new(debounce));

        let watch_root = root.to_path_buf();
        let recorder = Arc::clone(&debouncer);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            let Some(kind) = event_kind(event.kind) else {
                return;
            };
            for path in event.paths {
                if let Some(rel_path) = changed_path(&watch_root, &path, event.kind, &glob) {
                    recorder.record(rel_path, kind);
                }
            }
        })
        .map_err(notify_error)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(notify_error)?;

        tracing::info!(root = %root.display(), pattern, "Watching source root");

        std::thread::spawn(move || {
            // Dropping the watcher detaches it from the filesystem
            let _watcher = watcher;

            loop {
                match shutdown_rx.recv_timeout(POLL_INTERVAL) {
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                }

                for (path, kind) in debouncer.take_ready() {
                    let event = SourceEvent {
                        id: page_id_from_path(&path),
                        path,
                        kind,
                    };
                    tracing::debug!(page = %event.id, kind = ?event.kind, "Source changed");
                    if event_tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((
            SourceEventReceiver::new(event_rx),
            WatchHandle::new(shutdown_tx),
        ))
    }
}

fn event_kind(kind: notify::EventKind) -> Option<SourceEventKind> {
    match kind {
        notify::EventKind::Create(_) => Some(SourceEventKind::Created),
        notify::EventKind::Modify(_) => Some(SourceEventKind::Modified),
        notify::EventKind::Remove(_) => Some(SourceEventKind::Removed),
        _ => None,
    }
}

/// Root-relative path of `path` if a change there can affect the page set.
///
/// That is a visible file matching the glob, or a visible directory whose
/// entry in its parent changed. A path that no longer exists may have
/// been a directory, so it counts as one.
fn changed_path(
    root: &Path,
    path: &Path,
    kind: notify::EventKind,
    glob: &Pattern,
) -> Option<PathBuf> {
    use notify::event::ModifyKind;

    let rel_path = path.strip_prefix(root).ok()?;
    if rel_path.as_os_str().is_empty() {
        return None;
    }
    let hidden = rel_path
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
    if hidden {
        return None;
    }
    if glob.matches_with(&slash_path(rel_path), MATCH_OPTIONS) {
        return Some(rel_path.to_path_buf());
    }

    let structural = matches!(
        kind,
        notify::EventKind::Create(_)
            | notify::EventKind::Remove(_)
            | notify::EventKind::Modify(ModifyKind::Name(_))
    );
    (structural && !path.is_file()).then(|| rel_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn modified() -> notify::EventKind {
        notify::EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Content,
        ))
    }

    #[test]
    fn test_changed_path_filters_files() {
        let glob = Pattern::new("**/*.html").unwrap();
        let root = Path::new("/book/source");
        let path = |p: &str| changed_path(root, Path::new(p), modified(), &glob);

        assert_eq!(
            path("/book/source/chapter 1/a.html"),
            Some(PathBuf::from("chapter 1/a.html"))
        );
        assert_eq!(
            path("/book/source/index.html"),
            Some(PathBuf::from("index.html"))
        );
        assert_eq!(path("/book/source/a.txt"), None);
        assert_eq!(path("/book/source/.git/x.html"), None);
        assert_eq!(path("/elsewhere/a.html"), None);
        assert_eq!(path("/book/source"), None);
    }

    #[test]
    fn test_changed_path_reports_directory_moves() {
        use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("chapter 2")).unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();
        let glob = Pattern::new("**/*.html").unwrap();
        let path = |rel: &str, kind| changed_path(root, &root.join(rel), kind, &glob);

        let renamed = notify::EventKind::Modify(ModifyKind::Name(RenameMode::From));
        let created = notify::EventKind::Create(CreateKind::Folder);
        let removed = notify::EventKind::Remove(RemoveKind::Folder);

        // Moved out of the tree: the directory is gone by the time we look
        assert_eq!(
            path("chapter 3", renamed),
            Some(PathBuf::from("chapter 3"))
        );
        assert_eq!(
            path("chapter 3", removed),
            Some(PathBuf::from("chapter 3"))
        );
        assert_eq!(
            path("chapter 2", created),
            Some(PathBuf::from("chapter 2"))
        );
        // Content changes on a directory say nothing new
        assert_eq!(path("chapter 2", modified()), None);
        assert_eq!(path("notes.txt", created), None);
        assert_eq!(path(".git/objects", created), None);
    }

    #[test]
    fn test_event_kind_mapping() {
        use notify::event::{CreateKind, ModifyKind, RemoveKind};

        assert_eq!(
            event_kind(notify::EventKind::Create(CreateKind::File)),
            Some(SourceEventKind::Created)
        );
        assert_eq!(
            event_kind(notify::EventKind::Modify(ModifyKind::Any)),
            Some(SourceEventKind::Modified)
        );
        assert_eq!(
            event_kind(notify::EventKind::Remove(RemoveKind::File)),
            Some(SourceEventKind::Removed)
        );
        assert_eq!(event_kind(notify::EventKind::Any), None);
    }

    #[test]
    fn test_start_rejects_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let result = SourceWatcher::start(dir.path(), "[", Duration::from_millis(10));
        assert!(matches!(result, Err(WatchError::InvalidPattern { .. })));
    }

    #[test]
    fn test_start_returns_receiver_and_handle() {
        let dir = TempDir::new().unwrap();
        let (_rx, handle) =
            SourceWatcher::start(dir.path(), "**/*.html", Duration::from_millis(10)).unwrap();
        handle.stop();
    }

    #[test]
    fn test_detects_page_write() {
        let dir = TempDir::new().unwrap();
        let (rx, _handle) =
            SourceWatcher::start(dir.path(), "**/*.html", Duration::from_millis(20)).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        fs::write(dir.path().join("new.html"), "<p>new</p>").unwrap();

        let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(event.id.as_str(), "new");
    }

    #[test]
    fn test_detects_directory_moved_out() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("source");
        fs::create_dir_all(root.join("chapter 2")).unwrap();
        fs::write(root.join("chapter 2/bruh.html"), "helo)").unwrap();
        let (rx, _handle) =
            SourceWatcher::start(&root, "**/*.html", Duration::from_millis(20)).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        fs::rename(root.join("chapter 2"), dir.path().join("chapter 2")).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(event.path, PathBuf::from("chapter 2"));
    }
}
