//! Page discovery by filesystem walking.
//!
//! The scanner lists the source root recursively, keeps files whose relative
//! path matches the page glob, and hashes each one. Hidden entries (names
//! starting with `.`) are skipped. Within a directory, files are visited
//! before subdirectories, both in name order, which makes duplicate
//! resolution deterministic: `a.html` wins over `a/index.html`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::{ScanError, ScanWarning};
use crate::hash::ContentHash;
use crate::page::{PageId, PageRecord, page_id_from_path, unix_now, unix_seconds};
use crate::snapshot::ProjectSnapshot;

/// Page glob used when none is configured.
pub const DEFAULT_PATTERN: &str = "**/*.html";

/// `*` may cross directory boundaries so `**/*.html` also matches
/// top-level files.
pub(crate) const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Result of a successful scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub snapshot: ProjectSnapshot,
    /// Files or directories that were skipped.
    pub warnings: Vec<ScanWarning>,
}

/// Builds [`ProjectSnapshot`]s of a source directory.
#[derive(Clone, Debug)]
pub struct ProjectScanner {
    root: PathBuf,
    pattern: Pattern,
}

impl ProjectScanner {
    /// Create a scanner for `root` matching pages against `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] if the glob does not parse.
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> Result<Self, ScanError> {
        let pattern = Pattern::new(pattern).map_err(|source| ScanError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            root: root.into(),
            pattern,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Whether a root-relative path names a page.
    #[must_use]
    pub fn matches(&self, rel_path: &Path) -> bool {
        self.pattern.matches_with(&slash_path(rel_path), MATCH_OPTIONS)
    }

    /// Walk the source root and hash every matching page.
    ///
    /// # Errors
    ///
    /// Fails if the root is missing, not a directory or cannot be listed, and
    /// when pages matched but none could be read. Individual unreadable files
    /// and directories are reported as warnings instead.
    pub fn scan(&self) -> Result<ScanOutcome, ScanError> {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ScanError::NotADirectory(self.root.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ScanError::RootMissing(self.root.clone()));
            }
            Err(source) => {
                return Err(ScanError::RootUnreadable {
                    path: self.root.clone(),
                    source,
                });
            }
        }

        let captured_at = unix_now();
        let mut walk = Walk::default();
        let entries = list_dir(&self.root).map_err(|source| ScanError::RootUnreadable {
            path: self.root.clone(),
            source,
        })?;
        self.visit(entries, Path::new(""), &mut walk);

        if walk.matched > 0 && walk.records.is_empty() {
            return Err(ScanError::NoReadablePages {
                root: self.root.clone(),
                matched: walk.matched,
            });
        }

        tracing::debug!(
            root = %self.root.display(),
            pages = walk.records.len(),
            skipped = walk.warnings.len(),
            "Scanned source root"
        );

        Ok(ScanOutcome {
            snapshot: ProjectSnapshot::new(walk.records, captured_at),
            warnings: walk.warnings,
        })
    }

    fn visit(&self, entries: Vec<Entry>, rel_dir: &Path, walk: &mut Walk) {
        let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.is_dir);

        for file in files {
            let rel_path = rel_dir.join(&file.name);
            if self.matches(&rel_path) {
                walk.matched += 1;
                read_page(&file.path, &rel_path, walk);
            }
        }

        for dir in dirs {
            match list_dir(&dir.path) {
                Ok(children) => self.visit(children, &rel_dir.join(&dir.name), walk),
                Err(error) => {
                    tracing::warn!(path = %dir.path.display(), error = %error, "Skipping unreadable directory");
                    walk.warnings.push(ScanWarning::UnreadableDir {
                        path: dir.path,
                        error,
                    });
                }
            }
        }
    }
}

fn read_page(path: &Path, rel_path: &Path, walk: &mut Walk) {
    let id = page_id_from_path(rel_path);
    if let Some(kept) = walk.seen.get(&id) {
        let warning = ScanWarning::DuplicateId {
            id,
            kept: kept.clone(),
            skipped: path.to_path_buf(),
        };
        tracing::warn!(%warning, "Duplicate page");
        walk.warnings.push(warning);
        return;
    }

    let loaded = fs::read(path).and_then(|bytes| {
        let mtime = fs::metadata(path)?.modified()?;
        Ok((bytes, mtime))
    });
    match loaded {
        Ok((bytes, mtime)) => {
            walk.seen.insert(id, path.to_path_buf());
            walk.records.push(PageRecord::from_source(
                rel_path,
                path.to_path_buf(),
                ContentHash::of(&bytes),
                unix_seconds(mtime),
            ));
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), error = %error, "Skipping unreadable page");
            walk.warnings.push(ScanWarning::UnreadableFile {
                path: path.to_path_buf(),
                error,
            });
        }
    }
}

#[derive(Default)]
struct Walk {
    records: Vec<PageRecord>,
    seen: HashMap<PageId, PathBuf>,
    warnings: Vec<ScanWarning>,
    matched: usize,
}

struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

/// Non-hidden entries of a directory, sorted by name.
fn list_dir(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            // Directory symlinks are not followed; a link cycle would never end
            let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
            Some(Entry {
                name,
                path: e.path(),
                is_dir,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Relative path with `/` separators regardless of platform.
pub(crate) fn slash_path(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn book() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "index.html", "<h1>Book</h1>");
        write(root, "chapter 1/index.html", "<h1>Chapter 1</h1>");
        write(root, "chapter 1/1.1. Welcome.html", "<p>Welcome</p>");
        write(root, "chapter 1/1.10. Appendix.html", "<p>Appendix</p>");
        write(root, "chapter 1/1.2. Setup.html", "<p>Setup</p>");
        write(root, "chapter 2/bruh.html", "helo)");
        write(root, "chapter 2/part 1/paragraph 1/minions.html", "<p>bello</p>");
        dir
    }

    fn ids(outcome: &ScanOutcome) -> Vec<&str> {
        outcome.snapshot.ids().map(PageId::as_str).collect()
    }

    #[test]
    fn test_scan_finds_pages_in_natural_order() {
        let dir = book();
        let outcome = ProjectScanner::new(dir.path(), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap();

        assert_eq!(
            ids(&outcome),
            vec![
                "",
                "chapter 1",
                "chapter 1/1.1. Welcome",
                "chapter 1/1.2. Setup",
                "chapter 1/1.10. Appendix",
                "chapter 2/bruh",
                "chapter 2/part 1/paragraph 1/minions",
            ]
        );
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_scan_hashes_content() {
        let dir = book();
        let outcome = ProjectScanner::new(dir.path(), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap();

        let page = outcome.snapshot.get("chapter 2/bruh").unwrap();
        assert_eq!(page.content_hash, ContentHash::of(b"helo)"));
        assert_eq!(page.title, "bruh");
        assert_eq!(page.source_path, dir.path().join("chapter 2/bruh.html"));
        assert!(page.source_mtime > 0.0);
        assert!(page.last_rendered_at.is_none());
    }

    #[test]
    fn test_scan_ignores_non_matching_and_hidden() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "x");
        write(dir.path(), "notes.txt", "x");
        write(dir.path(), ".draft.html", "x");
        write(dir.path(), ".git/objects/a.html", "x");

        let outcome = ProjectScanner::new(dir.path(), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap();
        assert_eq!(ids(&outcome), vec!["page"]);
    }

    #[test]
    fn test_scan_custom_pattern() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "guide.md", "# Guide");
        write(dir.path(), "docs/setup.md", "# Setup");
        write(dir.path(), "page.html", "x");

        let outcome = ProjectScanner::new(dir.path(), "docs/*.md")
            .unwrap()
            .scan()
            .unwrap();
        assert_eq!(ids(&outcome), vec!["docs/setup"]);
    }

    #[test]
    fn test_empty_root_yields_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let outcome = ProjectScanner::new(dir.path(), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap();
        assert!(outcome.snapshot.is_empty());
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let err = ProjectScanner::new(dir.path().join("missing"), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap_err();
        assert!(matches!(err, ScanError::RootMissing(_)));
    }

    #[test]
    fn test_file_root_is_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "file.html", "x");
        let err = ProjectScanner::new(dir.path().join("file.html"), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let err = ProjectScanner::new("source", "[").unwrap_err();
        assert!(matches!(err, ScanError::InvalidPattern { .. }));
    }

    #[test]
    fn test_duplicate_id_keeps_file_over_directory_index() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.html", "file");
        write(dir.path(), "a/index.html", "index");

        let outcome = ProjectScanner::new(dir.path(), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap();

        assert_eq!(ids(&outcome), vec!["a"]);
        assert_eq!(
            outcome.snapshot.get("a").unwrap().content_hash,
            ContentHash::of(b"file")
        );
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            outcome.warnings[0],
            ScanWarning::DuplicateId { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_warning() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "ok.html", "x");
        write(dir.path(), "locked.html", "y");
        let locked = dir.path().join("locked.html");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can read regardless of mode
        if fs::read(&locked).is_ok() {
            return;
        }

        let outcome = ProjectScanner::new(dir.path(), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap();
        assert_eq!(ids(&outcome), vec!["ok"]);
        assert!(matches!(
            outcome.warnings[0],
            ScanWarning::UnreadableFile { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_all_matches_unreadable_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "locked.html", "y");
        let locked = dir.path().join("locked.html");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::read(&locked).is_ok() {
            return;
        }

        let err = ProjectScanner::new(dir.path(), DEFAULT_PATTERN)
            .unwrap()
            .scan()
            .unwrap_err();
        assert!(matches!(err, ScanError::NoReadablePages { matched: 1, .. }));
    }

    #[test]
    fn test_matches_top_level_and_nested() {
        let scanner = ProjectScanner::new("source", DEFAULT_PATTERN).unwrap();
        assert!(scanner.matches(Path::new("index.html")));
        assert!(scanner.matches(Path::new("chapter 1/index.html")));
        assert!(!scanner.matches(Path::new("chapter 1/notes.txt")));
    }
}
