//! Page identity and per-page metadata.

use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Stable logical name of a page.
///
/// Derived from the source path relative to the project root with the
/// extension stripped and `/` as separator. Index files name their
/// directory:
///
/// - `index.html` -> `""` (root page)
/// - `guide.html` -> `"guide"`
/// - `chapter 1/index.html` -> `"chapter 1"`
/// - `chapter 2/bruh.html` -> `"chapter 2/bruh"`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Wrap an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the project's top-level index page.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Metadata for one discovered page.
///
/// Records are immutable: a change to a page produces a new record that
/// replaces the old one in the next snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Lookup key.
    pub id: PageId,
    /// Display title (file stem, or directory name for index pages).
    pub title: String,
    /// Slash-separated position in the table of contents (`""` for
    /// top-level pages).
    pub toc_path: String,
    /// Absolute path of the source file.
    pub source_path: PathBuf,
    /// Digest of the source content at scan time.
    pub content_hash: ContentHash,
    /// Source modification time (seconds since Unix epoch). Informational
    /// only, never used to decide whether a page changed.
    pub source_mtime: f64,
    /// When the page was last rendered successfully, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rendered_at: Option<f64>,
}

impl PageRecord {
    /// Build a record for a source file at `rel_path` under the project root.
    #[must_use]
    pub fn from_source(
        rel_path: &Path,
        source_path: PathBuf,
        content_hash: ContentHash,
        source_mtime: f64,
    ) -> Self {
        let parts = path_components(rel_path);
        let stem = rel_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dirs = &parts[..parts.len().saturating_sub(1)];

        let (title, toc_path) = if stem == "index" {
            // Directory index: titled after its folder; the top-level index
            // has neither title nor position
            let title = dirs.last().cloned().unwrap_or_default();
            (title, dirs.join("/"))
        } else if dirs.is_empty() {
            (stem.clone(), String::new())
        } else {
            (stem.clone(), format!("{}/{stem}", dirs.join("/")))
        };

        Self {
            id: page_id_from_path(rel_path),
            title,
            toc_path,
            source_path,
            content_hash,
            source_mtime,
            last_rendered_at: None,
        }
    }

    /// Copy of this record marked as rendered at `rendered_at`.
    #[must_use]
    pub fn with_rendered_at(&self, rendered_at: Option<f64>) -> Self {
        Self {
            last_rendered_at: rendered_at,
            ..self.clone()
        }
    }
}

/// Derive a [`PageId`] from a path relative to the project root.
///
/// Examples:
/// - `index.html` -> `""`
/// - `guide.html` -> `"guide"`
/// - `domain/index.html` -> `"domain"`
/// - `domain/setup.html` -> `"domain/setup"`
#[must_use]
pub fn page_id_from_path(rel_path: &Path) -> PageId {
    let parts = path_components(rel_path);
    let Some((_, dirs)) = parts.split_last() else {
        return PageId(String::new());
    };
    let stem = rel_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let id = match (dirs.is_empty(), stem == "index") {
        (true, true) => String::new(),
        (false, true) => dirs.join("/"),
        (true, false) => stem,
        (false, false) => format!("{}/{stem}", dirs.join("/")),
    };
    PageId(id)
}

/// Normal components of a relative path as strings (platform separators
/// are irrelevant after this point).
fn path_components(rel_path: &Path) -> Vec<String> {
    rel_path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Convert a system time to seconds since the Unix epoch.
pub(crate) fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// Current time in seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> f64 {
    unix_seconds(SystemTime::now())
}
