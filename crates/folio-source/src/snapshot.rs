//! Immutable record of a project's source tree at one point in time.
//!
//! # Architecture
//!
//! Records are stored in a flat `Vec<PageRecord>` kept in natural order of
//! identifiers, with a `HashMap` index for O(1) lookups by [`PageId`]. The
//! ordered list is what table-of-contents consumers enumerate; the index is
//! what change detection and the read path use.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::natural::natural_cmp;
use crate::page::{PageId, PageRecord};

/// Every discovered page and its digest, captured at `captured_at`.
///
/// Two snapshots are only comparable when produced with the same root and
/// page pattern.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "SnapshotRepr", into = "SnapshotRepr")]
pub struct ProjectSnapshot {
    records: Vec<PageRecord>,
    index: HashMap<PageId, usize>,
    captured_at: f64,
}

/// Serialized form: the index is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct SnapshotRepr {
    captured_at: f64,
    pages: Vec<PageRecord>,
}

impl From<SnapshotRepr> for ProjectSnapshot {
    fn from(repr: SnapshotRepr) -> Self {
        Self::new(repr.pages, repr.captured_at)
    }
}

impl From<ProjectSnapshot> for SnapshotRepr {
    fn from(snapshot: ProjectSnapshot) -> Self {
        Self {
            captured_at: snapshot.captured_at,
            pages: snapshot.records,
        }
    }
}

impl ProjectSnapshot {
    /// Create a snapshot from records.
    ///
    /// Records are sorted into natural identifier order. If two records share
    /// an identifier, the first one wins.
    #[must_use]
    pub fn new(mut records: Vec<PageRecord>, captured_at: f64) -> Self {
        records.sort_by(|a, b| natural_cmp(a.id.as_str(), b.id.as_str()));
        records.dedup_by(|later, earlier| later.id == earlier.id);

        let index = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.id.clone(), i))
            .collect();

        Self {
            records,
            index,
            captured_at,
        }
    }

    /// Look up a page by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PageRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Pages in natural identifier order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &PageRecord> {
        self.records.iter()
    }

    /// Pages as an ordered slice.
    #[must_use]
    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    /// Page identifiers in natural order.
    pub fn ids(&self) -> impl Iterator<Item = &PageId> {
        self.records.iter().map(|r| &r.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// When the snapshot was captured (seconds since Unix epoch).
    #[must_use]
    pub fn captured_at(&self) -> f64 {
        self.captured_at
    }

    /// Pages whose display title equals `title`.
    pub fn find_by_title<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a PageRecord> {
        self.records.iter().filter(move |r| r.title == title)
    }

    /// Derive a new snapshot with some records dropped.
    #[must_use]
    pub fn retain(&self, mut keep: impl FnMut(&PageRecord) -> bool) -> Self {
        let records = self.records.iter().filter(|r| keep(r)).cloned().collect();
        Self::new(records, self.captured_at)
    }

    /// Derive a new snapshot with every record passed through `f`.
    #[must_use]
    pub fn map(&self, f: impl FnMut(&PageRecord) -> PageRecord) -> Self {
        Self::new(self.records.iter().map(f).collect(), self.captured_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ContentHash;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn record(rel: &str, content: &str) -> PageRecord {
        PageRecord::from_source(
            Path::new(rel),
            Path::new("/src").join(rel),
            ContentHash::of(content.as_bytes()),
            1000.0,
        )
    }

    #[test]
    fn test_records_are_naturally_ordered() {
        let snapshot = ProjectSnapshot::new(
            vec![
                record("chapter 10.html", "x"),
                record("chapter 2.html", "x"),
                record("index.html", "x"),
                record("chapter 1/index.html", "x"),
            ],
            0.0,
        );

        let ids: Vec<_> = snapshot.ids().map(PageId::as_str).collect();
        assert_eq!(ids, vec!["", "chapter 1", "chapter 2", "chapter 10"]);
    }

    #[test]
    fn test_get_by_id() {
        let snapshot = ProjectSnapshot::new(vec![record("guide.html", "A")], 0.0);
        assert_eq!(
            snapshot.get("guide").unwrap().content_hash,
            ContentHash::of(b"A")
        );
        assert!(snapshot.get("missing").is_none());
        assert!(snapshot.contains("guide"));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let snapshot = ProjectSnapshot::new(
            vec![record("a.html", "first"), record("a/index.html", "second")],
            0.0,
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a").unwrap().content_hash, ContentHash::of(b"first"));
    }

    #[test]
    fn test_find_by_title() {
        let snapshot = ProjectSnapshot::new(
            vec![record("chapter 2/bruh.html", "x"), record("other.html", "y")],
            0.0,
        );
        let found: Vec<_> = snapshot.find_by_title("bruh").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "chapter 2/bruh");
    }

    #[test]
    fn test_retain_rebuilds_index() {
        let snapshot = ProjectSnapshot::new(
            vec![record("a.html", "x"), record("b.html", "y"), record("c.html", "z")],
            5.0,
        );
        let trimmed = snapshot.retain(|r| r.id.as_str() != "b");
        assert_eq!(trimmed.len(), 2);
        assert!(trimmed.get("c").is_some());
        assert!(trimmed.get("b").is_none());
        assert!((trimmed.captured_at() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serde_round_trip_restores_index() {
        let snapshot = ProjectSnapshot::new(vec![record("docs/guide.html", "A")], 12.5);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: ProjectSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.len(), 1);
        assert_eq!(restored.get("docs/guide"), snapshot.get("docs/guide"));
    }
}
