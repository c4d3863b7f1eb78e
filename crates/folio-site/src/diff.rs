//! Change detection between project snapshots.
//!
//! Only content hashes decide whether a page changed. A page whose source
//! was merely touched keeps its hash and is left out of the affected set, so
//! it costs no rendering work.

use folio_source::{PageId, ProjectSnapshot, natural_cmp};

/// Pages a rebuild pass has to deal with, each list in natural order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AffectedSet {
    /// New pages.
    pub added: Vec<PageId>,
    /// Pages whose content hash changed.
    pub modified: Vec<PageId>,
    /// Pages no longer present in the source tree.
    pub removed: Vec<PageId>,
    /// Unchanged pages queued again because their last render failed.
    pub retried: Vec<PageId>,
}

impl AffectedSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.removed.is_empty()
            && self.retried.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len() + self.retried.len()
    }

    /// Pages that need a render call, in natural order.
    #[must_use]
    pub fn to_render(&self) -> Vec<PageId> {
        let mut ids: Vec<PageId> = self
            .added
            .iter()
            .chain(&self.modified)
            .chain(&self.retried)
            .cloned()
            .collect();
        ids.sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));
        ids
    }
}

/// Compare the last known snapshot with a fresh one.
///
/// Without a previous snapshot every page counts as added.
#[must_use]
pub fn diff(old: Option<&ProjectSnapshot>, new: &ProjectSnapshot) -> AffectedSet {
    let Some(old) = old else {
        return AffectedSet {
            added: new.ids().cloned().collect(),
            ..AffectedSet::default()
        };
    };

    let mut affected = AffectedSet::default();
    for page in new.iter() {
        match old.get(page.id.as_str()) {
            None => affected.added.push(page.id.clone()),
            Some(previous) if previous.content_hash != page.content_hash => {
                affected.modified.push(page.id.clone());
            }
            Some(_) => {}
        }
    }
    affected.removed = old
        .ids()
        .filter(|id| !new.contains(id.as_str()))
        .cloned()
        .collect();
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_source::{ContentHash, PageRecord};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn snapshot(pages: &[(&str, &str, f64)]) -> ProjectSnapshot {
        let records = pages
            .iter()
            .map(|(rel, content, mtime)| {
                PageRecord::from_source(
                    Path::new(rel),
                    Path::new("/src").join(rel),
                    ContentHash::of(content.as_bytes()),
                    *mtime,
                )
            })
            .collect();
        ProjectSnapshot::new(records, 0.0)
    }

    fn ids(list: &[PageId]) -> Vec<&str> {
        list.iter().map(PageId::as_str).collect()
    }

    #[test]
    fn test_no_previous_snapshot_marks_all_added() {
        let new = snapshot(&[("b.html", "B", 1.0), ("a.html", "A", 1.0)]);
        let affected = diff(None, &new);
        assert_eq!(ids(&affected.added), vec!["a", "b"]);
        assert!(affected.modified.is_empty());
        assert!(affected.removed.is_empty());
    }

    #[test]
    fn test_empty_project_has_nothing_affected() {
        let affected = diff(None, &ProjectSnapshot::default());
        assert!(affected.is_empty());
        assert_eq!(affected.len(), 0);
    }

    #[test]
    fn test_identical_snapshots_are_idempotent() {
        let s = snapshot(&[("a.html", "A", 1.0), ("b/index.html", "B", 1.0)]);
        assert!(diff(Some(&s), &s).is_empty());
    }

    #[test]
    fn test_classifies_added_modified_removed() {
        let old = snapshot(&[
            ("keep.html", "same", 1.0),
            ("edit.html", "v1", 1.0),
            ("gone.html", "x", 1.0),
        ]);
        let new = snapshot(&[
            ("keep.html", "same", 1.0),
            ("edit.html", "v2", 1.0),
            ("new.html", "y", 1.0),
        ]);

        let affected = diff(Some(&old), &new);
        assert_eq!(ids(&affected.added), vec!["new"]);
        assert_eq!(ids(&affected.modified), vec!["edit"]);
        assert_eq!(ids(&affected.removed), vec!["gone"]);
        assert_eq!(affected.len(), 3);
    }

    #[test]
    fn test_mtime_alone_is_not_a_change() {
        let old = snapshot(&[("a.html", "A", 100.0)]);
        let new = snapshot(&[("a.html", "A", 999.0)]);
        assert!(diff(Some(&old), &new).is_empty());
    }

    #[test]
    fn test_to_render_is_naturally_ordered() {
        let affected = AffectedSet {
            added: vec![PageId::new("page 10")],
            modified: vec![PageId::new("page 2")],
            removed: vec![PageId::new("page 1")],
            retried: vec![PageId::new("page 3")],
        };
        assert_eq!(ids(&affected.to_render()), vec!["page 2", "page 3", "page 10"]);
    }
}
