//! On-disk rendered output.
//!
//! Layout:
//! ```text
//! {build_path}/
//! ├── VERSION                  # Layout version; mismatch discards everything below
//! ├── state.json               # Last snapshot + failed pages (written last)
//! ├── pages/
//! │   └── {id}/index.{ext}     # Rendered output
//! └── meta/
//!     └── {id}/index.json      # {content_hash, rendered_at}
//! ```
//!
//! The root page (`""`) lives directly at `pages/index.{ext}`. `state.json`
//! is replaced by rename, so a crash mid-pass leaves the previous state file
//! intact and the next freshness check renders whatever is missing.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use folio_source::{ContentHash, PageId, ProjectSnapshot};

use crate::error::PersistError;
use crate::store::{RenderedEntry, StoreState};

/// Bumped whenever the layout or file formats change.
const LAYOUT_VERSION: &str = "folio-build-1";

const STATE_FILE: &str = "state.json";

#[derive(Serialize, Deserialize)]
struct StateFile {
    snapshot: ProjectSnapshot,
    #[serde(default)]
    failed: BTreeSet<PageId>,
}

#[derive(Serialize, Deserialize)]
struct MetaFile {
    content_hash: ContentHash,
    rendered_at: f64,
}

/// State recovered from a build directory.
#[derive(Debug)]
pub struct LoadedState {
    /// Snapshot restricted to pages that are either loadable or known to
    /// have failed.
    pub snapshot: ProjectSnapshot,
    pub entries: HashMap<PageId, Arc<RenderedEntry>>,
    pub failed: BTreeSet<PageId>,
    /// Snapshot pages left out because their output was missing.
    pub dropped: Vec<PageId>,
}

impl From<LoadedState> for StoreState {
    fn from(loaded: LoadedState) -> Self {
        Self {
            entries: loaded.entries,
            snapshot: Some(Arc::new(loaded.snapshot)),
            failed: loaded.failed,
        }
    }
}

/// Rendered output and rebuild state under a build directory.
#[derive(Clone, Debug)]
pub struct BuildDir {
    root: PathBuf,
    pages_dir: PathBuf,
    meta_dir: PathBuf,
    extension: String,
}

impl BuildDir {
    /// Open (creating if needed) the build directory at `root`.
    ///
    /// Output files are written with `extension` (without a leading dot).
    /// If the directory was written by a different layout version, its
    /// pages, metadata and state are discarded.
    pub fn open(root: impl Into<PathBuf>, extension: &str) -> Result<Self, PersistError> {
        let root = root.into();
        let build_dir = Self {
            pages_dir: root.join("pages"),
            meta_dir: root.join("meta"),
            root,
            extension: extension.to_owned(),
        };
        build_dir.validate_version()?;
        Ok(build_dir)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the rendered output for `id` is stored.
    #[must_use]
    pub fn page_path(&self, id: &PageId) -> PathBuf {
        id_dir(&self.pages_dir, id).join(format!("index.{}", self.extension))
    }

    fn meta_path(&self, id: &PageId) -> PathBuf {
        id_dir(&self.meta_dir, id).join("index.json")
    }

    fn validate_version(&self) -> Result<(), PersistError> {
        let version_path = self.root.join("VERSION");
        match fs::read_to_string(&version_path) {
            Ok(found) if found.trim() == LAYOUT_VERSION => return Ok(()),
            Ok(found) => {
                tracing::info!(
                    path = %self.root.display(),
                    found = found.trim(),
                    expected = LAYOUT_VERSION,
                    "Build directory layout changed, discarding previous output"
                );
                self.clear()?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Fresh directory, or output from before VERSION was written
                self.clear()?;
            }
            Err(e) => return Err(PersistError::io(version_path, e)),
        }

        fs::create_dir_all(&self.root).map_err(|e| PersistError::io(&self.root, e))?;
        fs::write(&version_path, LAYOUT_VERSION).map_err(|e| PersistError::io(&version_path, e))
    }

    /// Remove everything this type owns. Foreign files are left alone.
    fn clear(&self) -> Result<(), PersistError> {
        for dir in [&self.pages_dir, &self.meta_dir] {
            match fs::remove_dir_all(dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(PersistError::io(dir, e)),
            }
        }
        remove_if_exists(&self.root.join(STATE_FILE))
    }

    /// Write one page's output and metadata.
    pub fn write_entry(&self, entry: &RenderedEntry) -> Result<(), PersistError> {
        let page_path = self.page_path(&entry.id);
        let meta_path = self.meta_path(&entry.id);
        for path in [&page_path, &meta_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
            }
        }

        fs::write(&page_path, &entry.content).map_err(|e| PersistError::io(&page_path, e))?;

        let meta = MetaFile {
            content_hash: entry.source_hash_at_render.clone(),
            rendered_at: entry.rendered_at,
        };
        let json = serde_json::to_vec(&meta).map_err(|source| PersistError::Json {
            path: meta_path.clone(),
            source,
        })?;
        fs::write(&meta_path, json).map_err(|e| PersistError::io(&meta_path, e))
    }

    /// Delete one page's output and metadata.
    pub fn remove_entry(&self, id: &PageId) -> Result<(), PersistError> {
        for (base, path) in [
            (&self.pages_dir, self.page_path(id)),
            (&self.meta_dir, self.meta_path(id)),
        ] {
            remove_if_exists(&path)?;
            prune_empty_dirs(base, &path);
        }
        Ok(())
    }

    /// Replace the state file. Called after every entry of a pass is on disk.
    pub fn write_state(
        &self,
        snapshot: &ProjectSnapshot,
        failed: &BTreeSet<PageId>,
    ) -> Result<(), PersistError> {
        let path = self.root.join(STATE_FILE);
        let tmp = self.root.join(format!("{STATE_FILE}.tmp"));

        let json = serde_json::to_vec(&StateFile {
            snapshot: snapshot.clone(),
            failed: failed.clone(),
        })
        .map_err(|source| PersistError::Json {
            path: path.clone(),
            source,
        })?;

        fs::write(&tmp, json).map_err(|e| PersistError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| PersistError::io(&path, e))
    }

    /// Load the last persisted state, if any.
    ///
    /// Snapshot pages whose output or metadata cannot be loaded are dropped
    /// from the returned snapshot (unless their last render failed), so the
    /// next freshness check treats them as new and renders them again.
    pub fn load(&self) -> Result<Option<LoadedState>, PersistError> {
        let path = self.root.join(STATE_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistError::io(path, e)),
        };
        let state: StateFile =
            serde_json::from_slice(&bytes).map_err(|source| PersistError::Json { path, source })?;

        let mut entries = HashMap::new();
        let mut dropped = Vec::new();
        for record in state.snapshot.iter() {
            match self.read_entry(&record.id) {
                Some(entry) => {
                    entries.insert(record.id.clone(), Arc::new(entry));
                }
                None if state.failed.contains(&record.id) => {}
                None => dropped.push(record.id.clone()),
            }
        }

        let snapshot = if dropped.is_empty() {
            state.snapshot
        } else {
            tracing::warn!(
                count = dropped.len(),
                "Rendered output missing for some pages, they will be rendered again"
            );
            state.snapshot.retain(|r| !dropped.contains(&r.id))
        };

        Ok(Some(LoadedState {
            snapshot,
            entries,
            failed: state.failed,
            dropped,
        }))
    }

    fn read_entry(&self, id: &PageId) -> Option<RenderedEntry> {
        let meta: MetaFile = serde_json::from_slice(&fs::read(self.meta_path(id)).ok()?).ok()?;
        let content = fs::read_to_string(self.page_path(id)).ok()?;
        Some(RenderedEntry {
            id: id.clone(),
            content,
            source_hash_at_render: meta.content_hash,
            rendered_at: meta.rendered_at,
        })
    }
}

/// Directory holding the files for `id` under `base`.
fn id_dir(base: &Path, id: &PageId) -> PathBuf {
    id.as_str()
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |dir, part| dir.join(part))
}

fn remove_if_exists(path: &Path) -> Result<(), PersistError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PersistError::io(path, e)),
    }
}

/// Remove now-empty directories between `file` and `base`.
fn prune_empty_dirs(base: &Path, file: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == base || !current.starts_with(base) || fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}
