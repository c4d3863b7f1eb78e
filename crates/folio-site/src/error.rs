//! Error types for rebuild passes and the live project facade.

use std::path::PathBuf;

use folio_source::{PageId, ScanError, WatchError};

use crate::renderer::RendererError;

/// Why a single page could not be rendered.
#[derive(Debug, thiserror::Error)]
pub enum RenderErrorKind {
    /// Source file disappeared or became unreadable after the scan.
    #[error("cannot read source: {0}")]
    Read(#[source] std::io::Error),
    /// Source bytes are not valid UTF-8.
    #[error("source is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),
    /// The renderer rejected the page.
    #[error("renderer failed: {0}")]
    Renderer(#[source] RendererError),
}

/// A page whose render failed. Isolated: sibling pages are unaffected and the
/// page keeps its previous output, if any.
#[derive(Debug, thiserror::Error)]
#[error("Page \"{id}\" not rendered: {kind}")]
pub struct PageFailure {
    pub id: PageId,
    #[source]
    pub kind: RenderErrorKind,
}

/// Failure reading or writing the build directory.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Build directory I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid build state at {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure that aborts a whole rebuild pass.
///
/// The content store is left exactly as it was before the pass.
#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Renderer build step failed: {0}")]
    BuildSetup(#[source] RendererError),
    #[error("Failed to persist rendered output: {0}")]
    Persist(#[from] PersistError),
}

/// Error from a [`LiveProject`](crate::LiveProject) operation.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    /// The project configuration cannot be used (bad page pattern).
    #[error("Invalid project configuration: {0}")]
    Config(#[source] ScanError),
    /// A freshness check failed and there is no earlier state to serve.
    #[error(transparent)]
    Rebuild(#[from] RebuildError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Watch(#[from] WatchError),
}
