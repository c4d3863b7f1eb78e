//! Scan and watch error types.

use std::fmt;
use std::path::PathBuf;

use crate::page::PageId;

/// Error that aborts a whole scan.
///
/// Previously persisted state is never touched when a scan fails.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Source root does not exist.
    #[error("Source root not found: {}", .0.display())]
    RootMissing(PathBuf),
    /// Source root exists but is not a directory.
    #[error("Source root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    /// Source root could not be listed.
    #[error("Source root unreadable: {}: {source}", .path.display())]
    RootUnreadable {
        /// Root directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Page glob failed to parse.
    #[error("Invalid page pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Parser error.
        #[source]
        source: glob::PatternError,
    },
    /// Files matched the pattern but none of them could be read.
    #[error("None of the {matched} matching files under {} could be read", .root.display())]
    NoReadablePages {
        /// Source root.
        root: PathBuf,
        /// Number of files that matched the pattern.
        matched: usize,
    },
}

/// Non-fatal problem recorded during a scan.
///
/// The affected file or directory is left out of the snapshot; the rest of
/// the scan carries on.
#[derive(Debug)]
pub enum ScanWarning {
    /// A matching file could not be read or stat'ed.
    UnreadableFile {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        error: std::io::Error,
    },
    /// A subdirectory could not be listed.
    UnreadableDir {
        /// Path of the directory.
        path: PathBuf,
        /// Underlying I/O error.
        error: std::io::Error,
    },
    /// Two files map to the same page identifier; the later one is ignored.
    DuplicateId {
        /// Identifier both files map to.
        id: PageId,
        /// File that was kept.
        kept: PathBuf,
        /// File that was skipped.
        skipped: PathBuf,
    },
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableFile { path, error } => {
                write!(f, "skipped unreadable file {}: {error}", path.display())
            }
            Self::UnreadableDir { path, error } => {
                write!(f, "skipped unreadable directory {}: {error}", path.display())
            }
            Self::DuplicateId { id, kept, skipped } => write!(
                f,
                "skipped {} (page \"{id}\" already provided by {})",
                skipped.display(),
                kept.display()
            ),
        }
    }
}

/// Error starting a source watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The platform watcher could not be created or attached.
    #[error("Failed to watch {}: {source}", .path.display())]
    Notify {
        /// Watched directory.
        path: PathBuf,
        /// Underlying notify error.
        #[source]
        source: notify::Error,
    },
    /// Watch pattern failed to parse.
    #[error("Invalid watch pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Parser error.
        #[source]
        source: glob::PatternError,
    },
}
