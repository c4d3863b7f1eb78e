//! Page discovery and content hashing for Folio.
//!
//! This crate turns a source directory into an immutable [`ProjectSnapshot`]:
//!
//! - [`ContentHash`]: SHA-256 digest of a page's source bytes
//! - [`PageId`] / [`PageRecord`]: stable page identity and per-page metadata
//! - [`ProjectScanner`]: walks the source root and matches the page glob
//! - [`SourceWatcher`]: debounced change notification for the source root
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use folio_source::ProjectScanner;
//!
//! let scanner = ProjectScanner::new("source", "**/*.html")?;
//! let outcome = scanner.scan()?;
//! for page in outcome.snapshot.iter() {
//!     println!("{} ({})", page.id, page.content_hash);
//! }
//! # Ok(())
//! # }
//! ```

mod debouncer;
mod error;
mod event;
mod hash;
mod natural;
mod page;
mod scanner;
mod snapshot;
mod watch;

pub use error::{ScanError, ScanWarning, WatchError};
pub use event::{SourceEvent, SourceEventKind, SourceEventReceiver, WatchHandle};
pub use hash::ContentHash;
pub use natural::natural_cmp;
pub use page::{PageId, PageRecord, page_id_from_path, unix_now};
pub use scanner::{DEFAULT_PATTERN, ProjectScanner, ScanOutcome};
pub use snapshot::ProjectSnapshot;
pub use watch::SourceWatcher;
