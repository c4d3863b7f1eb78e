//! Incremental rebuilds and rendered content serving for Folio.
//!
//! This crate provides:
//! - [`diff`]: change detection between two project snapshots
//! - [`Renderer`]: the pluggable rendering capability
//! - [`RenderPipeline`]: drives one renderer over an affected set
//! - [`ContentStore`] / [`BuildDir`]: in-memory and on-disk rendered output
//! - [`RebuildOrchestrator`]: single-flight rebuild passes
//! - [`LiveProject`]: the read-side facade
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use folio_site::{LiveProject, PassthroughRenderer, ProjectConfig};
//!
//! let config = ProjectConfig::new("source", ".folio/build");
//! let project = LiveProject::open(config, PassthroughRenderer)?;
//!
//! if let Some(html) = project.get_rendered_content("chapter 1/1.1. Welcome")? {
//!     println!("{html}");
//! }
//! # Ok(())
//! # }
//! ```

mod diff;
mod error;
mod live;
mod orchestrator;
mod persist;
mod pipeline;
mod renderer;
mod store;
#[cfg(test)]
mod testing;

pub use diff::{AffectedSet, diff};
pub use error::{LiveError, PageFailure, PersistError, RebuildError, RenderErrorKind};
pub use live::{FreshnessPolicy, LiveProject, ProjectConfig, ProjectWatch};
pub use orchestrator::{CheckOutcome, Phase, RebuildOrchestrator, RebuildReport};
pub use persist::{BuildDir, LoadedState};
pub use pipeline::{PipelineOutput, RenderPipeline};
pub use renderer::{PassthroughRenderer, Renderer, RendererError};
pub use store::{ContentStore, RenderedEntry, StoreState};

pub use folio_source::{PageId, PageRecord, ProjectSnapshot};
