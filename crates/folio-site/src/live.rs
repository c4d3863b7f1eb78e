//! Read-side facade: fresh rendered content on demand.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use folio_source::{
    DEFAULT_PATTERN, PageId, PageRecord, ProjectScanner, ScanWarning, SourceEventReceiver,
    SourceWatcher, WatchHandle,
};

use crate::diff::AffectedSet;
use crate::error::{LiveError, PersistError, RebuildError};
use crate::orchestrator::{CheckOutcome, RebuildOrchestrator, RebuildReport};
use crate::persist::BuildDir;
use crate::renderer::Renderer;
use crate::store::{ContentStore, RenderedEntry, StoreState};

/// How reads bring content up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Every read waits for a pass that saw the source as it was when the
    /// read started.
    #[default]
    Blocking,
    /// Reads return current content at once and queue a pass in the
    /// background. Until a pass has succeeded since the project was opened,
    /// reads still wait: output restored from disk may describe pages that
    /// no longer exist.
    NonBlocking,
}

/// Configuration for [`LiveProject`].
#[derive(Clone, Debug)]
pub struct ProjectConfig {
    /// Directory holding page sources.
    pub root_path: PathBuf,
    /// Directory for rendered output and rebuild state.
    pub build_path: PathBuf,
    /// Glob selecting page sources, relative to `root_path`.
    pub glob: String,
    /// Extension of rendered output files, without the dot.
    pub output_extension: String,
    pub policy: FreshnessPolicy,
    /// Re-render pages whose last render failed on every pass.
    pub retry_failed: bool,
}

impl ProjectConfig {
    /// Configuration with default glob, extension and policy.
    pub fn new(root_path: impl Into<PathBuf>, build_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            build_path: build_path.into(),
            glob: DEFAULT_PATTERN.to_owned(),
            output_extension: "html".to_owned(),
            policy: FreshnessPolicy::default(),
            retry_failed: false,
        }
    }
}

/// A project whose rendered pages are kept in step with their sources.
///
/// Cheap to share between threads; every method takes `&self`.
pub struct LiveProject {
    orchestrator: Arc<RebuildOrchestrator>,
    policy: FreshnessPolicy,
}

impl LiveProject {
    /// Open a project, restoring rendered output from a previous run.
    ///
    /// Nothing is scanned or rendered until the first read or refresh.
    ///
    /// # Errors
    ///
    /// Fails on an invalid page glob or an unusable build directory. A
    /// corrupt state file is not an error: the project starts from scratch.
    pub fn open(
        config: ProjectConfig,
        renderer: impl Renderer + 'static,
    ) -> Result<Self, LiveError> {
        let scanner =
            ProjectScanner::new(&config.root_path, &config.glob).map_err(LiveError::Config)?;
        let build_dir = BuildDir::open(&config.build_path, &config.output_extension)?;

        let state = match build_dir.load() {
            Ok(Some(loaded)) => {
                tracing::info!(
                    build = %config.build_path.display(),
                    pages = loaded.snapshot.len(),
                    rendered = loaded.entries.len(),
                    "Restored previous build"
                );
                StoreState::from(loaded)
            }
            Ok(None) => StoreState::default(),
            Err(e @ PersistError::Json { .. }) => {
                tracing::warn!(error = %e, "Discarding unreadable build state");
                StoreState::default()
            }
            Err(e) => return Err(e.into()),
        };

        let orchestrator = RebuildOrchestrator::new(
            scanner,
            Arc::new(ContentStore::with_state(state)),
            build_dir,
            Box::new(renderer),
        )
        .with_retry_failed(config.retry_failed);

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            policy: config.policy,
        })
    }

    /// Rendered content for a page, after a freshness check.
    ///
    /// `title` is a page identifier (`"chapter 1/1.1. Welcome"`, `""` for
    /// the root page). If no page has that identifier but exactly one page
    /// has it as display title, that page is served. Returns `None` for
    /// unknown pages, removed pages and pages that never rendered.
    ///
    /// # Errors
    ///
    /// Only when the freshness check fails and nothing was ever built; with
    /// earlier state available the last good content is served instead.
    pub fn get_rendered_content(&self, title: &str) -> Result<Option<String>, LiveError> {
        self.ensure_fresh()?;
        Ok(self.rendered_entry(title).map(|entry| entry.content.clone()))
    }

    /// Look up rendered output without a freshness check.
    #[must_use]
    pub fn rendered_entry(&self, title: &str) -> Option<Arc<RenderedEntry>> {
        let state = self.orchestrator.store().state();
        if let Some(entry) = state.get(title) {
            return Some(Arc::clone(entry));
        }

        let snapshot = state.snapshot.as_deref()?;
        if snapshot.contains(title) {
            return None;
        }
        let mut by_title = snapshot.find_by_title(title);
        match (by_title.next(), by_title.next()) {
            (Some(page), None) => state.get(page.id.as_str()).cloned(),
            _ => None,
        }
    }

    /// Run a freshness check now, waiting for it regardless of policy.
    pub fn refresh(&self) -> Result<CheckOutcome, LiveError> {
        Ok(self.orchestrator.check()?)
    }

    /// Render every page again.
    pub fn rebuild_all(&self) -> Result<RebuildReport, LiveError> {
        Ok(self.orchestrator.rebuild_all()?)
    }

    /// Drop the output of one page so that the next read renders it again.
    /// Returns whether the page was known.
    pub fn invalidate(&self, id: &str) -> Result<bool, LiveError> {
        Ok(self.orchestrator.invalidate(id)?)
    }

    /// What the next freshness check would do, without rendering.
    pub fn pending_changes(&self) -> Result<(AffectedSet, Vec<ScanWarning>), LiveError> {
        self.orchestrator
            .pending_changes()
            .map_err(|e| LiveError::Rebuild(RebuildError::Scan(e)))
    }

    /// Pages of the last completed pass, in natural order.
    #[must_use]
    pub fn pages(&self) -> Vec<PageRecord> {
        self.orchestrator
            .store()
            .snapshot()
            .map(|snapshot| snapshot.records().to_vec())
            .unwrap_or_default()
    }

    /// Pages whose last render attempt failed.
    #[must_use]
    pub fn failed_pages(&self) -> Vec<PageId> {
        self.orchestrator
            .store()
            .state()
            .failed
            .iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<RebuildOrchestrator> {
        &self.orchestrator
    }

    /// Refresh whenever page sources change.
    ///
    /// A burst of changes settles for `debounce` and then triggers one
    /// blocking freshness check on a background thread; `on_pass` receives
    /// each result. Stops when the returned [`ProjectWatch`] is dropped.
    ///
    /// # Errors
    ///
    /// Fails if the source root cannot be watched.
    pub fn watch<F>(&self, debounce: Duration, mut on_pass: F) -> Result<ProjectWatch, LiveError>
    where
        F: FnMut(Result<CheckOutcome, RebuildError>) + Send + 'static,
    {
        let scanner = self.orchestrator.scanner();
        let (events, handle) = SourceWatcher::start(scanner.root(), scanner.pattern(), debounce)?;

        let orchestrator = Arc::clone(&self.orchestrator);
        let thread = thread::spawn(move || refresh_on_events(&orchestrator, &events, &mut on_pass));

        Ok(ProjectWatch {
            handle: Some(handle),
            thread: Some(thread),
        })
    }

    fn ensure_fresh(&self) -> Result<(), LiveError> {
        let has_snapshot = self.orchestrator.store().snapshot().is_some();

        let result = match self.policy {
            FreshnessPolicy::NonBlocking if self.orchestrator.has_completed_pass() => {
                self.orchestrator.schedule();
                return Ok(());
            }
            FreshnessPolicy::Blocking | FreshnessPolicy::NonBlocking => self.orchestrator.check(),
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) if has_snapshot => {
                tracing::warn!(error = %e, "Freshness check failed, serving last good content");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Run one freshness check per burst of events until the sender goes away.
fn refresh_on_events<F>(
    orchestrator: &RebuildOrchestrator,
    events: &SourceEventReceiver,
    on_pass: &mut F,
) where
    F: FnMut(Result<CheckOutcome, RebuildError>),
{
    while let Some(event) = events.recv() {
        let coalesced = events.drain().len();
        tracing::debug!(path = %event.path.display(), coalesced, "Source changed");
        on_pass(orchestrator.check());
    }
}

/// Running source watch started by [`LiveProject::watch`].
pub struct ProjectWatch {
    handle: Option<WatchHandle>,
    thread: Option<JoinHandle<()>>,
}

impl ProjectWatch {
    /// Stop watching and wait for a pass in progress to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.handle.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ProjectWatch {
    fn drop(&mut self) {
        self.shutdown();
    }
}
