//! Rebuild passes: scan, diff, render, persist, swap.
//!
//! # Architecture
//!
//! The renderer lives inside a `Mutex`, and a pass holds that lock from
//! scan to swap, so at most one pass is ever in flight and the renderer is
//! never used concurrently. Passes are numbered as they start, and the
//! number of the latest pass that succeeded is kept beside the counter. A
//! blocking request that queued behind other passes returns without
//! scanning again only when a pass numbered after its arrival succeeded:
//! that pass saw every change the request could care about. A failed pass
//! covers nobody, so each waiter behind it runs its own pass and gets its
//! own result.
//!
//! Non-blocking requests never touch the lock. They set a `scheduled` flag
//! and hand the pass to a background thread; while the flag is set further
//! requests are no-ops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use folio_source::{
    PageId, PageRecord, ProjectScanner, ProjectSnapshot, ScanError, ScanOutcome, ScanWarning,
    natural_cmp,
};

use crate::diff::{AffectedSet, diff};
use crate::error::{PageFailure, RebuildError};
use crate::persist::BuildDir;
use crate::pipeline::RenderPipeline;
use crate::renderer::Renderer;
use crate::store::{ContentStore, RenderedEntry, StoreState};

/// Where the orchestrator currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Scanning = 1,
    Diffing = 2,
    Rendering = 3,
    Persisting = 4,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Scanning,
            2 => Self::Diffing,
            3 => Self::Rendering,
            4 => Self::Persisting,
            _ => Self::Idle,
        }
    }
}

/// Summary of one completed pass.
#[derive(Debug, Default)]
pub struct RebuildReport {
    pub affected: AffectedSet,
    /// Pages rendered successfully, in natural order.
    pub rendered: Vec<PageId>,
    pub failures: Vec<PageFailure>,
    /// Pages whose output was removed.
    pub evicted: Vec<PageId>,
    /// Files skipped during the scan.
    pub warnings: Vec<ScanWarning>,
    pub elapsed: Duration,
}

impl RebuildReport {
    /// True when the pass found nothing to do.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.affected.is_empty() && self.evicted.is_empty()
    }
}

/// Result of a freshness check.
#[derive(Debug)]
pub enum CheckOutcome {
    /// This request ran a pass.
    Completed(RebuildReport),
    /// A pass that started after this request arrived already covered it.
    Coalesced,
    /// A background pass is queued; current content was left in place.
    Scheduled,
}

/// Runs rebuild passes against a [`ContentStore`].
pub struct RebuildOrchestrator {
    scanner: ProjectScanner,
    store: Arc<ContentStore>,
    build_dir: BuildDir,
    renderer: Mutex<Box<dyn Renderer>>,
    retry_failed: bool,
    phase: AtomicU8,
    passes_started: AtomicU64,
    /// Number of the latest pass that succeeded; zero before any.
    last_success: AtomicU64,
    scheduled: AtomicBool,
}

impl RebuildOrchestrator {
    pub fn new(
        scanner: ProjectScanner,
        store: Arc<ContentStore>,
        build_dir: BuildDir,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            scanner,
            store,
            build_dir,
            renderer: Mutex::new(renderer),
            retry_failed: false,
            phase: AtomicU8::new(Phase::Idle as u8),
            passes_started: AtomicU64::new(0),
            last_success: AtomicU64::new(0),
            scheduled: AtomicBool::new(false),
        }
    }

    /// Re-render pages whose last render failed even if their source is
    /// unchanged.
    #[must_use]
    pub fn with_retry_failed(mut self, retry_failed: bool) -> Self {
        self.retry_failed = retry_failed;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    #[must_use]
    pub fn scanner(&self) -> &ProjectScanner {
        &self.scanner
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// True once a pass in this process has reconciled the store with the
    /// source tree.
    #[must_use]
    pub fn has_completed_pass(&self) -> bool {
        self.last_success.load(Ordering::Acquire) > 0
    }

    /// Bring the store up to date, waiting for any pass in flight.
    ///
    /// # Errors
    ///
    /// Returns [`RebuildError`] if the pass aborted. The store keeps its
    /// previous content in that case.
    pub fn check(&self) -> Result<CheckOutcome, RebuildError> {
        let arrived = self.passes_started.load(Ordering::Acquire);
        let mut renderer = self.lock_renderer();
        if self.last_success.load(Ordering::Acquire) > arrived {
            tracing::debug!("Freshness check covered by a concurrent pass");
            return Ok(CheckOutcome::Coalesced);
        }
        self.run_pass(&mut **renderer, false)
            .map(CheckOutcome::Completed)
    }

    /// Queue a pass on a background thread and return immediately.
    pub fn schedule(self: &Arc<Self>) -> CheckOutcome {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return CheckOutcome::Scheduled;
        }

        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("folio-rebuild".to_owned())
            .spawn(move || {
                let mut renderer = this.lock_renderer();
                // Requests from here on need a pass that scans after them
                this.scheduled.store(false, Ordering::Release);
                if let Err(e) = this.run_pass(&mut **renderer, false) {
                    tracing::warn!(error = %e, "Background rebuild failed");
                }
            });

        if let Err(e) = spawned {
            self.scheduled.store(false, Ordering::Release);
            tracing::warn!(error = %e, "Failed to start background rebuild");
        }
        CheckOutcome::Scheduled
    }

    /// Render every page again, ignoring the previous snapshot.
    ///
    /// # Errors
    ///
    /// Same as [`check`](Self::check).
    pub fn rebuild_all(&self) -> Result<RebuildReport, RebuildError> {
        let mut renderer = self.lock_renderer();
        self.run_pass(&mut **renderer, true)
    }

    /// Drop the output of `id` so that the next pass renders it again.
    /// Waits for any pass in flight. Returns whether the page was known.
    ///
    /// # Errors
    ///
    /// Returns [`RebuildError::Persist`] if the build directory could not be
    /// updated. The in-memory store has already forgotten the page then, so
    /// the next pass still renders it.
    pub fn invalidate(&self, id: &str) -> Result<bool, RebuildError> {
        let _renderer = self.lock_renderer();
        if !self.store.evict(id) {
            return Ok(false);
        }
        self.build_dir.remove_entry(&PageId::new(id))?;
        let state = self.store.state();
        if let Some(snapshot) = &state.snapshot {
            self.build_dir.write_state(snapshot, &state.failed)?;
        }
        tracing::info!(id, "Page invalidated");
        Ok(true)
    }

    /// Scan and diff against the store without rendering anything.
    ///
    /// # Errors
    ///
    /// Returns the scan error.
    pub fn pending_changes(&self) -> Result<(AffectedSet, Vec<ScanWarning>), ScanError> {
        let ScanOutcome { snapshot, warnings } = self.scanner.scan()?;
        let current = self.store.state();
        let affected = self.affected(&current, &snapshot, false);
        Ok((affected, warnings))
    }

    fn lock_renderer(&self) -> MutexGuard<'_, Box<dyn Renderer>> {
        self.renderer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
        tracing::debug!(?phase, "Rebuild phase");
    }

    fn affected(
        &self,
        current: &StoreState,
        snapshot: &ProjectSnapshot,
        full: bool,
    ) -> AffectedSet {
        let previous = current.snapshot.as_deref();
        let mut affected = diff(if full { None } else { previous }, snapshot);

        if full {
            if let Some(previous) = previous {
                affected.removed = diff(Some(previous), snapshot).removed;
            }
        } else if self.retry_failed {
            affected.retried = current
                .failed
                .iter()
                .filter(|id| {
                    snapshot.contains(id.as_str())
                        && !affected.added.contains(id)
                        && !affected.modified.contains(id)
                })
                .cloned()
                .collect();
            affected
                .retried
                .sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));
        }
        affected
    }

    fn run_pass(
        &self,
        renderer: &mut dyn Renderer,
        full: bool,
    ) -> Result<RebuildReport, RebuildError> {
        let pass = self.passes_started.fetch_add(1, Ordering::AcqRel) + 1;
        let report = self.pass(pass, renderer, full)?;
        self.last_success.fetch_max(pass, Ordering::AcqRel);
        Ok(report)
    }

    fn pass(
        &self,
        pass: u64,
        renderer: &mut dyn Renderer,
        full: bool,
    ) -> Result<RebuildReport, RebuildError> {
        let started = Instant::now();
        let _idle = IdleOnDrop(&self.phase);

        self.enter(Phase::Scanning);
        let ScanOutcome { snapshot, warnings } = self.scanner.scan().inspect_err(|e| {
            tracing::warn!(pass, error = %e, "Scan failed, keeping current content");
        })?;

        self.enter(Phase::Diffing);
        let current = self.store.state();
        let affected = self.affected(&current, &snapshot, full);

        // Output left over for pages the snapshot no longer has
        let mut evicted: Vec<PageId> = affected.removed.clone();
        evicted.extend(
            current
                .entries
                .keys()
                .filter(|id| !snapshot.contains(id.as_str()) && !affected.removed.contains(id))
                .cloned(),
        );
        evicted.sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));

        if affected.is_empty() && evicted.is_empty() {
            if current.snapshot.is_none() {
                // Remember an empty first scan so reads stop treating the
                // project as never built
                self.enter(Phase::Persisting);
                self.build_dir.write_state(&snapshot, &current.failed)?;
                self.store
                    .swap(current.entries.clone(), snapshot, current.failed.clone());
            }
            tracing::debug!(pass, "Project unchanged");
            return Ok(RebuildReport {
                warnings,
                elapsed: started.elapsed(),
                ..RebuildReport::default()
            });
        }

        self.enter(Phase::Rendering);
        let output = RenderPipeline::new(renderer)
            .run(&snapshot, &affected)
            .map_err(|e| {
                tracing::warn!(pass, error = %e, "Renderer build failed, keeping current content");
                RebuildError::BuildSetup(e)
            })?;

        self.enter(Phase::Persisting);
        let rendered: HashMap<&PageId, &RenderedEntry> =
            output.rendered.iter().map(|e| (&e.id, e)).collect();
        let next_snapshot = snapshot.map(|record| {
            next_record(record, rendered.get(&record.id).copied(), current.snapshot.as_deref())
        });

        let mut failed = current.failed.clone();
        for id in evicted.iter().chain(rendered.keys().copied()) {
            failed.remove(id);
        }
        failed.extend(output.failures.iter().map(|f| f.id.clone()));

        let mut entries = current.entries.clone();
        for entry in &output.rendered {
            self.build_dir.write_entry(entry)?;
        }
        for id in &evicted {
            self.build_dir.remove_entry(id)?;
            entries.remove(id);
        }
        self.build_dir.write_state(&next_snapshot, &failed)?;

        let rendered_ids: Vec<PageId> = output.rendered.iter().map(|e| e.id.clone()).collect();
        entries.extend(
            output
                .rendered
                .into_iter()
                .map(|entry| (entry.id.clone(), Arc::new(entry))),
        );
        self.store.swap(entries, next_snapshot, failed);

        let report = RebuildReport {
            affected,
            rendered: rendered_ids,
            failures: output.failures,
            evicted,
            warnings,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            pass,
            added = report.affected.added.len(),
            modified = report.affected.modified.len(),
            removed = report.evicted.len(),
            rendered = report.rendered.len(),
            failed = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "Rebuild pass complete"
        );
        Ok(report)
    }
}

/// Record to keep in the next snapshot.
///
/// A freshly rendered page takes the hash of the source actually rendered,
/// which may be newer than the scanned one. Other pages carry their last
/// render time forward.
fn next_record(
    record: &PageRecord,
    rendered: Option<&RenderedEntry>,
    previous: Option<&ProjectSnapshot>,
) -> PageRecord {
    match rendered {
        Some(entry) => PageRecord {
            content_hash: entry.source_hash_at_render.clone(),
            last_rendered_at: Some(entry.rendered_at),
            ..record.clone()
        },
        None => record.with_rendered_at(
            previous
                .and_then(|s| s.get(record.id.as_str()))
                .and_then(|r| r.last_rendered_at),
        ),
    }
}

/// Returns the phase to `Idle` however the pass ends.
struct IdleOnDrop<'a>(&'a AtomicU8);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(Phase::Idle as u8, Ordering::Release);
        tracing::debug!(phase = ?Phase::Idle, "Rebuild phase");
    }
}
