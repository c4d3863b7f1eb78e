//! Shared fixtures for unit tests.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use folio_source::PageRecord;

use crate::renderer::{Renderer, RendererError};

/// Call counters shared between a test and a [`CountingRenderer`] it gave away.
#[derive(Clone, Default)]
pub(crate) struct Calls {
    builds: Arc<AtomicUsize>,
    renders: Arc<Mutex<Vec<String>>>,
}

impl Calls {
    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Identifiers passed to `render`, in call order.
    pub(crate) fn renders(&self) -> Vec<String> {
        self.renders.lock().unwrap().clone()
    }

    pub(crate) fn render_count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }

    pub(crate) fn reset(&self) {
        self.builds.store(0, Ordering::SeqCst);
        self.renders.lock().unwrap().clear();
    }
}

/// Wraps each page in `<main>` and counts calls. Sources containing `FAIL`
/// are rejected.
#[derive(Default)]
pub(crate) struct CountingRenderer {
    calls: Calls,
    fail_build: Arc<AtomicBool>,
    /// Build attempts to let through before blocking, and the release.
    gate: Option<(usize, mpsc::Receiver<()>)>,
}

impl CountingRenderer {
    pub(crate) fn new() -> (Self, Calls) {
        let renderer = Self::default();
        let calls = renderer.calls.clone();
        (renderer, calls)
    }

    /// The first `build` call blocks until the returned sender fires.
    pub(crate) fn gated() -> (Self, Calls, mpsc::Sender<()>) {
        Self::gated_after(0)
    }

    /// Like [`gated`](Self::gated), but `skip` build attempts pass freely
    /// before one blocks.
    pub(crate) fn gated_after(skip: usize) -> (Self, Calls, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let (mut renderer, calls) = Self::new();
        renderer.gate = Some((skip, rx));
        (renderer, calls, tx)
    }

    /// Switch that makes `build` fail while set.
    pub(crate) fn build_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail_build)
    }
}

impl Renderer for CountingRenderer {
    fn build(&mut self, _pages: &[PageRecord]) -> Result<(), RendererError> {
        match self.gate.take() {
            Some((0, gate)) => {
                let _ = gate.recv();
            }
            Some((skip, gate)) => self.gate = Some((skip - 1, gate)),
            None => {}
        }
        if self.fail_build.load(Ordering::SeqCst) {
            return Err("template directory missing".into());
        }
        self.calls.builds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn render(&mut self, source: &str, page: &PageRecord) -> Result<String, RendererError> {
        self.calls.renders.lock().unwrap().push(page.id.to_string());
        if source.contains("FAIL") {
            return Err("unbalanced tags".into());
        }
        Ok(format!("<main>{source}</main>"))
    }
}

pub(crate) fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
