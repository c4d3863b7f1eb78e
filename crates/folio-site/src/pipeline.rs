//! Drives a [`Renderer`] over the pages of one affected set.

use std::fs;

use folio_source::{ContentHash, PageRecord, ProjectSnapshot, unix_now};

use crate::diff::AffectedSet;
use crate::error::{PageFailure, RenderErrorKind};
use crate::renderer::{Renderer, RendererError};
use crate::store::RenderedEntry;

/// What a pipeline run produced.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    /// Successful renders, in natural order.
    pub rendered: Vec<RenderedEntry>,
    pub failures: Vec<PageFailure>,
}

/// Runs `build` once, then `render` for each page that needs it.
pub struct RenderPipeline<'r> {
    renderer: &'r mut dyn Renderer,
}

impl<'r> RenderPipeline<'r> {
    pub fn new(renderer: &'r mut dyn Renderer) -> Self {
        Self { renderer }
    }

    /// Render the affected pages of `snapshot`.
    ///
    /// Nothing is called on the renderer when `affected` is empty. Each page
    /// source is read again at render time, and the resulting entry records
    /// the hash of the bytes actually rendered.
    ///
    /// # Errors
    ///
    /// Returns the renderer's error if `build` fails; no page is rendered in
    /// that case. Per-page problems are reported in
    /// [`PipelineOutput::failures`] instead.
    pub fn run(
        &mut self,
        snapshot: &ProjectSnapshot,
        affected: &AffectedSet,
    ) -> Result<PipelineOutput, RendererError> {
        let mut output = PipelineOutput::default();
        if affected.is_empty() {
            return Ok(output);
        }

        self.renderer.build(snapshot.records())?;

        for id in affected.to_render() {
            let Some(page) = snapshot.get(id.as_str()) else {
                continue;
            };
            match self.render_page(page) {
                Ok(entry) => {
                    tracing::debug!(page = %entry.id, hash = entry.source_hash_at_render.short(), "Rendered");
                    output.rendered.push(entry);
                }
                Err(kind) => {
                    let failure = PageFailure { id, kind };
                    tracing::warn!(error = %failure, "Render failed");
                    output.failures.push(failure);
                }
            }
        }
        Ok(output)
    }

    fn render_page(&mut self, page: &PageRecord) -> Result<RenderedEntry, RenderErrorKind> {
        let bytes = fs::read(&page.source_path).map_err(RenderErrorKind::Read)?;
        let source_hash = ContentHash::of(&bytes);
        let source = String::from_utf8(bytes).map_err(RenderErrorKind::InvalidUtf8)?;

        let content = self
            .renderer
            .render(&source, page)
            .map_err(RenderErrorKind::Renderer)?;

        Ok(RenderedEntry {
            id: page.id.clone(),
            content,
            source_hash_at_render: source_hash,
            rendered_at: unix_now(),
        })
    }
}
