//! The rendering capability supplied by the embedding application.

use folio_source::PageRecord;

/// Error type renderers report. Opaque to the engine.
pub type RendererError = Box<dyn std::error::Error + Send + Sync>;

/// Turns page sources into rendered output.
///
/// A rebuild pass calls [`build`](Self::build) once with the complete,
/// ordered page list, then [`render`](Self::render) for each page that needs
/// it. Anything `build` prepares (navigation, cross-links) is kept by the
/// renderer itself until the next `build`.
///
/// The engine never calls a renderer from two threads at once.
pub trait Renderer: Send {
    /// Prepare shared context for the pages of this pass.
    fn build(&mut self, pages: &[PageRecord]) -> Result<(), RendererError>;

    /// Render one page from its source text.
    fn render(&mut self, source: &str, page: &PageRecord) -> Result<String, RendererError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn build(&mut self, pages: &[PageRecord]) -> Result<(), RendererError> {
        (**self).build(pages)
    }

    fn render(&mut self, source: &str, page: &PageRecord) -> Result<String, RendererError> {
        (**self).render(source, page)
    }
}

/// Renderer that returns each page's source unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    fn build(&mut self, _pages: &[PageRecord]) -> Result<(), RendererError> {
        Ok(())
    }

    fn render(&mut self, source: &str, _page: &PageRecord) -> Result<String, RendererError> {
        Ok(source.to_owned())
    }
}
