//! SVG backend built on resvg.

use crate::renderer::{Backend, RenderError, RenderResult};
use crate::snapshot::PixelBuffer;
use resvg::{tiny_skia, usvg};

/// Parses SVG with usvg and rasterizes with resvg.
///
/// The document is scaled to fit the requested bounds, aspect ratio kept, and
/// centered.
#[derive(Debug, Clone, Default)]
pub struct ResvgBackend;

impl ResvgBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for ResvgBackend {
    type Document = usvg::Tree;

    fn parse(&self, source: &str) -> RenderResult<usvg::Tree> {
        usvg::Tree::from_str(source, &usvg::Options::default())
            .map_err(|e| RenderError::Parse(e.to_string()))
    }

    fn rasterize(&self, tree: &usvg::Tree, width: u32, height: u32) -> RenderResult<PixelBuffer> {
        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(RenderError::Rasterize("SVG has empty dimensions".to_string()));
        }

        let mut pixmap =
            tiny_skia::Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })?;

        let scale = (width as f32 / size.width()).min(height as f32 / size.height());
        let dx = (width as f32 - size.width() * scale) / 2.0;
        let dy = (height as f32 - size.height() * scale) / 2.0;
        let transform = tiny_skia::Transform::from_scale(scale, scale).post_translate(dx, dy);
        resvg::render(tree, transform, &mut pixmap.as_mut());

        PixelBuffer::from_rgba(width, height, pixmap.take())
    }
}
