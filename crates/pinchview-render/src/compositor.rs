//! Per-frame compositing of the live snapshot.

use crate::pipeline::RenderPipeline;
use crate::renderer::{RenderError, RenderResult};
use crate::snapshot::{PixelBuffer, RasterSnapshot};
use kurbo::Affine;
use peniko::Color;
use pinchview_core::{SourceDocument, TransformState};
use std::sync::Arc;

/// Busy ring radius in pixels.
const BUSY_RADIUS: f32 = 16.0;
/// Busy ring stroke width in pixels.
const BUSY_STROKE: f32 = 4.0;

/// What to put on screen this frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Latest published snapshot, if one exists.
    pub snapshot: Option<Arc<RasterSnapshot>>,
    /// Snapshot-to-screen transform.
    pub transform: Affine,
    /// A render is in flight; show a busy indicator.
    pub busy: bool,
}

impl Frame {
    /// Nothing to draw and nothing coming.
    pub fn is_blank(&self) -> bool {
        self.snapshot.is_none() && !self.busy
    }
}

/// Builds frames and paints them in software.
#[derive(Debug, Clone)]
pub struct Compositor {
    background: Color,
    busy_color: Color,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            background: Color::from_rgba8(250, 250, 250, 255),
            busy_color: Color::from_rgba8(59, 130, 246, 255), // Blue
        }
    }
}

impl Compositor {
    pub fn new(background: Color, busy_color: Color) -> Self {
        Self {
            background,
            busy_color,
        }
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Build the frame for this draw tick.
    ///
    /// Kicks off the first render of `document` lazily if nothing was ever
    /// rendered or submitted. Safe to call every frame.
    pub fn compose(
        &self,
        pipeline: &mut RenderPipeline,
        document: Option<&SourceDocument>,
        transform: &TransformState,
    ) -> Frame {
        if let Some(document) = document {
            let untouched = !pipeline.has_snapshot()
                && !pipeline.is_rendering()
                && pipeline.submitted_key() != Some(document.key());
            if untouched {
                log::debug!("First draw of {:?}, starting render", document.key());
                pipeline.set_source(document.clone());
            }
        }

        Frame {
            snapshot: pipeline.snapshot().cloned(),
            transform: transform.affine(),
            busy: pipeline.is_rendering(),
        }
    }

    /// Paint `frame` into `target`: background, snapshot, then busy ring.
    pub fn paint(&self, frame: &Frame, target: &mut PixelBuffer) -> RenderResult<()> {
        let (width, height) = (target.width(), target.height());
        target.fill(to_skia_color(self.background));
        let mut pixmap = target
            .as_pixmap_mut()
            .ok_or(RenderError::Allocation { width, height })?;

        if let Some(snapshot) = &frame.snapshot {
            draw_snapshot(&mut pixmap, snapshot, frame.transform);
        }
        if frame.busy {
            self.draw_busy_indicator(&mut pixmap);
        }
        Ok(())
    }

    fn draw_busy_indicator(&self, pixmap: &mut tiny_skia::PixmapMut<'_>) {
        let cx = pixmap.width() as f32 / 2.0;
        let cy = pixmap.height() as f32 / 2.0;
        let Some(ring) = tiny_skia::PathBuilder::from_circle(cx, cy, BUSY_RADIUS) else {
            return;
        };

        let mut paint = tiny_skia::Paint::default();
        let rgba = self.busy_color.to_rgba8();
        paint.set_color_rgba8(rgba.r, rgba.g, rgba.b, rgba.a);
        paint.anti_alias = true;

        let stroke = tiny_skia::Stroke {
            width: BUSY_STROKE,
            ..tiny_skia::Stroke::default()
        };
        pixmap.stroke_path(&ring, &paint, &stroke, tiny_skia::Transform::identity(), None);
    }
}

/// Draw the snapshot through `transform`, bilinear filtered.
pub(crate) fn draw_snapshot(
    pixmap: &mut tiny_skia::PixmapMut<'_>,
    snapshot: &RasterSnapshot,
    transform: Affine,
) {
    let Some(source) = snapshot.pixels().as_pixmap() else {
        return;
    };
    let paint = tiny_skia::PixmapPaint {
        quality: tiny_skia::FilterQuality::Bilinear,
        ..tiny_skia::PixmapPaint::default()
    };
    pixmap.draw_pixmap(0, 0, source, &paint, to_skia_transform(transform), None);
}

pub(crate) fn to_skia_color(color: Color) -> tiny_skia::Color {
    let rgba = color.to_rgba8();
    tiny_skia::Color::from_rgba8(rgba.r, rgba.g, rgba.b, rgba.a)
}

pub(crate) fn to_skia_transform(affine: Affine) -> tiny_skia::Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    tiny_skia::Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Backend;
    use kurbo::{Point, Size, Vec2};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    /// Solid red raster, counting calls.
    #[derive(Clone, Default)]
    struct SolidBackend {
        calls: Arc<AtomicUsize>,
    }

    impl Backend for SolidBackend {
        type Document = ();

        fn parse(&self, source: &str) -> RenderResult<()> {
            if source.is_empty() {
                return Err(RenderError::Parse("empty".to_string()));
            }
            Ok(())
        }

        fn rasterize(&self, _document: &(), width: u32, height: u32) -> RenderResult<PixelBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut buffer = PixelBuffer::new(width, height)?;
            for pixel in buffer.data_mut().chunks_exact_mut(4) {
                pixel.copy_from_slice(&[255, 0, 0, 255]);
            }
            Ok(buffer)
        }
    }

    fn setup() -> (Compositor, RenderPipeline, SolidBackend) {
        let backend = SolidBackend::default();
        let mut pipeline = RenderPipeline::new(backend.clone()).unwrap();
        pipeline.set_view_size(Size::new(40.0, 40.0));
        (Compositor::default(), pipeline, backend)
    }

    #[test]
    fn test_first_draw_starts_render_and_shows_busy() {
        let (compositor, mut pipeline, _backend) = setup();
        let document = SourceDocument::new("<svg/>");
        let transform = TransformState::new();

        let frame = compositor.compose(&mut pipeline, Some(&document), &transform);
        assert!(frame.busy);
        assert!(frame.snapshot.is_none());
        assert!(!frame.is_blank());
    }

    #[test]
    fn test_repeated_draws_render_once() {
        let (compositor, mut pipeline, backend) = setup();
        let document = SourceDocument::new("<svg/>");
        let transform = TransformState::new();

        for _ in 0..50 {
            compositor.compose(&mut pipeline, Some(&document), &transform);
        }
        pipeline.wait(TIMEOUT);
        for _ in 0..50 {
            let frame = compositor.compose(&mut pipeline, Some(&document), &transform);
            assert!(frame.snapshot.is_some());
            assert!(!frame.busy);
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_document_is_not_retried_every_frame() {
        let (compositor, mut pipeline, backend) = setup();
        let document = SourceDocument::new("");
        let transform = TransformState::new();

        compositor.compose(&mut pipeline, Some(&document), &transform);
        pipeline.wait(TIMEOUT);
        for _ in 0..10 {
            let frame = compositor.compose(&mut pipeline, Some(&document), &transform);
            assert!(frame.is_blank());
        }
        assert_eq!(pipeline.generation(), 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_document_is_blank() {
        let (compositor, mut pipeline, _backend) = setup();
        let frame = compositor.compose(&mut pipeline, None, &TransformState::new());
        assert!(frame.is_blank());
    }

    #[test]
    fn test_paint_applies_transform() {
        let (compositor, mut pipeline, _backend) = setup();
        let document = SourceDocument::new("<svg/>");
        pipeline.set_source(document.clone());
        pipeline.wait(TIMEOUT);

        // Shift the 40x40 red square right by 20 px
        let mut transform = TransformState::new();
        transform.translate_by(Vec2::new(20.0, 0.0));
        let frame = compositor.compose(&mut pipeline, Some(&document), &transform);

        let mut target = PixelBuffer::new(40, 40).unwrap();
        compositor.paint(&frame, &mut target).unwrap();

        assert_eq!(target.pixel(5, 20), Some([250, 250, 250, 255]));
        assert_eq!(target.pixel(30, 20), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_paint_zoomed() {
        let (compositor, mut pipeline, _backend) = setup();
        let document = SourceDocument::new("<svg/>");
        pipeline.set_source(document.clone());
        pipeline.wait(TIMEOUT);

        // Zoomed out to half size about the origin: right half shows background
        let mut transform = TransformState::new();
        transform.apply_scale(0.5, Point::ZERO);
        let frame = compositor.compose(&mut pipeline, Some(&document), &transform);

        let mut target = PixelBuffer::new(40, 40).unwrap();
        compositor.paint(&frame, &mut target).unwrap();

        assert_eq!(target.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(target.pixel(35, 35), Some([250, 250, 250, 255]));
    }

    #[test]
    fn test_paint_busy_ring() {
        let compositor = Compositor::default();
        let frame = Frame {
            snapshot: None,
            transform: Affine::IDENTITY,
            busy: true,
        };
        let mut target = PixelBuffer::new(64, 64).unwrap();
        compositor.paint(&frame, &mut target).unwrap();

        // On the ring, left of center
        let [r, g, b, _] = target.pixel(32 - 16, 32).unwrap();
        assert!(b > r && b > g);
        // Center stays background
        assert_eq!(target.pixel(32, 32), Some([250, 250, 250, 255]));
    }
}
