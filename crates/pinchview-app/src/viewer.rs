//! The viewer facade hosts embed.
//!
//! Owns the view transform, gesture state, render pipeline and compositor,
//! and drives them from pointer events and frame ticks. Everything here runs
//! on the host's UI thread; only rasterization happens elsewhere.

use kurbo::{Size, Vec2};
use pinchview_core::{GestureCoordinator, PointerEvent, SourceDocument, TransformState, ViewerConfig};
use pinchview_render::{
    Backend, Compositor, ExportError, ExportService, Frame, PixelBuffer, RenderError, RenderEvent,
    RenderPipeline, RenderResult,
};
use std::time::Duration;

#[cfg(feature = "default-backend")]
use pinchview_render::ResvgBackend;

/// Interactive viewer for one vector document.
pub struct Viewer {
    config: ViewerConfig,
    transform: TransformState,
    gestures: GestureCoordinator,
    pipeline: RenderPipeline,
    compositor: Compositor,
    exporter: ExportService,
    document: Option<SourceDocument>,
    view_size: Size,
    /// Render failures not yet collected by the host.
    errors: Vec<RenderError>,
}

impl Viewer {
    /// Create a viewer rendering through `backend`.
    pub fn new<B: Backend>(backend: B, config: ViewerConfig) -> RenderResult<Self> {
        let pipeline = RenderPipeline::new(backend)?;
        Ok(Self {
            transform: TransformState::from_config(&config),
            gestures: GestureCoordinator::new(config.clone()),
            pipeline,
            compositor: Compositor::new(config.background_color(), config.busy_indicator_color()),
            exporter: ExportService::new(config.background_color()),
            document: None,
            view_size: Size::ZERO,
            errors: Vec::new(),
            config,
        })
    }

    /// Viewer with the bundled SVG backend.
    #[cfg(feature = "default-backend")]
    pub fn with_svg_backend(config: ViewerConfig) -> RenderResult<Self> {
        Self::new(ResvgBackend::new(), config)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Show `raw_text`. Identical content is not rendered twice.
    pub fn set_source(&mut self, raw_text: &str) {
        let document = SourceDocument::new(raw_text);
        if self.document.as_ref().map(SourceDocument::key) == Some(document.key()) {
            log::debug!("set_source with unchanged content {:?}", document.key());
            return;
        }
        log::info!("New source {:?} ({} bytes)", document.key(), raw_text.len());
        self.pipeline.set_source(document.clone());
        self.document = Some(document);
    }

    /// Resize the view. The current document is re-rendered at the new size.
    pub fn set_view_size(&mut self, size: Size) {
        if size == self.view_size {
            return;
        }
        log::debug!("View resized to {}x{}", size.width, size.height);
        self.view_size = size;
        self.gestures.set_view_size(size);
        self.pipeline.set_view_size(size);
    }

    pub fn view_size(&self) -> Size {
        self.view_size
    }

    /// Feed one host pointer event. Returns whether it was part of a gesture.
    pub fn on_pointer_event(&mut self, event: PointerEvent) -> bool {
        self.gestures.on_pointer_event(event, &mut self.transform)
    }

    /// Advance to `now_ms` and build the frame to display.
    ///
    /// Collects finished renders and applies pending pan and fling motion.
    pub fn draw(&mut self, now_ms: u64) -> Frame {
        self.collect_render_events();
        self.gestures.on_frame(now_ms, &mut self.transform);
        self.compositor
            .compose(&mut self.pipeline, self.document.as_ref(), &self.transform)
    }

    /// Pan or fling motion still waiting to be applied.
    pub fn is_animating(&self) -> bool {
        self.gestures.is_flinging() || self.gestures.pending_pan() != Vec2::ZERO
    }

    /// Whether another frame is needed to finish motion or a render.
    pub fn needs_redraw(&self) -> bool {
        self.is_animating() || self.pipeline.is_rendering()
    }

    /// Paint `frame` in software at the current view size.
    pub fn paint(&self, frame: &Frame) -> RenderResult<PixelBuffer> {
        let (width, height) = pinchview_render::buffer_size(self.view_size);
        let mut target = PixelBuffer::new(width, height)?;
        self.compositor.paint(frame, &mut target)?;
        Ok(target)
    }

    /// Block until the in-flight render lands or `timeout` passes.
    ///
    /// For hosts without a frame loop. Returns whether a snapshot is live.
    pub fn wait_for_render(&mut self, timeout: Duration) -> bool {
        let events = self.pipeline.wait(timeout);
        self.record(events);
        self.pipeline.has_snapshot()
    }

    /// The current view baked into a new image, or `None` if nothing has
    /// been rendered.
    pub fn export_snapshot(&self) -> Option<PixelBuffer> {
        match self.try_export_snapshot() {
            Ok(image) => Some(image),
            Err(ExportError::NoSnapshot) => {
                log::debug!("Export requested before first render");
                None
            }
            Err(e) => {
                log::warn!("Export failed: {}", e);
                None
            }
        }
    }

    pub fn try_export_snapshot(&self) -> Result<PixelBuffer, ExportError> {
        self.exporter
            .export_snapshot(self.pipeline.snapshot(), &self.transform, self.view_size)
    }

    /// Back to the identity transform, stopping any fling.
    pub fn reset_view(&mut self) {
        self.gestures.on_double_tap(&mut self.transform);
    }

    pub fn current_scale(&self) -> f64 {
        self.transform.scale()
    }

    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    pub fn is_rendering(&self) -> bool {
        self.pipeline.is_rendering()
    }

    pub fn has_snapshot(&self) -> bool {
        self.pipeline.has_snapshot()
    }

    /// Render failures since the last call.
    pub fn take_errors(&mut self) -> Vec<RenderError> {
        std::mem::take(&mut self.errors)
    }

    /// Stop gestures and release the pipeline. Later calls are inert.
    pub fn shutdown(&mut self) {
        self.gestures.abort();
        self.pipeline.shutdown();
        self.document = None;
    }

    fn collect_render_events(&mut self) {
        let events = self.pipeline.poll();
        self.record(events);
    }

    fn record(&mut self, events: Vec<RenderEvent>) {
        for event in events {
            if let RenderEvent::Failed { error, .. } = event {
                self.errors.push(error);
            }
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
