//! PinchView Render Library
//!
//! Background rasterization, per-frame compositing and export for the
//! PinchView viewer. The default backend uses resvg.

pub mod compositor;
pub mod export;
pub mod pipeline;
mod renderer;
pub mod snapshot;

#[cfg(feature = "resvg-backend")]
mod resvg_impl;

pub use compositor::{Compositor, Frame};
pub use export::{ExportError, ExportResult, ExportService, encode_png};
pub use pipeline::{RenderEvent, RenderPipeline};
pub use renderer::{Backend, RenderError, RenderResult};
pub use snapshot::{PixelBuffer, RasterSnapshot, SnapshotSlot, buffer_size};

#[cfg(feature = "resvg-backend")]
pub use resvg_impl::ResvgBackend;
