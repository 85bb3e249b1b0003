//! Baking the current view into a standalone image.

use crate::compositor::{draw_snapshot, to_skia_color};
use crate::renderer::RenderError;
use crate::snapshot::{PixelBuffer, RasterSnapshot, buffer_size};
use kurbo::Size;
use peniko::Color;
use pinchview_core::TransformState;
use std::sync::Arc;
use thiserror::Error;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing has been rendered yet")]
    NoSnapshot,
    #[error("Export buffer: {0}")]
    Allocation(#[from] RenderError),
    #[error("PNG encoding failed: {0}")]
    Png(String),
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Composes the live snapshot and view transform into a new image.
#[derive(Debug, Clone)]
pub struct ExportService {
    background: Color,
}

impl Default for ExportService {
    fn default() -> Self {
        Self::new(Color::from_rgba8(250, 250, 250, 255))
    }
}

impl ExportService {
    pub fn new(background: Color) -> Self {
        Self { background }
    }

    /// Render what the user currently sees into a buffer of `view_size`.
    ///
    /// The shared snapshot is only read; the result owns its pixels.
    pub fn export_snapshot(
        &self,
        snapshot: Option<&Arc<RasterSnapshot>>,
        transform: &TransformState,
        view_size: Size,
    ) -> ExportResult<PixelBuffer> {
        let snapshot = Arc::clone(snapshot.ok_or(ExportError::NoSnapshot)?);
        let (width, height) = buffer_size(view_size);

        let mut output = PixelBuffer::new(width, height)?;
        output.fill(to_skia_color(self.background));
        {
            let mut pixmap = output
                .as_pixmap_mut()
                .ok_or(RenderError::Allocation { width, height })?;
            draw_snapshot(&mut pixmap, &snapshot, transform.affine());
        }

        log::info!(
            "Exported {}x{} image from snapshot generation {}",
            width,
            height,
            snapshot.generation()
        );
        Ok(output)
    }
}

/// Straight-alpha copy of premultiplied RGBA8 pixels.
fn unpremultiply(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for pixel in out.chunks_exact_mut(4) {
        let alpha = pixel[3];
        if alpha == 0 {
            pixel[..3].fill(0);
            continue;
        }
        let a = alpha as u32;
        for channel in &mut pixel[..3] {
            *channel = ((*channel as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}

/// Encode a buffer as an 8-bit RGBA PNG.
pub fn encode_png(buffer: &PixelBuffer) -> ExportResult<Vec<u8>> {
    let rgba = unpremultiply(buffer.data());
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, buffer.width(), buffer.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| ExportError::Png(format!("header: {}", e)))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| ExportError::Png(format!("data: {}", e)))?;
    }
    Ok(png_data)
}
