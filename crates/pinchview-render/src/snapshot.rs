//! Pixel buffers and the published raster snapshot.

use crate::renderer::{RenderError, RenderResult};
use kurbo::Size;
use pinchview_core::ContentKey;
use std::fmt;
use std::sync::Arc;

/// Premultiplied RGBA8 pixels, row-major, at least 1x1.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Byte length of a `width` x `height` RGBA8 buffer, if it fits in memory.
fn byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)?.checked_mul(4)
}

/// Whole-pixel buffer dimensions for a view, never smaller than 1x1.
pub fn buffer_size(view_size: Size) -> (u32, u32) {
    let clamp = |v: f64| v.round().max(1.0).min(u32::MAX as f64) as u32;
    (clamp(view_size.width), clamp(view_size.height))
}

impl PixelBuffer {
    /// Transparent buffer. Zero dimensions are bumped to 1.
    ///
    /// Allocation failure is reported instead of aborting.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let (width, height) = (width.max(1), height.max(1));
        let len = byte_len(width, height).ok_or(RenderError::Allocation { width, height })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| RenderError::Allocation { width, height })?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wrap existing premultiplied RGBA8 pixels.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> RenderResult<Self> {
        if width == 0 || height == 0 || byte_len(width, height) != Some(data.len()) {
            return Err(RenderError::Rasterize(format!(
                "{} bytes do not make a {}x{} RGBA image",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGBA at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: tiny_skia::Color) {
        let c = color.premultiply().to_color_u8();
        let rgba = [c.red(), c.green(), c.blue(), c.alpha()];
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    pub fn as_pixmap(&self) -> Option<tiny_skia::PixmapRef<'_>> {
        tiny_skia::PixmapRef::from_bytes(&self.data, self.width, self.height)
    }

    pub fn as_pixmap_mut(&mut self) -> Option<tiny_skia::PixmapMut<'_>> {
        tiny_skia::PixmapMut::from_bytes(&mut self.data, self.width, self.height)
    }
}

/// A finished raster, immutable once published.
#[derive(Debug)]
pub struct RasterSnapshot {
    pixels: PixelBuffer,
    generation: u64,
    key: ContentKey,
}

impl RasterSnapshot {
    pub fn new(pixels: PixelBuffer, generation: u64, key: ContentKey) -> Self {
        Self {
            pixels,
            generation,
            key,
        }
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn key(&self) -> ContentKey {
        self.key
    }

    pub fn width(&self) -> u32 {
        self.pixels.width
    }

    pub fn height(&self) -> u32 {
        self.pixels.height
    }
}

/// Holds the single live snapshot.
///
/// Readers get an `Arc`, so a frame or export that grabbed the old snapshot
/// keeps it alive until it is done with it.
#[derive(Debug, Default)]
pub struct SnapshotSlot {
    current: Option<Arc<RasterSnapshot>>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Arc<RasterSnapshot>> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Install `snapshot` and hand back the one it replaced.
    ///
    /// The replacement is in place before the old one is released.
    pub fn publish(&mut self, snapshot: RasterSnapshot) -> Option<Arc<RasterSnapshot>> {
        self.current.replace(Arc::new(snapshot))
    }

    /// Release the live snapshot.
    pub fn clear(&mut self) -> Option<Arc<RasterSnapshot>> {
        self.current.take()
    }
}
