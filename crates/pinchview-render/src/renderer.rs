//! Backend trait abstraction.

use crate::snapshot::PixelBuffer;
use thiserror::Error;

/// Render errors.
///
/// All of them are recoverable: the previously published snapshot stays on
/// screen and a corrected source can be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Parse failed: {0}")]
    Parse(String),
    #[error("Rasterization failed: {0}")]
    Rasterize(String),
    #[error("Could not allocate a {width}x{height} pixel buffer")]
    Allocation { width: u32, height: u32 },
    #[error("Render worker unavailable: {0}")]
    Worker(String),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Parser plus rasterizer for one vector format.
///
/// Both methods run on the pipeline's worker thread, never on the UI thread,
/// so the parsed document does not need to be `Send`.
pub trait Backend: Send + 'static {
    /// Parsed representation of a source.
    type Document;

    /// Parse raw source text.
    fn parse(&self, source: &str) -> RenderResult<Self::Document>;

    /// Rasterize a parsed document into a `width` x `height` buffer.
    fn rasterize(&self, document: &Self::Document, width: u32, height: u32)
    -> RenderResult<PixelBuffer>;
}
