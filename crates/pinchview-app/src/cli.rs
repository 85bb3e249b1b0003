//! Command-line plumbing for the `pinchview` binary.

use crate::script::ScriptError;
use kurbo::Size;
use pinchview_core::ConfigError;
use pinchview_render::{ExportError, RenderError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cannot read {path:?}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("Cannot write {path:?}: {message}")]
    Write { path: PathBuf, message: String },
    #[error("Config: {0}")]
    Config(#[from] ConfigError),
    #[error("Gesture script: {0}")]
    Script(#[from] ScriptError),
    #[error("Render: {0}")]
    Render(#[from] RenderError),
    #[error("Export: {0}")]
    Export(#[from] ExportError),
    #[error("No snapshot after {0} s")]
    Timeout(u64),
}

/// Parse `WIDTHxHEIGHT`, e.g. `800x600`.
pub fn parse_view_size(value: &str) -> Result<Size, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", value))?;
    let parse = |s: &str| -> Result<f64, String> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("{:?} is not a pixel count", s))?;
        if n == 0 {
            return Err("view dimensions must be positive".to_string());
        }
        Ok(n as f64)
    };
    Ok(Size::new(parse(w)?, parse(h)?))
}
