//! PinchView Application
//!
//! The viewer facade tying transform, gestures, background rendering and
//! export together, plus the pieces of the `pinchview` command-line tool.

pub mod cli;
mod script;
mod viewer;

pub use script::{FRAME_INTERVAL_MS, GestureScript, ReplayStats, ScriptError};
pub use viewer::Viewer;

pub use pinchview_core::{PointerEvent, PointerKind, ViewerConfig};
pub use pinchview_render::{ExportError, Frame, PixelBuffer, RenderError, encode_png};
