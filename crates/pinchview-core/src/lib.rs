//! PinchView Core Library
//!
//! Platform-agnostic view transform, gesture recognition and fling animation
//! for the PinchView vector viewer. Everything here runs on the UI thread.

pub mod config;
pub mod document;
pub mod fling;
pub mod gesture;
pub mod input;
pub mod transform;

pub use config::{ConfigError, ViewerConfig};
pub use document::{ContentKey, SourceDocument};
pub use fling::{FlingAnimator, FlingJob};
pub use gesture::{GestureCoordinator, GestureInputError, GesturePhase, GestureSession};
pub use input::{PointerEvent, PointerKind};
pub use transform::{MAX_SCALE, MIN_SCALE, TransformState};
