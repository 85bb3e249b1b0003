//! View transform for pan/zoom.

use crate::config::ViewerConfig;
use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Default lower scale bound.
pub const MIN_SCALE: f64 = 0.1;
/// Default upper scale bound.
pub const MAX_SCALE: f64 = 5.0;

/// TransformState owns the affine view transform of the viewer.
///
/// Content is first scaled about the origin, then translated by `offset`.
/// Scale stays within `[min_scale, max_scale]`; translation is unbounded, so
/// content can be panned fully off-screen and brought back with [`reset`].
///
/// The product of all requested factors is kept unclamped, and the displayed
/// scale is that product clamped to the bounds. Zooming past a bound has to be
/// undone before the view zooms back.
///
/// [`reset`]: TransformState::reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    scale: f64,
    /// Product of every factor since the last reset.
    requested_scale: f64,
    offset: Vec2,
    min_scale: f64,
    max_scale: f64,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            requested_scale: 1.0,
            offset: Vec2::ZERO,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
        }
    }
}

impl TransformState {
    /// Identity transform with the default scale bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity transform with the scale bounds from `config`.
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            ..Self::default()
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale_bounds(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    /// Content-to-screen transform.
    pub fn affine(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    /// Screen-to-content transform.
    pub fn inverse_affine(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.offset)
    }

    pub fn screen_to_content(&self, screen_point: Point) -> Point {
        self.inverse_affine() * screen_point
    }

    pub fn content_to_screen(&self, content_point: Point) -> Point {
        self.affine() * content_point
    }

    /// Multiply the scale by `factor`, keeping `focal_point` fixed on screen.
    ///
    /// After any sequence of factors the scale is their product clamped to
    /// the scale bounds. Non-finite or non-positive factors are ignored.
    pub fn apply_scale(&mut self, factor: f64, focal_point: Point) {
        let requested = self.requested_scale * factor;
        if !factor.is_finite() || factor <= 0.0 || !requested.is_finite() || requested <= 0.0 {
            log::debug!("Ignoring scale factor {}", factor);
            return;
        }
        self.requested_scale = requested;
        let new_scale = requested.clamp(self.min_scale, self.max_scale);
        if (new_scale - self.scale).abs() < f64::EPSILON {
            return;
        }

        let content_point = self.screen_to_content(focal_point);
        self.scale = new_scale;

        // Shift so the content point under the focus lands back on it
        let moved = self.content_to_screen(content_point);
        self.offset += focal_point - moved;
    }

    /// Add to the translation. Unclamped.
    pub fn translate_by(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Back to identity.
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.requested_scale = 1.0;
        self.offset = Vec2::ZERO;
    }

    pub fn is_identity(&self) -> bool {
        (self.scale - 1.0).abs() < f64::EPSILON && self.offset == Vec2::ZERO
    }
}
