//! Inertial fling animation.

use crate::config::ViewerConfig;
use kurbo::{Size, Vec2};

/// An in-flight fling.
#[derive(Debug, Clone, PartialEq)]
pub struct FlingJob {
    /// Total translation the fling will produce.
    pub target: Vec2,
    /// Translation handed out so far.
    pub emitted: Vec2,
    pub start_ms: u64,
    pub duration_ms: u64,
}

impl FlingJob {
    /// Fraction of the animation elapsed at `now_ms`, in `[0, 1]`.
    fn progress(&self, now_ms: u64) -> f64 {
        let elapsed = now_ms.saturating_sub(self.start_ms) as f64;
        (elapsed / self.duration_ms as f64).min(1.0)
    }
}

/// Cubic ease-out: fast start, gentle stop.
fn ease_out(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Produces incremental translation deltas that decelerate to a stop.
#[derive(Debug, Clone)]
pub struct FlingAnimator {
    distance_factor: f64,
    max_fraction: f64,
    duration_ms: u64,
    job: Option<FlingJob>,
}

impl Default for FlingAnimator {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}

impl FlingAnimator {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            distance_factor: config.fling_distance_factor,
            max_fraction: config.fling_max_fraction,
            duration_ms: config.fling_duration_ms.max(1),
            job: None,
        }
    }

    /// Travel for a release `velocity` (px/s), capped to
    /// `max_fraction * max(view width, view height)` in length.
    pub fn travel(&self, velocity: Vec2, view_size: Size) -> Vec2 {
        let raw = velocity * self.distance_factor;
        let limit = self.max_fraction * view_size.width.max(view_size.height);
        let length = raw.length();
        if length > limit && length > 0.0 {
            raw * (limit / length)
        } else {
            raw
        }
    }

    /// Start a fling, replacing any running one.
    pub fn start(&mut self, velocity: Vec2, view_size: Size, now_ms: u64) {
        let target = self.travel(velocity, view_size);
        log::info!(
            "Fling start: velocity=({:.0}, {:.0}) travel=({:.1}, {:.1})",
            velocity.x,
            velocity.y,
            target.x,
            target.y
        );
        self.job = Some(FlingJob {
            target,
            emitted: Vec2::ZERO,
            start_ms: now_ms,
            duration_ms: self.duration_ms,
        });
    }

    /// Delta to apply for this frame. `None` once idle.
    pub fn tick(&mut self, now_ms: u64) -> Option<Vec2> {
        let job = self.job.as_mut()?;
        let t = job.progress(now_ms);
        let position = job.target * ease_out(t);
        let delta = position - job.emitted;
        job.emitted = position;
        if t >= 1.0 {
            self.job = None;
        }
        Some(delta)
    }

    /// Stop immediately. No further deltas are produced.
    pub fn cancel(&mut self) {
        if self.job.take().is_some() {
            log::debug!("Fling cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.job.is_some()
    }
}
