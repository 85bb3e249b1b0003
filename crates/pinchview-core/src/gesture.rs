//! Gesture recognition: pan, pinch-zoom, fling and double-tap-to-reset.
//!
//! [`GestureCoordinator`] consumes the normalized [`PointerEvent`] stream in
//! arrival order and turns it into mutations of a [`TransformState`]. Drag
//! deltas are accumulated per frame and applied by [`GestureCoordinator::on_frame`],
//! which also advances any running fling.

use crate::config::ViewerConfig;
use crate::fling::FlingAnimator;
use crate::input::{PointerEvent, PointerKind};
use crate::transform::TransformState;
use kurbo::{Point, Size, Vec2};
use std::collections::VecDeque;
use thiserror::Error;

/// Malformed pointer sequences. Never surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GestureInputError {
    #[error("Pointer {0} is not down")]
    UnknownPointer(u64),
    #[error("Pointer {0} is already down")]
    AlreadyDown(u64),
    #[error("Only two pointers are tracked, ignoring pointer {0}")]
    TooManyPointers(u64),
    #[error("Timestamp went backwards: {last} -> {now}")]
    TimeWentBackwards { last: u64, now: u64 },
}

/// Coarse gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Down,
    Dragging,
    Scaling,
    Flinging,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    position: Point,
    timestamp_ms: u64,
}

/// State for one touch sequence, from first down to last up.
#[derive(Debug, Clone)]
pub struct GestureSession {
    pointer_id: u64,
    start: Point,
    start_ms: u64,
    last: Point,
    last_ms: u64,
    dragging: bool,
    samples: VecDeque<Sample>,
    /// Second finger while a pinch is active.
    partner: Option<(u64, Point)>,
    /// Set once a second finger went down; the session can no longer fling or tap.
    pinched: bool,
}

impl GestureSession {
    fn new(pointer_id: u64, position: Point, timestamp_ms: u64) -> Self {
        let mut samples = VecDeque::new();
        samples.push_back(Sample {
            position,
            timestamp_ms,
        });
        Self {
            pointer_id,
            start: position,
            start_ms: timestamp_ms,
            last: position,
            last_ms: timestamp_ms,
            dragging: false,
            samples,
            partner: None,
            pinched: false,
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn last(&self) -> Point {
        self.last
    }

    fn record(&mut self, position: Point, timestamp_ms: u64, window_ms: u64) {
        self.samples.push_back(Sample {
            position,
            timestamp_ms,
        });
        // Keep the last sample at or before the window start as the anchor
        let horizon = timestamp_ms.saturating_sub(window_ms);
        while self.samples.len() > 1 && self.samples[1].timestamp_ms <= horizon {
            self.samples.pop_front();
        }
    }

    /// Average velocity (px/s) over the last `window_ms`.
    ///
    /// Measured from the newest sample back to the last sample at or before
    /// the window start, so a release shortly after the final move still
    /// carries that move's motion.
    fn release_velocity(&self, now_ms: u64, window_ms: u64) -> Vec2 {
        let horizon = now_ms.saturating_sub(window_ms);
        let Some(newest) = self.samples.back() else {
            return Vec2::ZERO;
        };
        let anchor = self
            .samples
            .iter()
            .rev()
            .find(|s| s.timestamp_ms <= horizon)
            .or(self.samples.front());
        let Some(anchor) = anchor else {
            return Vec2::ZERO;
        };
        let dt = newest.timestamp_ms.saturating_sub(anchor.timestamp_ms);
        if dt == 0 {
            return Vec2::ZERO;
        }
        (newest.position - anchor.position) * (1000.0 / dt as f64)
    }
}

#[derive(Debug, Clone, Copy)]
struct TapRecord {
    position: Point,
    up_ms: u64,
}

/// Turns pointer events into pan, zoom, fling and reset intents.
#[derive(Debug, Clone)]
pub struct GestureCoordinator {
    config: ViewerConfig,
    view_size: Size,
    session: Option<GestureSession>,
    fling: FlingAnimator,
    /// Drag translation accumulated since the last frame.
    pending_pan: Vec2,
    last_fling_start_ms: Option<u64>,
    last_tap: Option<TapRecord>,
}

impl Default for GestureCoordinator {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl GestureCoordinator {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            fling: FlingAnimator::new(&config),
            config,
            view_size: Size::ZERO,
            session: None,
            pending_pan: Vec2::ZERO,
            last_fling_start_ms: None,
            last_tap: None,
        }
    }

    /// View bounds, used to cap fling travel.
    pub fn set_view_size(&mut self, size: Size) {
        self.view_size = size;
    }

    pub fn phase(&self) -> GesturePhase {
        match &self.session {
            Some(session) if session.partner.is_some() || session.pinched => GesturePhase::Scaling,
            Some(session) if session.dragging => GesturePhase::Dragging,
            Some(_) => GesturePhase::Down,
            None if self.fling.is_active() => GesturePhase::Flinging,
            None => GesturePhase::Idle,
        }
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn pending_pan(&self) -> Vec2 {
        self.pending_pan
    }

    pub fn is_flinging(&self) -> bool {
        self.fling.is_active()
    }

    /// Feed one host event. Returns whether it was consumed as part of a
    /// gesture; malformed sequences are dropped and report `false`.
    pub fn on_pointer_event(&mut self, event: PointerEvent, transform: &mut TransformState) -> bool {
        match self.handle(event, transform) {
            Ok(handled) => handled,
            Err(e) => {
                log::debug!("Ignoring pointer event {:?}: {}", event.kind, e);
                false
            }
        }
    }

    /// Like [`on_pointer_event`](Self::on_pointer_event) but reports why an
    /// event was rejected.
    pub fn handle(
        &mut self,
        event: PointerEvent,
        transform: &mut TransformState,
    ) -> Result<bool, GestureInputError> {
        match event.kind {
            PointerKind::Down => self.on_down(event),
            PointerKind::Move => self.on_move(event, transform),
            PointerKind::Up => self.on_up(event, transform, false),
            PointerKind::Cancel => self.on_up(event, transform, true),
        }
    }

    fn on_down(&mut self, event: PointerEvent) -> Result<bool, GestureInputError> {
        let id = event.pointer_id;
        self.fling.cancel();

        let Some(session) = self.session.as_mut() else {
            // Anything still pending belongs to the previous gesture
            self.pending_pan = Vec2::ZERO;
            self.session = Some(GestureSession::new(id, event.position, event.timestamp_ms));
            return Ok(true);
        };

        if session.pointer_id == id || session.partner.is_some_and(|(p, _)| p == id) {
            return Err(GestureInputError::AlreadyDown(id));
        }
        if session.partner.is_some() {
            return Err(GestureInputError::TooManyPointers(id));
        }

        // Second finger: drop this frame's single-finger delta before zooming
        self.pending_pan = Vec2::ZERO;
        session.partner = Some((id, event.position));
        session.pinched = true;
        log::debug!("Pinch started with pointers {} and {}", session.pointer_id, id);
        Ok(true)
    }

    fn on_move(
        &mut self,
        event: PointerEvent,
        transform: &mut TransformState,
    ) -> Result<bool, GestureInputError> {
        let id = event.pointer_id;
        let session = self
            .session
            .as_mut()
            .ok_or(GestureInputError::UnknownPointer(id))?;

        if session.pinched {
            let Some((partner_id, partner)) = session.partner else {
                // One finger left over after a pinch: track it, never pan
                if session.pointer_id != id {
                    return Err(GestureInputError::UnknownPointer(id));
                }
                session.last = event.position;
                session.last_ms = session.last_ms.max(event.timestamp_ms);
                return Ok(true);
            };

            let (before, after) = if id == session.pointer_id {
                let before = (session.last, partner);
                session.last = event.position;
                session.last_ms = session.last_ms.max(event.timestamp_ms);
                (before, (event.position, partner))
            } else if id == partner_id {
                session.partner = Some((partner_id, event.position));
                ((session.last, partner), (session.last, event.position))
            } else {
                return Err(GestureInputError::UnknownPointer(id));
            };

            let previous_span = before.0.distance(before.1);
            let span = after.0.distance(after.1);
            if previous_span > f64::EPSILON && span > f64::EPSILON {
                let focal = after.0.midpoint(after.1);
                self.on_scale(focal, span / previous_span, transform);
            }
            return Ok(true);
        }

        if id != session.pointer_id {
            return Err(GestureInputError::UnknownPointer(id));
        }
        if event.timestamp_ms < session.last_ms {
            return Err(GestureInputError::TimeWentBackwards {
                last: session.last_ms,
                now: event.timestamp_ms,
            });
        }

        let delta = event.position - session.last;
        let dt_ms = event.timestamp_ms - session.last_ms;
        let speed = if dt_ms > 0 {
            delta.length() * 1000.0 / dt_ms as f64
        } else {
            0.0
        };

        if speed > self.config.max_velocity {
            log::debug!("Discarding move at {:.0} px/s as noise", speed);
            return Ok(true);
        }

        session.last = event.position;
        session.last_ms = event.timestamp_ms;
        session.record(event.position, event.timestamp_ms, self.config.velocity_window_ms);

        if !session.dragging && (event.position - session.start).length() > self.config.drag_threshold {
            session.dragging = true;
        }

        if session.dragging {
            let boost = 1.0 + speed / self.config.velocity_normalizer;
            self.pending_pan += delta * (boost * self.config.damping_factor);
        }
        Ok(true)
    }

    fn on_up(
        &mut self,
        event: PointerEvent,
        transform: &mut TransformState,
        cancelled: bool,
    ) -> Result<bool, GestureInputError> {
        let id = event.pointer_id;
        let session = self
            .session
            .as_mut()
            .ok_or(GestureInputError::UnknownPointer(id))?;

        if session.pinched {
            match session.partner {
                Some((partner_id, _)) if partner_id == id => {
                    session.partner = None;
                }
                Some((partner_id, partner)) if session.pointer_id == id => {
                    // Primary lifted first: the partner carries on alone
                    session.pointer_id = partner_id;
                    session.last = partner;
                    session.partner = None;
                }
                None if session.pointer_id == id => {
                    self.session = None;
                    self.last_tap = None;
                }
                _ => return Err(GestureInputError::UnknownPointer(id)),
            }
            return Ok(true);
        }

        if id != session.pointer_id {
            return Err(GestureInputError::UnknownPointer(id));
        }
        if event.timestamp_ms < session.last_ms {
            return Err(GestureInputError::TimeWentBackwards {
                last: session.last_ms,
                now: event.timestamp_ms,
            });
        }

        let Some(mut session) = self.session.take() else {
            return Err(GestureInputError::UnknownPointer(id));
        };

        if session.dragging {
            self.last_tap = None;
            session.record(event.position, event.timestamp_ms, self.config.velocity_window_ms);
            let velocity = session.release_velocity(event.timestamp_ms, self.config.velocity_window_ms);
            self.maybe_fling(velocity, event.timestamp_ms);
        } else if cancelled {
            // A cancelled touch is never a tap
            self.last_tap = None;
        } else {
            self.register_tap(&session, event.timestamp_ms, transform);
        }
        Ok(true)
    }

    fn maybe_fling(&mut self, velocity: Vec2, now_ms: u64) {
        let threshold = self.config.fling_velocity_threshold;
        if velocity.x.abs() <= threshold && velocity.y.abs() <= threshold {
            return;
        }
        let cooled_down = self
            .last_fling_start_ms
            .is_none_or(|start| now_ms.saturating_sub(start) >= self.config.fling_cooldown_ms);
        if !cooled_down {
            log::debug!("Fling suppressed by cooldown");
            return;
        }
        self.fling.start(velocity, self.view_size, now_ms);
        self.last_fling_start_ms = Some(now_ms);
    }

    fn register_tap(&mut self, session: &GestureSession, up_ms: u64, transform: &mut TransformState) {
        let is_double = self.last_tap.is_some_and(|tap| {
            session.start_ms.saturating_sub(tap.up_ms) <= self.config.double_tap_timeout_ms
                && session.start.distance(tap.position) <= self.config.double_tap_slop
        });
        if is_double {
            // Reset so a third tap starts a new pair
            self.last_tap = None;
            self.on_double_tap(transform);
        } else {
            self.last_tap = Some(TapRecord {
                position: session.start,
                up_ms,
            });
        }
    }

    /// Zoom by `factor` around `focal`.
    pub fn on_scale(&mut self, focal: Point, factor: f64, transform: &mut TransformState) {
        transform.apply_scale(factor, focal);
    }

    /// Back to the identity transform, dropping any motion in progress.
    pub fn on_double_tap(&mut self, transform: &mut TransformState) {
        self.fling.cancel();
        self.pending_pan = Vec2::ZERO;
        transform.reset();
        log::debug!("View reset");
    }

    /// Apply this frame's drag delta and advance the fling.
    ///
    /// Returns `true` while more frames are needed to finish the motion.
    pub fn on_frame(&mut self, now_ms: u64, transform: &mut TransformState) -> bool {
        let mut moved = false;
        if self.pending_pan != Vec2::ZERO {
            transform.translate_by(self.pending_pan);
            self.pending_pan = Vec2::ZERO;
            moved = true;
        }
        if let Some(delta) = self.fling.tick(now_ms) {
            transform.translate_by(delta);
            moved = true;
        }
        moved || self.fling.is_active()
    }

    /// Drop the active session and any fling, e.g. when the view goes away.
    pub fn abort(&mut self) {
        self.session = None;
        self.pending_pan = Vec2::ZERO;
        self.fling.cancel();
    }
}
