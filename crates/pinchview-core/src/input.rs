//! Normalized pointer events.
//!
//! Hosts translate their native touch/mouse callbacks into [`PointerEvent`]s;
//! the gesture layer never sees toolkit types.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Pointer event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    Down,
    Move,
    Up,
    Cancel,
}

/// A single pointer sample from the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    /// Position in view coordinates.
    pub position: Point,
    /// Host timestamp in milliseconds. Must not go backwards within a gesture.
    pub timestamp_ms: u64,
    /// Distinguishes fingers during multi-touch.
    #[serde(default)]
    pub pointer_id: u64,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, position: Point, timestamp_ms: u64, pointer_id: u64) -> Self {
        Self {
            kind,
            position,
            timestamp_ms,
            pointer_id,
        }
    }

    pub fn down(x: f64, y: f64, timestamp_ms: u64, pointer_id: u64) -> Self {
        Self::new(PointerKind::Down, Point::new(x, y), timestamp_ms, pointer_id)
    }

    pub fn moved(x: f64, y: f64, timestamp_ms: u64, pointer_id: u64) -> Self {
        Self::new(PointerKind::Move, Point::new(x, y), timestamp_ms, pointer_id)
    }

    pub fn up(x: f64, y: f64, timestamp_ms: u64, pointer_id: u64) -> Self {
        Self::new(PointerKind::Up, Point::new(x, y), timestamp_ms, pointer_id)
    }

    pub fn cancel(x: f64, y: f64, timestamp_ms: u64, pointer_id: u64) -> Self {
        Self::new(PointerKind::Cancel, Point::new(x, y), timestamp_ms, pointer_id)
    }

    /// Adapt a winit touch event. winit does not timestamp touches, so the
    /// caller supplies the time it observed the event.
    #[cfg(feature = "winit")]
    pub fn from_touch(touch: &winit::event::Touch, timestamp_ms: u64) -> Self {
        use winit::event::TouchPhase;

        let kind = match touch.phase {
            TouchPhase::Started => PointerKind::Down,
            TouchPhase::Moved => PointerKind::Move,
            TouchPhase::Ended => PointerKind::Up,
            TouchPhase::Cancelled => PointerKind::Cancel,
        };
        Self::new(
            kind,
            Point::new(touch.location.x, touch.location.y),
            timestamp_ms,
            touch.id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let event = PointerEvent::moved(1.0, 2.0, 16, 3);
        assert_eq!(event.kind, PointerKind::Move);
        assert_eq!(event.position, Point::new(1.0, 2.0));
        assert_eq!(event.timestamp_ms, 16);
        assert_eq!(event.pointer_id, 3);
    }

    #[test]
    fn test_deserialize_script_entry() {
        let json = r#"{ "kind": "down", "position": { "x": 10.0, "y": 20.0 }, "timestamp_ms": 5 }"#;
        let event: PointerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, PointerEvent::down(10.0, 20.0, 5, 0));
    }
}
