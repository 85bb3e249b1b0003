//! Recorded pointer input replayed against a [`Viewer`].
//!
//! A script is a JSON array of pointer events in timestamp order:
//!
//! ```json
//! [
//!   { "kind": "down", "position": { "x": 50.0, "y": 50.0 }, "timestamp_ms": 0 },
//!   { "kind": "up",   "position": { "x": 50.0, "y": 50.0 }, "timestamp_ms": 80 }
//! ]
//! ```

use crate::viewer::Viewer;
use pinchview_core::PointerEvent;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Frames are ticked at this interval between events (about 60 Hz).
pub const FRAME_INTERVAL_MS: u64 = 16;

/// Upper bound on frames ticked after the last event.
const MAX_TAIL_FRAMES: u32 = 1_000;

/// Script loading errors.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script: {0}")]
    Io(String),
    #[error("Invalid script JSON: {0}")]
    Parse(String),
    #[error("Event {index} at {timestamp_ms} ms is earlier than the one before it")]
    OutOfOrder { index: usize, timestamp_ms: u64 },
}

/// What a replay did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    /// Events the viewer consumed as part of a gesture.
    pub handled: usize,
    pub frames: u32,
}

#[derive(Debug, Clone, Default)]
pub struct GestureScript {
    events: Vec<PointerEvent>,
}

impl GestureScript {
    pub fn new(events: Vec<PointerEvent>) -> Result<Self, ScriptError> {
        if let Some(index) = events
            .windows(2)
            .position(|pair| pair[1].timestamp_ms < pair[0].timestamp_ms)
        {
            return Err(ScriptError::OutOfOrder {
                index: index + 1,
                timestamp_ms: events[index + 1].timestamp_ms,
            });
        }
        Ok(Self { events })
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let events: Vec<PointerEvent> =
            serde_json::from_str(json).map_err(|e| ScriptError::Parse(e.to_string()))?;
        Self::new(events)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ScriptError::Io(format!("{:?}: {}", path, e)))?;
        Self::from_json(&json)
    }

    pub fn events(&self) -> &[PointerEvent] {
        &self.events
    }

    /// Feed every event to `viewer`, drawing a frame every
    /// [`FRAME_INTERVAL_MS`] in between, then keep drawing until motion
    /// settles.
    pub fn replay(&self, viewer: &mut Viewer) -> ReplayStats {
        let mut stats = ReplayStats {
            events: self.events.len(),
            ..ReplayStats::default()
        };
        let Some(first) = self.events.first() else {
            return stats;
        };

        let mut now = first.timestamp_ms;
        for event in &self.events {
            while now + FRAME_INTERVAL_MS <= event.timestamp_ms {
                now += FRAME_INTERVAL_MS;
                viewer.draw(now);
                stats.frames += 1;
            }
            if viewer.on_pointer_event(*event) {
                stats.handled += 1;
            }
        }

        now = now.max(self.events.last().map_or(now, |e| e.timestamp_ms));
        let mut tail = 0;
        loop {
            viewer.draw(now);
            stats.frames += 1;
            tail += 1;
            if !viewer.is_animating() || tail >= MAX_TAIL_FRAMES {
                break;
            }
            now += FRAME_INTERVAL_MS;
        }

        log::info!(
            "Replayed {} events ({} handled) over {} frames",
            stats.events,
            stats.handled,
            stats.frames
        );
        stats
    }
}
