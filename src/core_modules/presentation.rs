// THEORY:
// The `presentation` module is the read-only boundary between the targeting engine
// and whatever draws the overlay. After each frame the engine copies what an overlay
// needs (track boxes, predicted boxes, trigger boxes, the chosen target, menu state,
// frame rate) into a plain, serialisable `OverlayFrame`. Renderers receive that copy
// over a broadcast bus and can never reach back into live tracker state.

use crate::core_modules::geometry::Rect;
use crate::core_modules::menu::MenuEntry;
use crate::core_modules::track::{Track, TrackId};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const FPS_PERIOD: Duration = Duration::from_secs(1);

/// Reports the number of frames processed over the last whole second.
#[derive(Debug, Clone)]
pub struct FrameCounter {
    count: u32,
    last_fps: u32,
    period_start: Instant,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            count: 0,
            last_fps: 0,
            period_start: now,
        }
    }

    pub fn increment(&mut self) {
        self.increment_at(Instant::now());
    }

    pub fn increment_at(&mut self, now: Instant) {
        if now.saturating_duration_since(self.period_start) >= FPS_PERIOD {
            self.last_fps = self.count;
            self.period_start = now;
            self.count = 0;
        }
        self.count += 1;
    }

    pub fn fps(&self) -> u32 {
        self.last_fps
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an overlay draws for one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub id: TrackId,
    pub confidence: f64,
    pub latest: Rect,
    pub predicted: Rect,
    pub trigger_box: Rect,
}

impl TrackSummary {
    pub fn from_track(track: &Track, trigger_box_scale: f64) -> Self {
        let latest = track.latest();
        Self {
            id: track.id(),
            confidence: latest.confidence(),
            latest: latest.bounds(),
            predicted: track.interpolate().bounds(),
            trigger_box: latest.trigger_box(trigger_box_scale),
        }
    }
}

/// A read-only snapshot of one processed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayFrame {
    pub frame_id: u64,
    pub fps: u32,
    pub region_of_interest: Rect,
    pub mask_regions: Vec<Rect>,
    pub tracks: Vec<TrackSummary>,
    pub target_id: Option<TrackId>,
    pub fired: bool,
    pub show_trigger_boxes: bool,
    pub menu: Vec<MenuEntry>,
}

/// Fans overlay frames out to any number of presentation subscribers.
#[derive(Debug, Clone)]
pub struct OverlayBus {
    frames_tx: broadcast::Sender<OverlayFrame>,
}

impl OverlayBus {
    pub fn new(capacity: usize) -> Self {
        let (frames_tx, _) = broadcast::channel::<OverlayFrame>(capacity.max(1));
        Self { frames_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OverlayFrame> {
        self.frames_tx.subscribe()
    }

    /// Publishes a frame. Returns the number of subscribers that received it; having
    /// none is not an error.
    pub fn publish(&self, frame: OverlayFrame) -> usize {
        self.frames_tx.send(frame).unwrap_or(0)
    }
}
