// THEORY:
// A `Track` adds memory to the stateless stream of `Detection`s. Where a detection is
// a snapshot of one frame, a track is one real-world target's existence *over time*.
// It holds a short, time-bounded history of the detections the tracker believes
// belong to that target.
//
// Key architectural principles:
// 1.  **Time-Bounded History**: History is appended at the tail and pruned from the
//     head. Every retained entry lies within `detection_max_age` of the newest one, so
//     motion estimates never mix in stale observations.
// 2.  **Cheap Linear Prediction**: `interpolate` extrapolates from the last two
//     observations only. It compensates pipeline latency without a motion model, and
//     it must stay this simple: curvature or acceleration terms change aim smoothness.
// 3.  **Tracker-Owned Lifecycle**: Tracks are born, updated and deleted exclusively by
//     the `Tracker`. The id is assigned there and never reused.

use crate::core_modules::config::TrackerConfig;
use crate::core_modules::detection::{Detection, TargetMode};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Stable handle of a track inside the tracker.
pub type TrackId = u64;

/// One target followed across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// A unique and persistent id, assigned by the tracker.
    id: TrackId,
    /// Detections believed to be this target, oldest first. Never empty.
    history: VecDeque<Detection>,
    /// When the tracker last associated a detection with this track.
    last_updated_at: Instant,
    config: TrackerConfig,
}

impl Track {
    /// Creates a track seeded with a single detection.
    pub fn new(id: TrackId, detection: Detection, now: Instant, config: TrackerConfig) -> Self {
        let mut history = VecDeque::with_capacity(8);
        history.push_back(detection);
        Self {
            id,
            history,
            last_updated_at: now,
            config,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn history(&self) -> &VecDeque<Detection> {
        &self.history
    }

    pub fn last_updated_at(&self) -> Instant {
        self.last_updated_at
    }

    /// Time since the last association.
    pub fn staleness(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_updated_at)
    }

    /// Appends a detection, prunes history entries older than `detection_max_age`
    /// relative to it, and marks the track as updated at `now`.
    ///
    /// Panics if `detection` was captured before the current newest entry.
    pub fn update(&mut self, detection: Detection, now: Instant) {
        let newest = detection.captured_at();
        assert!(
            newest >= self.latest().captured_at(),
            "track {} received a detection older than its history",
            self.id
        );

        self.history.push_back(detection);
        while let Some(oldest) = self.history.front() {
            if newest.duration_since(oldest.captured_at()) > self.config.detection_max_age {
                self.history.pop_front();
            } else {
                break;
            }
        }
        self.last_updated_at = now;
    }

    /// The most recent detection.
    pub fn latest(&self) -> &Detection {
        // History is seeded on construction and the newest entry is never pruned.
        &self.history[self.history.len() - 1]
    }

    /// Where this target will likely be one rendering interval ahead, as a synthetic
    /// detection with the latest detection's size and confidence.
    pub fn interpolate(&self) -> Detection {
        let len = self.history.len();
        if len < 2 {
            return self.latest().clone();
        }

        let current = &self.history[len - 1];
        let previous = &self.history[len - 2];
        let current_center = current.position(TargetMode::Center);

        let position_delta = previous.position(TargetMode::Center) - current_center;
        let time_delta = current
            .captured_at()
            .duration_since(previous.captured_at())
            .as_secs_f64();

        let predicted = current_center + position_delta * (time_delta * self.config.interpolation_scale);
        current.recentered(predicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Point;

    fn config() -> TrackerConfig {
        TrackerConfig {
            track_max_age: Duration::from_millis(500),
            detection_max_age: Duration::from_millis(100),
            interpolation_scale: 2.0,
        }
    }

    fn det_at(cx: f64, cy: f64, at: Instant) -> Detection {
        Detection::new_at(
            None,
            0.7,
            Point::new(cx - 10.0, cy - 20.0),
            Point::new(cx + 10.0, cy + 20.0),
            at,
        )
        .unwrap()
    }

    #[test]
    fn new_track_has_single_entry() {
        let t0 = Instant::now();
        let track = Track::new(7, det_at(50.0, 50.0, t0), t0, config());
        assert_eq!(track.id(), 7);
        assert_eq!(track.history().len(), 1);
        assert_eq!(track.last_updated_at(), t0);
        assert_eq!(track.interpolate(), *track.latest());
    }

    #[test]
    fn update_appends_and_marks_time() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(16);
        let mut track = Track::new(0, det_at(50.0, 50.0, t0), t0, config());
        track.update(det_at(55.0, 50.0, t1), t1);
        assert_eq!(track.history().len(), 2);
        assert_eq!(track.latest().position(TargetMode::Center), Point::new(55.0, 50.0));
        assert_eq!(track.last_updated_at(), t1);
        assert_eq!(track.staleness(t1 + Duration::from_millis(5)), Duration::from_millis(5));
    }

    #[test]
    fn history_is_pruned_to_max_age() {
        let t0 = Instant::now();
        let mut track = Track::new(0, det_at(0.0, 0.0, t0), t0, config());
        for step in 1..=10u64 {
            let at = t0 + Duration::from_millis(30 * step);
            track.update(det_at(step as f64, 0.0, at), at);

            let newest = track.latest().captured_at();
            for entry in track.history() {
                assert!(newest.duration_since(entry.captured_at()) <= config().detection_max_age);
            }
        }
        // Entries at 210, 240, 270 and 300 ms survive.
        assert_eq!(track.history().len(), 4);
        assert!(track
            .history()
            .iter()
            .zip(track.history().iter().skip(1))
            .all(|(a, b)| a.captured_at() <= b.captured_at()));
    }

    #[test]
    fn entry_exactly_at_max_age_is_kept() {
        let t0 = Instant::now();
        let t1 = t0 + config().detection_max_age;
        let mut track = Track::new(0, det_at(0.0, 0.0, t0), t0, config());
        track.update(det_at(1.0, 0.0, t1), t1);
        assert_eq!(track.history().len(), 2);
    }

    #[test]
    fn stationary_target_interpolates_to_latest_center() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(16);
        let mut track = Track::new(0, det_at(300.0, 200.0, t0), t0, config());
        track.update(det_at(300.0, 200.0, t1), t1);
        let predicted = track.interpolate();
        assert_eq!(
            predicted.position(TargetMode::Center),
            track.latest().position(TargetMode::Center)
        );
    }

    #[test]
    fn interpolation_keeps_size_and_confidence() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(50);
        let mut track = Track::new(0, det_at(100.0, 100.0, t0), t0, config());
        track.update(det_at(110.0, 100.0, t1), t1);

        let predicted = track.interpolate();
        let latest = track.latest();
        // delta (-10, 0) * 0.05 s * 2.0 = (-1, 0)
        let center = predicted.position(TargetMode::Center);
        assert!((center.x - 109.0).abs() < 1e-9);
        assert!((center.y - 100.0).abs() < 1e-9);
        assert!((predicted.width() - latest.width()).abs() < 1e-9);
        assert!((predicted.height() - latest.height()).abs() < 1e-9);
        assert_eq!(predicted.confidence(), latest.confidence());
    }

    #[test]
    #[should_panic(expected = "older than its history")]
    fn out_of_order_detection_is_a_defect() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(16);
        let mut track = Track::new(0, det_at(0.0, 0.0, t1), t1, config());
        track.update(det_at(1.0, 0.0, t0), t1);
    }
}
