// THEORY:
// The `tracker` module is the heart of the targeting engine's temporal layer. It adds
// "object permanence" to the detector's output: it takes the stateless list of
// `Detection`s from a single frame and associates them with the `Track`s it was
// following in previous frames.
//
// This module solves the "data association problem."
//
// Key architectural principles:
// 1.  **Untrusted Detector Ids**: The detector's identity hints churn between frames, so
//     association is purely spatial. A candidate's score against a track is
//     `1 - distance / screen_diagonal`, which lies in [0, 1] for on-screen points.
// 2.  **Greedy Global Matching**: Each pass takes the single best (track, candidate)
//     pair over all remaining tracks and candidates, commits it, and removes both from
//     the working lists. Ties go to the lowest track id, then the earliest candidate.
//     T and C are small (single digits to low tens), so O(min(T,C)·T·C) is fine.
// 3.  **Lifecycle Management**:
//     - **Birth**: A candidate left over after matching becomes a new track.
//     - **Tracking**: A matched track appends the candidate to its history.
//     - **Death**: A track not matched for longer than `track_max_age` is deleted.
//       Its id is never handed out again.
// 4.  **Frame Atomicity**: A frame is applied to a working copy of the track arena,
//     which replaces the live arena only once the whole batch has been processed.
//     A frame that aborts part-way leaves the previous frame's tracks intact.

use crate::core_modules::config::{ConfigError, TrackerConfig};
use crate::core_modules::detection::{Detection, TargetMode};
use crate::core_modules::geometry::Point;
use crate::core_modules::track::{Track, TrackId};
use std::collections::BTreeMap;
use std::collections::btree_map::Values;
use std::time::Instant;
use tracing::{debug, info};

/// Manages the set of live `Track`s from one frame to the next.
#[derive(Debug, Clone)]
pub struct Tracker {
    /// Live tracks keyed by their stable id.
    tracks: BTreeMap<TrackId, Track>,
    /// The id the next spawned track receives.
    next_id: TrackId,
    /// Length of the screen diagonal in pixels, used to normalise match scores.
    screen_diagonal: f64,
    config: TrackerConfig,
}

impl Tracker {
    pub fn new(screen_size: Point, config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if !(screen_size.x > 0.0 && screen_size.y > 0.0) {
            return Err(ConfigError::ScreenSize {
                width: screen_size.x as u32,
                height: screen_size.y as u32,
            });
        }

        Ok(Self {
            tracks: BTreeMap::new(),
            next_id: 0,
            screen_diagonal: screen_size.distance_to(Point::default()),
            config,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live tracks in ascending id order.
    pub fn tracks(&self) -> Values<'_, TrackId, Track> {
        self.tracks.values()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Similarity of a candidate to a track: 1 at the track's centre, 0 a full screen
    /// diagonal away.
    pub fn score(&self, track: &Track, candidate: &Detection) -> f64 {
        let distance = track
            .latest()
            .position(TargetMode::Center)
            .distance_to(candidate.position(TargetMode::Center));
        1.0 - distance / self.screen_diagonal
    }

    /// Updates the tracker with the current frame's detections.
    pub fn update(&mut self, detections: Vec<Detection>) {
        self.update_at(detections, Instant::now());
    }

    /// Updates the tracker with the current frame's detections, treating `now` as the
    /// current time.
    pub fn update_at(&mut self, detections: Vec<Detection>, now: Instant) {
        let mut tracks = self.tracks.clone();
        let mut next_id = self.next_id;

        // --- 1. Pruning ---
        tracks.retain(|id, track| {
            let alive = track.staleness(now) <= self.config.track_max_age;
            if !alive {
                info!(track_id = id, "track lost");
            }
            alive
        });

        // --- 2. Greedy global matching ---
        let mut candidates = detections;
        let mut live: Vec<TrackId> = tracks.keys().copied().collect();

        while !candidates.is_empty() && !live.is_empty() {
            // (score, index into `live`, index into `candidates`)
            let mut best: Option<(f64, usize, usize)> = None;

            for (live_index, id) in live.iter().enumerate() {
                let track = &tracks[id];
                for (candidate_index, candidate) in candidates.iter().enumerate() {
                    let score = self.score(track, candidate);
                    if best.is_none_or(|(best_score, _, _)| score > best_score) {
                        best = Some((score, live_index, candidate_index));
                    }
                }
            }

            let Some((score, live_index, candidate_index)) = best else {
                break;
            };
            let id = live.remove(live_index);
            let candidate = candidates.remove(candidate_index);
            debug!(track_id = id, score, "matched detection to track");

            if let Some(track) = tracks.get_mut(&id) {
                track.update(candidate, now);
            }
        }

        // --- 3. Spawning ---
        for candidate in candidates {
            let id = next_id;
            next_id += 1;
            info!(
                track_id = id,
                confidence = candidate.confidence(),
                "new track"
            );
            tracks.insert(id, Track::new(id, candidate, now, self.config));
        }

        self.tracks = tracks;
        self.next_id = next_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SCREEN: Point = Point::new(1920.0, 1080.0);

    fn config() -> TrackerConfig {
        TrackerConfig {
            track_max_age: Duration::from_millis(100),
            detection_max_age: Duration::from_millis(200),
            interpolation_scale: 1.0,
        }
    }

    fn det_at(cx: f64, cy: f64, at: Instant) -> Detection {
        Detection::new_at(
            Some(99),
            0.8,
            Point::new(cx - 5.0, cy - 5.0),
            Point::new(cx + 5.0, cy + 5.0),
            at,
        )
        .unwrap()
    }

    fn center(track: &Track) -> Point {
        track.latest().position(TargetMode::Center)
    }

    #[test]
    fn rejects_invalid_construction() {
        assert!(Tracker::new(Point::new(0.0, 1080.0), config()).is_err());
        let bad = TrackerConfig {
            track_max_age: Duration::ZERO,
            ..config()
        };
        assert!(Tracker::new(SCREEN, bad).is_err());
    }

    #[test]
    fn empty_tracker_spawns_every_candidate() {
        let t0 = Instant::now();
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(10.0, 10.0, t0), det_at(500.0, 500.0, t0)], t0);

        let ids: Vec<TrackId> = tracker.tracks().map(Track::id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(center(tracker.get(1).unwrap()), Point::new(500.0, 500.0));
    }

    #[test]
    fn nearest_candidate_is_associated_and_far_one_spawns() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(16);
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(100.0, 100.0, t0)], t0);

        tracker.update_at(vec![det_at(900.0, 900.0, t1), det_at(105.0, 105.0, t1)], t1);

        assert_eq!(tracker.len(), 2);
        let original = tracker.get(0).unwrap();
        assert_eq!(original.history().len(), 2);
        assert_eq!(center(original), Point::new(105.0, 105.0));
        let spawned = tracker.get(1).unwrap();
        assert_eq!(spawned.history().len(), 1);
        assert_eq!(center(spawned), Point::new(900.0, 900.0));
    }

    #[test]
    fn global_best_pair_wins_over_track_order() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(16);
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(100.0, 100.0, t0), det_at(130.0, 100.0, t0)], t0);

        // Both tracks are nearest to 118. Matching track 0 first would push track 1 onto
        // the candidate at 80; the globally best pair is track 1 with 118.
        tracker.update_at(vec![det_at(118.0, 100.0, t1), det_at(80.0, 100.0, t1)], t1);

        assert_eq!(center(tracker.get(0).unwrap()), Point::new(80.0, 100.0));
        assert_eq!(center(tracker.get(1).unwrap()), Point::new(118.0, 100.0));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn score_is_normalised_by_screen_diagonal() {
        let t0 = Instant::now();
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(0.0, 0.0, t0)], t0);
        let track = tracker.get(0).unwrap();

        assert_eq!(tracker.score(track, &det_at(0.0, 0.0, t0)), 1.0);
        let corner = tracker.score(track, &det_at(1920.0, 1080.0, t0));
        assert!(corner.abs() < 1e-12);
        let near = tracker.score(track, &det_at(10.0, 0.0, t0));
        let far = tracker.score(track, &det_at(100.0, 0.0, t0));
        assert!(near > far && far > 0.0 && near < 1.0);
    }

    #[test]
    fn empty_batch_only_prunes() {
        let t0 = Instant::now();
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(10.0, 10.0, t0)], t0);

        tracker.update_at(Vec::new(), t0 + Duration::from_millis(50));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.get(0).unwrap().history().len(), 1);

        tracker.update_at(Vec::new(), t0 + Duration::from_millis(101));
        assert!(tracker.is_empty());
    }

    #[test]
    fn stale_track_is_replaced_by_fresh_id() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(150);
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(10.0, 10.0, t0)], t0);

        // Same place, but the old track aged out first.
        tracker.update_at(vec![det_at(10.0, 10.0, t1)], t1);
        let ids: Vec<TrackId> = tracker.tracks().map(Track::id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn identical_inputs_give_identical_tracks() {
        let t0 = Instant::now();
        let frames: Vec<Vec<(f64, f64)>> = vec![
            vec![(100.0, 100.0), (400.0, 300.0)],
            vec![(402.0, 301.0), (103.0, 99.0), (1500.0, 800.0)],
            vec![(106.0, 98.0)],
            vec![(1498.0, 805.0), (110.0, 97.0), (110.0, 97.0)],
        ];

        let run = || {
            let mut tracker = Tracker::new(SCREEN, config()).unwrap();
            for (i, frame) in frames.iter().enumerate() {
                let at = t0 + Duration::from_millis(30 * i as u64);
                let batch = frame.iter().map(|&(x, y)| det_at(x, y, at)).collect();
                tracker.update_at(batch, at);
            }
            tracker.tracks().cloned().collect::<Vec<Track>>()
        };

        let first = run();
        assert_eq!(first, run());
        assert!(!first.is_empty());
    }

    #[test]
    fn equal_scores_prefer_lowest_track_id() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(16);
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(100.0, 100.0, t0), det_at(120.0, 100.0, t0)], t0);

        // Equidistant from both tracks.
        tracker.update_at(vec![det_at(110.0, 100.0, t1)], t1);
        assert_eq!(tracker.get(0).unwrap().history().len(), 2);
        assert_eq!(tracker.get(1).unwrap().history().len(), 1);
    }

    #[test]
    fn aborted_frame_leaves_previous_tracks_intact() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(16);
        let mut tracker = Tracker::new(SCREEN, config()).unwrap();
        tracker.update_at(vec![det_at(100.0, 100.0, t1)], t1);
        let before: Vec<Track> = tracker.tracks().cloned().collect();

        // A detection captured before the track's newest entry is a defect and panics
        // mid-frame.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tracker.update_at(vec![det_at(500.0, 500.0, t1), det_at(101.0, 100.0, t0)], t1);
        }));
        assert!(result.is_err());

        let after: Vec<Track> = tracker.tracks().cloned().collect();
        assert_eq!(before, after);
    }
}
