// THEORY:
// The `target_selector` module is the decision layer. Given the stable track set from
// the tracker, it decides each frame *whether* to act, *which* track to act on, and
// *what* to emit through the input port.
//
// Key architectural principles:
// 1.  **Level-Triggered Activation**: Nothing happens unless the activation control is
//     held. While it is held, aim and trigger are re-evaluated every frame. There is no
//     edge detection and no state carried between frames.
// 2.  **Nearest Target**: The aim target is the track whose latest centre is closest
//     to the crosshair. Ties go to the first track in iteration order.
// 3.  **Predicted Aim, Observed Trigger**: Aim uses the track's interpolated position
//     to hide pipeline latency. The trigger decision uses each track's latest observed
//     trigger box, so fire never depends on a prediction.

use crate::core_modules::config::{ConfigError, SelectorConfig};
use crate::core_modules::detection::TargetMode;
use crate::core_modules::geometry::Point;
use crate::core_modules::input::InputPort;
use crate::core_modules::track::Track;
use tracing::debug;

/// The per-frame switches the selector reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectorFlags {
    pub activation_held: bool,
    pub aim_enabled: bool,
    pub trigger_enabled: bool,
    pub mode: TargetMode,
}

/// What the selector decided for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Selection<'a> {
    /// The track chosen for aiming, if any.
    pub target: Option<&'a Track>,
    /// The relative move issued through the input port, if any.
    pub aim_delta: Option<Point>,
    /// True if a fire action was issued.
    pub fired: bool,
}

#[derive(Debug, Clone)]
pub struct TargetSelector {
    config: SelectorConfig,
}

impl TargetSelector {
    pub fn new(config: SelectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// The track whose latest centre is nearest to `crosshair`.
    pub fn select<'a>(
        &self,
        crosshair: Point,
        tracks: impl IntoIterator<Item = &'a Track>,
    ) -> Option<&'a Track> {
        let mut best: Option<(f64, &'a Track)> = None;
        for track in tracks {
            let distance = crosshair.distance_to(track.latest().position(TargetMode::Center));
            if best.is_none_or(|(best_distance, _)| distance < best_distance) {
                best = Some((distance, track));
            }
        }
        best.map(|(_, track)| track)
    }

    /// The scaled correction that moves the crosshair onto the track's predicted aim point.
    pub fn aim_delta(&self, crosshair: Point, track: &Track, mode: TargetMode) -> Point {
        (track.interpolate().position(mode) - crosshair) * self.config.sensitivity
    }

    /// True if `crosshair` lies within any track's trigger box, edges included.
    pub fn on_target<'a>(&self, crosshair: Point, tracks: impl IntoIterator<Item = &'a Track>) -> bool {
        tracks.into_iter().any(|track| {
            track
                .latest()
                .trigger_box(self.config.trigger_box_scale)
                .contains(crosshair)
        })
    }

    /// Runs one frame of target selection, issuing aim and fire actions through `input`.
    pub fn run<'a, P>(
        &self,
        crosshair: Point,
        tracks: impl IntoIterator<Item = &'a Track> + Clone,
        flags: SelectorFlags,
        input: &mut P,
    ) -> Selection<'a>
    where
        P: InputPort + ?Sized,
    {
        if !flags.activation_held || !(flags.aim_enabled || flags.trigger_enabled) {
            return Selection::default();
        }

        let mut selection = Selection::default();

        if flags.aim_enabled {
            selection.target = self.select(crosshair, tracks.clone());
            if let Some(track) = selection.target {
                let delta = self.aim_delta(crosshair, track, flags.mode);
                debug!(track_id = track.id(), dx = delta.x, dy = delta.y, "aiming");
                input.move_relative(delta);
                selection.aim_delta = Some(delta);
            }
        }

        if flags.trigger_enabled && self.on_target(crosshair, tracks) {
            debug!("crosshair inside trigger box, firing");
            input.fire_once();
            selection.fired = true;
        }

        selection
    }
}
