// THEORY:
// A `Detection` is the raw sensory input of the targeting engine: one bounding box
// reported by the external detector for a single frame. It plays the same role a
// single-frame blob plays in a motion engine. It is a "dumb", immutable snapshot
// with no memory of previous frames.
//
// Key architectural principles:
// 1.  **Validated at the Boundary**: The detector is an external collaborator, so every
//     `Detection` is checked on construction (confidence in [0, 1], corners ordered,
//     coordinates finite). Nothing downstream re-checks these invariants.
// 2.  **Untrusted Identity**: `identity` is whatever hint the detector attached. It may
//     repeat, vanish or churn between frames. The tracker never keys on it.
// 3.  **Derived Aim Points**: `position` turns the box into a point of interest. The
//     head and chest modes approximate anatomy from the box's aspect ratio alone, so
//     no per-target calibration is needed.

use crate::core_modules::geometry::{Point, Rect};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// Aspect ratio (height / width) at or below which a box is treated as "square",
/// e.g. a crouching or partially visible target.
const MIN_ASPECT_RATIO: f64 = 1.0;
/// Aspect ratio at or above which a box is treated as a fully "tall/thin" standing target.
const MAX_ASPECT_RATIO: f64 = 2.465;
/// Vertical offset (fraction of box height from the top) used for square boxes.
const SQUARE_OFFSET: f64 = 0.5;
const HEAD_TALL_OFFSET: f64 = 0.1;
const CHEST_TALL_OFFSET: f64 = 0.28;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("box corners are inverted: top-left {top_left:?}, bottom-right {bottom_right:?}")]
    InvertedBox { top_left: Point, bottom_right: Point },
    #[error("box corners must be finite: top-left {top_left:?}, bottom-right {bottom_right:?}")]
    NonFiniteBox { top_left: Point, bottom_right: Point },
}

/// Which point of a detection's box to aim at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetMode {
    #[default]
    Center,
    Head,
    Chest,
}

impl TargetMode {
    pub const ALL: [TargetMode; 3] = [TargetMode::Center, TargetMode::Head, TargetMode::Chest];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetMode::Center => "center",
            TargetMode::Head => "head",
            TargetMode::Chest => "chest",
        }
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "center" => Ok(TargetMode::Center),
            "head" => Ok(TargetMode::Head),
            "chest" => Ok(TargetMode::Chest),
            other => Err(format!("unknown target mode '{other}'")),
        }
    }
}

/// One detector-reported bounding box for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// The detector's own identity hint. Not a stable cross-frame key.
    identity: Option<u64>,
    /// Detector confidence in [0, 1].
    confidence: f64,
    /// The axis-aligned box of the detection, in screen pixels.
    bounds: Rect,
    /// When this detection was captured. Set once at construction.
    captured_at: Instant,
}

impl Detection {
    /// Creates a detection stamped with the current monotonic time.
    pub fn new(
        identity: Option<u64>,
        confidence: f64,
        top_left: Point,
        bottom_right: Point,
    ) -> Result<Self, DetectionError> {
        Self::new_at(identity, confidence, top_left, bottom_right, Instant::now())
    }

    /// Creates a detection with an explicit capture time.
    pub fn new_at(
        identity: Option<u64>,
        confidence: f64,
        top_left: Point,
        bottom_right: Point,
        captured_at: Instant,
    ) -> Result<Self, DetectionError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DetectionError::ConfidenceOutOfRange(confidence));
        }
        if !top_left.is_finite() || !bottom_right.is_finite() {
            return Err(DetectionError::NonFiniteBox {
                top_left,
                bottom_right,
            });
        }
        if top_left.x > bottom_right.x || top_left.y > bottom_right.y {
            return Err(DetectionError::InvertedBox {
                top_left,
                bottom_right,
            });
        }

        Ok(Self {
            identity,
            confidence,
            bounds: Rect::new(top_left, bottom_right),
            captured_at,
        })
    }

    pub fn identity(&self) -> Option<u64> {
        self.identity
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn top_left(&self) -> Point {
        self.bounds.top_left
    }

    pub fn bottom_right(&self) -> Point {
        self.bounds.bottom_right
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    pub fn area(&self) -> f64 {
        self.bounds.area()
    }

    /// The point of interest for the given aim mode.
    pub fn position(&self, mode: TargetMode) -> Point {
        let center = self.bounds.center();
        let tall_offset = match mode {
            TargetMode::Center => return center,
            TargetMode::Head => HEAD_TALL_OFFSET,
            TargetMode::Chest => CHEST_TALL_OFFSET,
        };

        // 0 for a square box, 1 for a fully tall one.
        let blend = (self.aspect_ratio() - MIN_ASPECT_RATIO) / (MAX_ASPECT_RATIO - MIN_ASPECT_RATIO);
        let offset = SQUARE_OFFSET + (tall_offset - SQUARE_OFFSET) * blend;

        Point::new(center.x, self.bounds.top_left.y + self.height() * offset)
    }

    /// A box concentric with this detection, shrunk by `scale` on each axis.
    pub fn trigger_box(&self, scale: f64) -> Rect {
        Rect::centered(
            self.bounds.center(),
            self.width() * scale,
            self.height() * scale,
        )
    }

    /// A copy of this detection moved so its centre lies at `center`. Size, confidence,
    /// identity and capture time are kept.
    pub(crate) fn recentered(&self, center: Point) -> Detection {
        Detection {
            bounds: Rect::centered(center, self.width(), self.height()),
            ..self.clone()
        }
    }

    /// A copy of this detection shifted by `offset`, e.g. from region-of-interest
    /// coordinates into screen coordinates.
    pub fn translated(&self, offset: Point) -> Detection {
        Detection {
            bounds: Rect::new(self.bounds.top_left + offset, self.bounds.bottom_right + offset),
            ..self.clone()
        }
    }

    /// Height over width, clamped to the calibrated range.
    fn aspect_ratio(&self) -> f64 {
        let (w, h) = (self.width(), self.height());
        let ratio = if w > 0.0 {
            h / w
        } else if h > 0.0 {
            MAX_ASPECT_RATIO
        } else {
            MIN_ASPECT_RATIO
        };
        ratio.clamp(MIN_ASPECT_RATIO, MAX_ASPECT_RATIO)
    }
}
