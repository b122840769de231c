// THEORY:
// The `region_mask` module is the first filtering stage applied to raw detector
// output. Detectors reliably hallucinate targets in some parts of the screen (HUD
// chrome, the player's own weapon or body). A `MaskRegion` names such an area and a
// `RegionMask` drops every detection that sits mostly inside one of them.
//
// Key architectural principles:
// 1.  **Resolution Independence**: Regions are stored as fractions of the screen
//     (0..1 per axis) and only converted to pixels when a frame is checked, so one
//     configuration works at any resolution.
// 2.  **Area Overlap, not Containment**: A detection is masked when the share of its
//     own area inside the region reaches the region's threshold.
// 3.  **Stateless Utility**: Filtering is a pure function of the screen size and the
//     detection list. It preserves the order of surviving detections.

use crate::core_modules::config::ConfigError;
use crate::core_modules::detection::Detection;
use crate::core_modules::geometry::{Point, Rect};
use serde::Deserialize;
use tracing::debug;

/// One masked area of the screen, in fractional screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "MaskRegionDef")]
pub struct MaskRegion {
    xy1: Point,
    xy2: Point,
    threshold: f64,
}

/// Raw on-disk shape of a mask region, validated into a `MaskRegion`.
#[derive(Debug, Clone, Copy, Deserialize)]
struct MaskRegionDef {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    #[serde(default = "default_threshold")]
    threshold: f64,
}

fn default_threshold() -> f64 {
    0.9
}

impl TryFrom<MaskRegionDef> for MaskRegion {
    type Error = ConfigError;

    fn try_from(def: MaskRegionDef) -> Result<Self, Self::Error> {
        MaskRegion::new(
            Point::new(def.x1, def.y1),
            Point::new(def.x2, def.y2),
            def.threshold,
        )
    }
}

impl MaskRegion {
    pub fn new(xy1: Point, xy2: Point, threshold: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::MaskThreshold(threshold));
        }
        let fractional = |v: f64| (0.0..=1.0).contains(&v);
        if ![xy1.x, xy1.y, xy2.x, xy2.y].into_iter().all(fractional)
            || xy1.x > xy2.x
            || xy1.y > xy2.y
        {
            return Err(ConfigError::MaskBounds { xy1, xy2 });
        }
        Ok(Self { xy1, xy2, threshold })
    }

    pub fn xy1(&self) -> Point {
        self.xy1
    }

    pub fn xy2(&self) -> Point {
        self.xy2
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The region converted to pixel coordinates for the given screen size.
    pub fn to_pixels(&self, screen_size: Point) -> Rect {
        Rect::new(self.xy1 * screen_size, self.xy2 * screen_size)
    }

    /// The share of `detection`'s area that lies inside this region, in [0, 1].
    /// Degenerate (zero-area) detections report 0.
    pub fn overlap_ratio(&self, screen_size: Point, detection: &Detection) -> f64 {
        let bounds = detection.bounds();
        let Some(intersection) = self.to_pixels(screen_size).intersection(&bounds) else {
            return 0.0;
        };

        let full_area = bounds.area();
        if full_area <= 0.0 {
            debug!(?bounds, "zero-area detection ignored by mask region");
            return 0.0;
        }

        let inside_area = intersection.area();
        assert!(
            (0.0..=full_area).contains(&inside_area),
            "mask intersection area {inside_area} outside [0, {full_area}]"
        );

        inside_area / full_area
    }

    /// True if at least `threshold` of the detection's area falls in this region.
    /// Always false when the two boxes do not overlap.
    pub fn includes(&self, screen_size: Point, detection: &Detection) -> bool {
        let bounds = detection.bounds();
        if !self.to_pixels(screen_size).overlaps(&bounds) || bounds.area() <= 0.0 {
            return false;
        }
        self.overlap_ratio(screen_size, detection) >= self.threshold
    }
}

/// Drops detections that fall inside any configured mask region.
#[derive(Debug, Clone, Default)]
pub struct RegionMask {
    regions: Vec<MaskRegion>,
}

impl RegionMask {
    pub fn new(regions: impl IntoIterator<Item = MaskRegion>) -> Self {
        Self {
            regions: regions.into_iter().collect(),
        }
    }

    pub fn regions(&self) -> &[MaskRegion] {
        &self.regions
    }

    /// Returns the detections no region includes, in their original order.
    pub fn filter(&self, screen_size: Point, detections: Vec<Detection>) -> Vec<Detection> {
        if self.regions.is_empty() {
            return detections;
        }

        let before = detections.len();
        let kept: Vec<Detection> = detections
            .into_iter()
            .filter(|d| !self.regions.iter().any(|r| r.includes(screen_size, d)))
            .collect();

        if kept.len() != before {
            debug!(masked = before - kept.len(), kept = kept.len(), "mask filtered detections");
        }
        kept
    }
}
