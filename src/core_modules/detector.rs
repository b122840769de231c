// THEORY:
// The object detector is an external collaborator: a model turns a captured image of
// the region of interest into raw detections. The engine only sees it through this
// trait. Implementations must return detections that already satisfy the
// `Detection` invariants, in coordinates relative to the captured region.

use crate::core_modules::detection::Detection;
use image::RgbaImage;

/// Error raised by a detector implementation. Never handled inside the engine.
pub type DetectorError = Box<dyn std::error::Error + Send + Sync>;

pub trait Detector {
    /// Runs inference on one captured region. `region_size` is the region's
    /// `(width, height)` in pixels. Detections below `confidence_threshold` may be
    /// dropped by the detector; the pipeline drops any that remain.
    fn detect(
        &mut self,
        image: &RgbaImage,
        region_size: (u32, u32),
        confidence_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(
        &mut self,
        image: &RgbaImage,
        region_size: (u32, u32),
        confidence_threshold: f64,
    ) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(image, region_size, confidence_threshold)
    }
}
