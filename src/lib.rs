// THEORY:
// This file is the main entry point for the `sightline` library crate. It exposes
// the `TargetingPipeline` (and its latest-batch variant, `ParallelPipeline`) as the
// high-level interface of the engine, together with the layered `core_modules`:
//
//   geometry -> detection -> region_mask -> track -> tracker -> target_selector
//
// Capture, inference, overlay rendering and input devices stay outside the crate and
// are reached only through the `Detector` and `InputPort` traits and the read-only
// `OverlayFrame` snapshots.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::config::{ConfigError, TargetingConfig};
pub use core_modules::detection::{Detection, DetectionError, TargetMode};
pub use core_modules::detector::{Detector, DetectorError};
pub use core_modules::geometry::{Point, Rect};
pub use core_modules::input::{InputPort, KeyCode, KeySnapshot};
pub use pipeline::{FrameReport, PipelineError, TargetingPipeline};
