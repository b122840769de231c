// THEORY:
// The `config` module is the single source of every tunable in a targeting session.
// There is no ambient mutable tuning state anywhere in the engine. The tracker and
// selector receive their own small, validated parameter structs at construction,
// which lets two sessions with different tuning run side by side.
//
// Key architectural principles:
// 1.  **Fail Fast**: `TargetingConfig::validate` rejects every out-of-range value before
//     the frame loop starts. A bad threshold never degrades silently at runtime.
// 2.  **Flat on Disk, Typed in Memory**: The TOML file is flat and forgiving (every
//     field has a default); the engine consumes typed views such as
//     `TrackerConfig` and `SelectorConfig`.

use crate::core_modules::geometry::{Point, Rect};
use crate::core_modules::input::KeyCode;
use crate::core_modules::region_mask::MaskRegion;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sensitivity must be positive and finite, got {0}")]
    Sensitivity(f64),
    #[error("confidence threshold must lie in [0, 1], got {0}")]
    ConfidenceThreshold(f64),
    #[error("trigger box scale must lie in (0, 1], got {0}")]
    TriggerBoxScale(f64),
    #[error("interpolation scale must be positive and finite, got {0}")]
    InterpolationScale(f64),
    #[error("track max age must be positive, got {0}s")]
    TrackMaxAge(f64),
    #[error("detection max age must be positive, got {0}s")]
    DetectionMaxAge(f64),
    #[error("mask threshold must lie in [0, 1], got {0}")]
    MaskThreshold(f64),
    #[error("mask region corners must be fractional and ordered: {xy1:?} .. {xy2:?}")]
    MaskBounds { xy1: Point, xy2: Point },
    #[error("screen size must be positive, got {width}x{height}")]
    ScreenSize { width: u32, height: u32 },
    #[error("region of interest {0:?} is empty or exceeds the screen")]
    RegionOfInterest(RegionOfInterest),
    #[error("activation control must name a key or button")]
    ActivationControl,
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The pixel rectangle of the screen that is captured and fed to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Keys that drive the on-screen menu.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_aim_toggle")]
    pub aim_toggle: KeyCode,
    #[serde(default = "default_trigger_toggle")]
    pub trigger_toggle: KeyCode,
    #[serde(default = "default_mode_cycle")]
    pub mode_cycle: KeyCode,
    #[serde(default = "default_boxes_toggle")]
    pub boxes_toggle: KeyCode,
}

/// Top-level session configuration, usually loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetingConfig {
    /// Key or button that must be held for the engine to act.
    #[serde(default = "default_activation_control")]
    pub activation_control: KeyCode,
    /// Linear scale applied to the aim delta before it is sent to the input port.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Detections below this confidence are discarded before masking.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_trigger_box_scale")]
    pub trigger_box_scale: f64,
    /// Look-ahead multiplier for motion interpolation.
    #[serde(default = "default_interpolation_scale")]
    pub interpolation_scale: f64,
    #[serde(default = "default_track_max_age_secs")]
    pub track_max_age_secs: f64,
    #[serde(default = "default_detection_max_age_secs")]
    pub detection_max_age_secs: f64,
    #[serde(default)]
    pub mask_regions: Vec<MaskRegion>,
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,
    #[serde(default = "default_screen_height")]
    pub screen_height: u32,
    /// Defaults to the full screen.
    #[serde(default)]
    pub region_of_interest: Option<RegionOfInterest>,
    #[serde(default)]
    pub key_bindings: KeyBindings,
}

/// Tuning for the tracker and its tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// A track not matched for longer than this is deleted.
    pub track_max_age: Duration,
    /// History entries older than this (relative to the newest entry) are pruned.
    pub detection_max_age: Duration,
    pub interpolation_scale: f64,
}

/// Tuning for target selection and aiming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorConfig {
    pub sensitivity: f64,
    pub trigger_box_scale: f64,
}

// Default value functions
fn default_activation_control() -> KeyCode {
    KeyCode::new("capslock")
}

fn default_sensitivity() -> f64 {
    1.0
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_trigger_box_scale() -> f64 {
    0.4
}

fn default_interpolation_scale() -> f64 {
    1.0
}

fn default_track_max_age_secs() -> f64 {
    0.5
}

fn default_detection_max_age_secs() -> f64 {
    1.0
}

fn default_screen_width() -> u32 {
    1920
}

fn default_screen_height() -> u32 {
    1080
}

fn default_aim_toggle() -> KeyCode {
    KeyCode::new("f1")
}

fn default_trigger_toggle() -> KeyCode {
    KeyCode::new("f2")
}

fn default_mode_cycle() -> KeyCode {
    KeyCode::new("f3")
}

fn default_boxes_toggle() -> KeyCode {
    KeyCode::new("f4")
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            aim_toggle: default_aim_toggle(),
            trigger_toggle: default_trigger_toggle(),
            mode_cycle: default_mode_cycle(),
            boxes_toggle: default_boxes_toggle(),
        }
    }
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            activation_control: default_activation_control(),
            sensitivity: default_sensitivity(),
            confidence_threshold: default_confidence_threshold(),
            trigger_box_scale: default_trigger_box_scale(),
            interpolation_scale: default_interpolation_scale(),
            track_max_age_secs: default_track_max_age_secs(),
            detection_max_age_secs: default_detection_max_age_secs(),
            mask_regions: Vec::new(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            region_of_interest: None,
            key_bindings: KeyBindings::default(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TargetingConfig::default().tracker_config()
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        TargetingConfig::default().selector_config()
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.track_max_age.is_zero() {
            return Err(ConfigError::TrackMaxAge(0.0));
        }
        if self.detection_max_age.is_zero() {
            return Err(ConfigError::DetectionMaxAge(0.0));
        }
        if !(self.interpolation_scale.is_finite() && self.interpolation_scale > 0.0) {
            return Err(ConfigError::InterpolationScale(self.interpolation_scale));
        }
        Ok(())
    }
}

impl SelectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(ConfigError::Sensitivity(self.sensitivity));
        }
        if !(self.trigger_box_scale > 0.0 && self.trigger_box_scale <= 1.0) {
            return Err(ConfigError::TriggerBoxScale(self.trigger_box_scale));
        }
        Ok(())
    }
}

impl TargetingConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: TargetingConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.activation_control.as_str().is_empty() {
            return Err(ConfigError::ActivationControl);
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ConfidenceThreshold(self.confidence_threshold));
        }
        // Seconds are checked here because `Duration` cannot hold negatives or NaN.
        if !(self.track_max_age_secs.is_finite() && self.track_max_age_secs > 0.0) {
            return Err(ConfigError::TrackMaxAge(self.track_max_age_secs));
        }
        if !(self.detection_max_age_secs.is_finite() && self.detection_max_age_secs > 0.0) {
            return Err(ConfigError::DetectionMaxAge(self.detection_max_age_secs));
        }
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(ConfigError::ScreenSize {
                width: self.screen_width,
                height: self.screen_height,
            });
        }
        if let Some(roi) = self.region_of_interest {
            let fits = roi.width > 0
                && roi.height > 0
                && roi.x.checked_add(roi.width).is_some_and(|r| r <= self.screen_width)
                && roi.y.checked_add(roi.height).is_some_and(|b| b <= self.screen_height);
            if !fits {
                return Err(ConfigError::RegionOfInterest(roi));
            }
        }
        self.tracker_config().validate()?;
        self.selector_config().validate()?;
        Ok(())
    }

    pub fn screen_size(&self) -> Point {
        Point::new(self.screen_width as f64, self.screen_height as f64)
    }

    /// The reference point the selector aims from.
    pub fn crosshair(&self) -> Point {
        self.screen_size() / 2.0
    }

    pub fn region_of_interest(&self) -> RegionOfInterest {
        self.region_of_interest.unwrap_or(RegionOfInterest {
            x: 0,
            y: 0,
            width: self.screen_width,
            height: self.screen_height,
        })
    }

    /// The region of interest as a pixel rectangle.
    pub fn region_rect(&self) -> Rect {
        let roi = self.region_of_interest();
        let top_left = Point::new(roi.x as f64, roi.y as f64);
        Rect::new(
            top_left,
            top_left + Point::new(roi.width as f64, roi.height as f64),
        )
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            track_max_age: secs_to_duration(self.track_max_age_secs),
            detection_max_age: secs_to_duration(self.detection_max_age_secs),
            interpolation_scale: self.interpolation_scale,
        }
    }

    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            sensitivity: self.sensitivity,
            trigger_box_scale: self.trigger_box_scale,
        }
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}
