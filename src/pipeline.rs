// THEORY:
// The `pipeline` module is the top-level API of the targeting engine. It runs one
// frame strictly in sequence:
//
//   detect -> confidence gate -> region mask -> tracker update -> key snapshot diff
//   -> menu -> target selection / input actions -> overlay snapshot
//
// Nothing here blocks except the detector call, which belongs to the collaborator.
// The tracker's arena is owned by the pipeline and touched only inside
// `process_*`, so no locking is needed as long as one thread drives a session.

use crate::core_modules::config::{ConfigError, TargetingConfig};
use crate::core_modules::detection::Detection;
use crate::core_modules::detector::{Detector, DetectorError};
use crate::core_modules::geometry::Point;
use crate::core_modules::input::{InputPort, KeySnapshot};
use crate::core_modules::menu::{AIM_ITEM, BOXES_ITEM, Menu, TRIGGER_ITEM};
use crate::core_modules::presentation::{FrameCounter, OverlayFrame, TrackSummary};
use crate::core_modules::region_mask::RegionMask;
use crate::core_modules::target_selector::{SelectorFlags, TargetSelector};
use crate::core_modules::track::TrackId;
use crate::core_modules::tracker::Tracker;
use image::RgbaImage;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("detector failed: {0}")]
    Detector(#[source] DetectorError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The outcome of one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub target_id: Option<TrackId>,
    pub aim_delta: Option<Point>,
    pub fired: bool,
    pub overlay: OverlayFrame,
}

/// One targeting session: masking, tracking and selection for a fixed screen geometry.
pub struct TargetingPipeline {
    config: TargetingConfig,
    mask: RegionMask,
    tracker: Tracker,
    selector: TargetSelector,
    menu: Menu,
    previous_keys: KeySnapshot,
    frame_counter: FrameCounter,
    frame_id: u64,
}

impl TargetingPipeline {
    pub fn new(config: TargetingConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let tracker = Tracker::new(config.screen_size(), config.tracker_config())?;
        let selector = TargetSelector::new(config.selector_config())?;
        let mask = RegionMask::new(config.mask_regions.iter().copied());
        let menu = Menu::from_bindings(&config.key_bindings);

        info!(
            width = config.screen_width,
            height = config.screen_height,
            masks = mask.regions().len(),
            "targeting session started"
        );

        Ok(Self {
            config,
            mask,
            tracker,
            selector,
            menu,
            previous_keys: KeySnapshot::default(),
            frame_counter: FrameCounter::new(),
            frame_id: 0,
        })
    }

    pub fn config(&self) -> &TargetingConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    /// Runs the detector on a captured region image and processes its detections.
    /// On detector failure nothing in the session changes.
    pub fn process_frame<D, P>(
        &mut self,
        detector: &mut D,
        image: &RgbaImage,
        input: &mut P,
    ) -> Result<FrameReport, PipelineError>
    where
        D: Detector + ?Sized,
        P: InputPort + ?Sized,
    {
        let roi = self.config.region_of_interest();
        let detections = detector
            .detect(image, (roi.width, roi.height), self.config.confidence_threshold)
            .map_err(PipelineError::Detector)?;

        let origin = self.config.region_rect().top_left;
        let detections = detections.iter().map(|d| d.translated(origin)).collect();
        Ok(self.process_detections_at(detections, input, Instant::now()))
    }

    /// Processes detections already in screen coordinates.
    pub fn process_detections<P>(&mut self, detections: Vec<Detection>, input: &mut P) -> FrameReport
    where
        P: InputPort + ?Sized,
    {
        self.process_detections_at(detections, input, Instant::now())
    }

    /// Processes detections already in screen coordinates, treating `now` as the
    /// current time.
    pub fn process_detections_at<P>(
        &mut self,
        mut detections: Vec<Detection>,
        input: &mut P,
        now: Instant,
    ) -> FrameReport
    where
        P: InputPort + ?Sized,
    {
        let screen_size = self.config.screen_size();

        // --- 1. Filtering ---
        let threshold = self.config.confidence_threshold;
        detections.retain(|d| d.confidence() >= threshold);
        let detections = self.mask.filter(screen_size, detections);

        // --- 2. Tracking ---
        self.tracker.update_at(detections, now);

        // --- 3. User Input ---
        let keys = input.poll_keys();
        let changes = keys.diff(&self.previous_keys);
        if !changes.is_empty() {
            self.menu.apply(&changes);
        }
        self.previous_keys = keys;

        // --- 4. Selection ---
        let flags = SelectorFlags {
            activation_held: input.is_activation_held(&self.config.activation_control),
            aim_enabled: self.menu.is_enabled(AIM_ITEM),
            trigger_enabled: self.menu.is_enabled(TRIGGER_ITEM),
            mode: self.menu.target_mode(),
        };
        let crosshair = self.config.crosshair();
        let selection = self
            .selector
            .run(crosshair, self.tracker.tracks(), flags, input);
        let target_id = selection.target.map(|t| t.id());
        let (aim_delta, fired) = (selection.aim_delta, selection.fired);

        // --- 5. Presentation ---
        self.frame_counter.increment_at(now);
        let overlay = self.overlay_frame(target_id, fired);
        debug!(
            frame_id = self.frame_id,
            tracks = overlay.tracks.len(),
            ?target_id,
            fired,
            "frame processed"
        );
        self.frame_id += 1;

        FrameReport {
            target_id,
            aim_delta,
            fired,
            overlay,
        }
    }

    fn overlay_frame(&self, target_id: Option<TrackId>, fired: bool) -> OverlayFrame {
        let screen_size = self.config.screen_size();
        let scale = self.selector.config().trigger_box_scale;
        OverlayFrame {
            frame_id: self.frame_id,
            fps: self.frame_counter.fps(),
            region_of_interest: self.config.region_rect(),
            mask_regions: self
                .mask
                .regions()
                .iter()
                .map(|r| r.to_pixels(screen_size))
                .collect(),
            tracks: self
                .tracker
                .tracks()
                .map(|t| TrackSummary::from_track(t, scale))
                .collect(),
            target_id,
            fired,
            show_trigger_boxes: self.menu.is_enabled(BOXES_ITEM),
            menu: self.menu.entries(),
        }
    }
}
