// THEORY:
// The `parallel_pipeline` module moves capture and inference off the frame loop to
// hide detector latency, without giving up the single-owner tracker. The hand-off
// between the two sides is exactly one value: the latest complete detection batch.
//
// Key architectural principles:
// 1.  **Single Hand-Off Point**: A detector worker publishes `DetectionBatch`es into a
//     `tokio::sync::watch` slot. The frame loop is the only reader and still owns the
//     tracker, so tracking and selection remain sequential.
// 2.  **Last Write Wins**: The slot only ever moves forward in `frame_id`. A batch that
//     finishes after a newer one has been published is discarded, and the reader never
//     applies the same or an older frame twice.
// 3.  **Blocking Work Stays on Blocking Threads**: Inference runs inside
//     `spawn_blocking`, so a slow model never stalls the async runtime.

use crate::core_modules::config::TargetingConfig;
use crate::core_modules::detection::Detection;
use crate::core_modules::detector::Detector;
use crate::core_modules::input::InputPort;
use crate::pipeline::{FrameReport, PipelineError, TargetingPipeline};
use image::RgbaImage;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One captured region image waiting for inference.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame_id: u64,
    pub image: RgbaImage,
    pub captured_at: Instant,
}

/// All detections of one frame, in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionBatch {
    pub frame_id: u64,
    pub detections: Vec<Detection>,
}

/// Creates a connected publisher and receiver for detection batches.
pub fn batch_channel() -> (BatchPublisher, BatchReceiver) {
    let (tx, rx) = watch::channel(None);
    (
        BatchPublisher { tx },
        BatchReceiver {
            rx,
            last_applied: None,
        },
    )
}

/// The writing side of the hand-off, held by the detector worker.
#[derive(Debug, Clone)]
pub struct BatchPublisher {
    tx: watch::Sender<Option<DetectionBatch>>,
}

impl BatchPublisher {
    /// Offers a batch. Returns false, and discards it, if a batch for the same or a
    /// newer frame is already published.
    pub fn publish(&self, batch: DetectionBatch) -> bool {
        let frame_id = batch.frame_id;
        let accepted = self.tx.send_if_modified(|slot| {
            if slot.as_ref().is_some_and(|current| current.frame_id >= frame_id) {
                return false;
            }
            *slot = Some(batch);
            true
        });

        if !accepted {
            warn!(frame_id, "discarding stale detection batch");
        }
        accepted
    }
}

/// The reading side of the hand-off, held by the frame loop.
#[derive(Debug)]
pub struct BatchReceiver {
    rx: watch::Receiver<Option<DetectionBatch>>,
    last_applied: Option<u64>,
}

impl BatchReceiver {
    /// The published batch, if it is newer than the last one taken.
    pub fn take_newer(&mut self) -> Option<DetectionBatch> {
        let batch = self.rx.borrow_and_update().clone()?;
        if self.last_applied.is_some_and(|last| batch.frame_id <= last) {
            return None;
        }
        self.last_applied = Some(batch.frame_id);
        Some(batch)
    }

    /// Waits for a batch newer than the last one taken. Returns `None` once every
    /// publisher is gone and nothing newer remains.
    pub async fn next_batch(&mut self) -> Option<DetectionBatch> {
        loop {
            if let Some(batch) = self.take_newer() {
                return Some(batch);
            }
            if self.rx.changed().await.is_err() {
                return self.take_newer();
            }
        }
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }
}

/// Runs `detector` over captured frames on a blocking thread, publishing one batch per
/// frame. The worker stops when the frame channel closes, or with the first detector
/// error, which is returned through the join handle.
pub fn spawn_detector_worker<D>(
    mut detector: D,
    mut frames: mpsc::Receiver<CapturedFrame>,
    publisher: BatchPublisher,
    config: &TargetingConfig,
) -> JoinHandle<Result<(), PipelineError>>
where
    D: Detector + Send + 'static,
{
    let roi = config.region_of_interest();
    let origin = config.region_rect().top_left;
    let confidence_threshold = config.confidence_threshold;

    tokio::task::spawn_blocking(move || {
        while let Some(frame) = frames.blocking_recv() {
            let detections = detector
                .detect(&frame.image, (roi.width, roi.height), confidence_threshold)
                .map_err(PipelineError::Detector)?;
            debug!(
                frame_id = frame.frame_id,
                count = detections.len(),
                latency_ms = frame.captured_at.elapsed().as_millis() as u64,
                "inference complete"
            );

            publisher.publish(DetectionBatch {
                frame_id: frame.frame_id,
                detections: detections.iter().map(|d| d.translated(origin)).collect(),
            });
        }
        Ok(())
    })
}

/// A targeting session fed by a background detector worker.
pub struct ParallelPipeline {
    pipeline: TargetingPipeline,
    batches: BatchReceiver,
}

impl ParallelPipeline {
    pub fn new(config: TargetingConfig, batches: BatchReceiver) -> Result<Self, PipelineError> {
        Ok(Self {
            pipeline: TargetingPipeline::new(config)?,
            batches,
        })
    }

    pub fn pipeline(&self) -> &TargetingPipeline {
        &self.pipeline
    }

    /// Processes the latest batch if a newer one is waiting. Never blocks.
    pub fn try_process<P>(&mut self, input: &mut P) -> Option<FrameReport>
    where
        P: InputPort + ?Sized,
    {
        let batch = self.batches.take_newer()?;
        Some(self.pipeline.process_detections(batch.detections, input))
    }

    /// Waits for the next newer batch and processes it. Returns `None` once the worker
    /// side has shut down.
    pub async fn process_next<P>(&mut self, input: &mut P) -> Option<FrameReport>
    where
        P: InputPort + ?Sized,
    {
        let batch = self.batches.next_batch().await?;
        Some(self.pipeline.process_detections(batch.detections, input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::detector::DetectorError;
    use crate::core_modules::geometry::Point;
    use crate::core_modules::input::testing::RecordingInput;

    fn batch(frame_id: u64, x: f64) -> DetectionBatch {
        let d = Detection::new(None, 0.9, Point::new(x, 100.0), Point::new(x + 40.0, 200.0)).unwrap();
        DetectionBatch {
            frame_id,
            detections: vec![d],
        }
    }

    /// Reports one detection per frame whose x position is the frame's first pixel's
    /// red channel.
    struct PixelDetector;

    impl Detector for PixelDetector {
        fn detect(
            &mut self,
            image: &RgbaImage,
            _region_size: (u32, u32),
            _confidence_threshold: f64,
        ) -> Result<Vec<Detection>, DetectorError> {
            let x = image.get_pixel(0, 0)[0] as f64;
            Ok(vec![Detection::new(None, 0.9, Point::new(x, 0.0), Point::new(x + 10.0, 10.0))?])
        }
    }

    struct BrokenDetector;

    impl Detector for BrokenDetector {
        fn detect(
            &mut self,
            _image: &RgbaImage,
            _region_size: (u32, u32),
            _confidence_threshold: f64,
        ) -> Result<Vec<Detection>, DetectorError> {
            Err("model crashed".into())
        }
    }

    fn frame(frame_id: u64, red: u8) -> CapturedFrame {
        let mut image = RgbaImage::new(4, 4);
        image.put_pixel(0, 0, image::Rgba([red, 0, 0, 255]));
        CapturedFrame {
            frame_id,
            image,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn older_batch_never_replaces_newer_one() {
        let (publisher, mut receiver) = batch_channel();
        assert!(receiver.take_newer().is_none());

        assert!(publisher.publish(batch(5, 10.0)));
        assert!(!publisher.publish(batch(4, 20.0)));
        assert!(!publisher.publish(batch(5, 30.0)));

        let taken = receiver.take_newer().unwrap();
        assert_eq!(taken.frame_id, 5);
        assert_eq!(taken.detections[0].top_left(), Point::new(10.0, 100.0));
        assert_eq!(receiver.take_newer(), None);
        assert_eq!(receiver.last_applied(), Some(5));

        assert!(publisher.publish(batch(7, 40.0)));
        assert_eq!(receiver.take_newer().map(|b| b.frame_id), Some(7));
    }

    #[test]
    fn intermediate_batches_are_skipped() {
        let (publisher, mut receiver) = batch_channel();
        for id in 1..=3 {
            publisher.publish(batch(id, id as f64));
        }
        assert_eq!(receiver.take_newer().map(|b| b.frame_id), Some(3));
    }

    #[tokio::test]
    async fn next_batch_waits_and_ends_with_publisher() {
        let (publisher, mut receiver) = batch_channel();
        let producer = tokio::spawn(async move {
            publisher.publish(batch(1, 0.0));
        });
        assert_eq!(receiver.next_batch().await.map(|b| b.frame_id), Some(1));
        producer.await.unwrap();
        assert_eq!(receiver.next_batch().await, None);
    }

    #[tokio::test]
    async fn worker_publishes_translated_batches() {
        let config = TargetingConfig {
            region_of_interest: Some(crate::core_modules::config::RegionOfInterest {
                x: 100,
                y: 50,
                width: 200,
                height: 200,
            }),
            ..TargetingConfig::default()
        };
        let (publisher, mut receiver) = batch_channel();
        let (frames_tx, frames_rx) = mpsc::channel(4);
        let worker = spawn_detector_worker(PixelDetector, frames_rx, publisher, &config);

        frames_tx.send(frame(0, 30)).await.unwrap();
        let first = receiver.next_batch().await.unwrap();
        assert_eq!(first.frame_id, 0);
        assert_eq!(first.detections[0].top_left(), Point::new(130.0, 50.0));

        drop(frames_tx);
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn worker_surfaces_detector_errors() {
        let (publisher, mut receiver) = batch_channel();
        let (frames_tx, frames_rx) = mpsc::channel(1);
        let worker = spawn_detector_worker(BrokenDetector, frames_rx, publisher, &TargetingConfig::default());

        frames_tx.send(frame(0, 0)).await.unwrap();
        let result = worker.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Detector(_))));
        assert_eq!(receiver.next_batch().await, None);
    }

    #[tokio::test]
    async fn parallel_pipeline_applies_only_newer_batches() {
        let (publisher, receiver) = batch_channel();
        let mut pipeline = ParallelPipeline::new(TargetingConfig::default(), receiver).unwrap();
        let mut input = RecordingInput::default();

        assert!(pipeline.try_process(&mut input).is_none());

        publisher.publish(batch(1, 500.0));
        let report = pipeline.try_process(&mut input).unwrap();
        assert_eq!(report.overlay.tracks.len(), 1);
        assert!(pipeline.try_process(&mut input).is_none());

        publisher.publish(batch(2, 505.0));
        drop(publisher);
        assert!(pipeline.process_next(&mut input).await.is_some());
        assert!(pipeline.process_next(&mut input).await.is_none());
        assert_eq!(pipeline.pipeline().tracker().len(), 1);
    }
}
