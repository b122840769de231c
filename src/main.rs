// Replay runner for the `sightline` engine.
//
// Usage: sightline <config.toml> <batches.jsonl>
//
// Each input line is one frame of recorded detector output plus the input state at
// that frame. Frames are replayed 1/60 s apart. Every processed frame is published on
// the overlay bus and printed to stdout as one JSON line; aim and fire actions are
// logged to stderr.

use anyhow::{Context, bail};
use serde::Deserialize;
use sightline::core_modules::presentation::OverlayBus;
use sightline::{Detection, InputPort, KeyCode, KeySnapshot, Point, TargetingConfig, TargetingPipeline};
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_INTERVAL: Duration = Duration::from_nanos(16_666_667);

#[derive(Debug, Deserialize)]
struct RecordedDetection {
    #[serde(default)]
    identity: Option<u64>,
    confidence: f64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    frame_id: u64,
    #[serde(default)]
    activation_held: bool,
    #[serde(default)]
    pressed_keys: Vec<KeyCode>,
    #[serde(default)]
    detections: Vec<RecordedDetection>,
}

/// Replays recorded input state and logs the actions the engine emits.
#[derive(Debug, Default)]
struct ReplayInput {
    keys: KeySnapshot,
    activation_held: bool,
    frame_id: u64,
}

impl InputPort for ReplayInput {
    fn poll_keys(&mut self) -> KeySnapshot {
        self.keys.clone()
    }

    fn is_activation_held(&self, _control: &KeyCode) -> bool {
        self.activation_held
    }

    fn move_relative(&mut self, delta: Point) {
        // Relative pointer devices take whole units.
        let (dx, dy) = (delta.x.trunc() as i32, delta.y.trunc() as i32);
        info!(frame_id = self.frame_id, dx, dy, "move");
    }

    fn fire_once(&mut self) {
        info!(frame_id = self.frame_id, "fire");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: sightline <config.toml> <batches.jsonl>");
    }
    let config = TargetingConfig::load(&args[1])
        .with_context(|| format!("loading config from {}", args[1]))?;
    let replay = std::fs::File::open(&args[2])
        .with_context(|| format!("opening replay file {}", args[2]))?;

    // --- 2. Overlay Output ---
    let bus = OverlayBus::new(64);
    let mut overlay_rx = bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match overlay_rx.recv().await {
                Ok(frame) => match serde_json::to_string(&frame) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!(error = %e, "failed to encode overlay frame"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "overlay printer lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // --- 3. Main Processing Loop ---
    let mut pipeline = TargetingPipeline::new(config)?;
    let mut input = ReplayInput::default();
    let start = Instant::now();

    for (index, line) in BufReader::new(replay).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: RecordedFrame = serde_json::from_str(&line)
            .with_context(|| format!("parsing replay line {}", index + 1))?;

        let now = start + FRAME_INTERVAL * index as u32;
        let detections = frame
            .detections
            .iter()
            .map(|d| {
                Detection::new_at(
                    d.identity,
                    d.confidence,
                    Point::new(d.x1, d.y1),
                    Point::new(d.x2, d.y2),
                    now,
                )
            })
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("invalid detection in frame {}", frame.frame_id))?;

        input.keys = KeySnapshot::new(frame.pressed_keys);
        input.activation_held = frame.activation_held;
        input.frame_id = frame.frame_id;

        let report = pipeline.process_detections_at(detections, &mut input, now);
        bus.publish(report.overlay);
    }

    info!(tracks = pipeline.tracker().len(), "replay finished");
    drop(bus);
    printer.await?;
    Ok(())
}
