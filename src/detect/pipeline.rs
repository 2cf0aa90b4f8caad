//! Detection loop
//!
//! Pulls frames from the capture queue, runs the (optionally two-stage)
//! oracle, and either forwards a transfer job downstream or releases the
//! frame. Runs as a blocking loop on its own thread: detection is CPU-bound
//! and must not sit on the async runtime.

use tracing::{debug, info, warn};

use crate::capture::frame::Frame;
use crate::detect::annotate;
use crate::detect::oracle::DetectionOracle;
use crate::pipeline::FrameQueue;
use crate::transfer::{CropRegion, TransferJob};
use crate::DetectorConfig;

/// Per-frame verdict published on the optional result channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionOutcome {
    Detected { frame_id: u64, count: usize },
    NoDetection { frame_id: u64 },
}

pub struct DetectionPipeline {
    config: DetectorConfig,
    frames: FrameQueue<Frame>,
    control: flume::Receiver<bool>,
    stage1: Box<dyn DetectionOracle>,
    stage2: Option<Box<dyn DetectionOracle>>,
    jobs: Option<FrameQueue<TransferJob>>,
    results: Option<flume::Sender<DetectionOutcome>>,
}

impl DetectionPipeline {
    pub fn new(
        config: DetectorConfig,
        frames: FrameQueue<Frame>,
        control: flume::Receiver<bool>,
        stage1: Box<dyn DetectionOracle>,
    ) -> Self {
        Self {
            config,
            frames,
            control,
            stage1,
            stage2: None,
            jobs: None,
            results: None,
        }
    }

    pub fn with_stage2(mut self, stage2: Box<dyn DetectionOracle>) -> Self {
        self.stage2 = Some(stage2);
        self
    }

    /// Without an output queue the pipeline runs detection-only and releases
    /// every frame as soon as the oracle has seen it.
    pub fn with_output(mut self, jobs: FrameQueue<TransferJob>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_results(mut self, results: flume::Sender<DetectionOutcome>) -> Self {
        self.results = Some(results);
        self
    }

    /// Run until the control channel closes. Blocks the calling thread; the
    /// tick keeps pause toggles responsive without spinning when idle.
    pub fn run(mut self) {
        let tick = self.config.tick();
        let mut running = true;
        loop {
            // Last control write wins.
            loop {
                match self.control.try_recv() {
                    Ok(run) => running = run,
                    Err(flume::TryRecvError::Empty) => break,
                    Err(flume::TryRecvError::Disconnected) => {
                        info!("control channel closed, detection loop exiting");
                        return;
                    }
                }
            }

            if !running {
                std::thread::sleep(tick);
                continue;
            }

            let Some(frame) = self.frames.recv_timeout(tick) else {
                continue;
            };
            self.process(frame);
        }
    }

    fn process(&mut self, mut frame: Frame) {
        let shape = frame.shape();
        let frame_id = frame.id();

        let candidates = self.stage1.infer(frame.pixels(), shape);
        let detections = match (&mut self.stage2, self.config.two_stage) {
            (Some(stage2), true) if !candidates.is_empty() => {
                stage2.refine(frame.pixels(), shape, &candidates)
            }
            _ => candidates,
        };

        if detections.is_empty() {
            self.emit(DetectionOutcome::NoDetection { frame_id });
            // Frame drops here; its buffer goes back to the source pool.
            return;
        }

        debug!(frame_id, count = detections.len(), "detected");
        if self.config.annotate {
            annotate::draw_detections(&mut frame, &detections);
        }
        self.emit(DetectionOutcome::Detected {
            frame_id,
            count: detections.len(),
        });

        let Some(jobs) = &self.jobs else {
            // Detection-only mode.
            return;
        };

        // First detection whose clamped region still has area.
        let region = detections
            .iter()
            .find_map(|d| CropRegion::from_box(&d.bbox, shape.width, shape.height));
        match region {
            Some(region) => {
                if !jobs.push(TransferJob { frame, region }) {
                    warn!(frame_id, "transfer queue full, dropping frame");
                }
            }
            None => {
                warn!(frame_id, "no detection box survived clamping, dropping frame");
            }
        }
    }

    fn emit(&self, outcome: DetectionOutcome) {
        if let Some(results) = &self.results {
            let _ = results.try_send(outcome);
        }
    }
}
