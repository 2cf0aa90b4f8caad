//! Artemis sender: camera capture, face-gated detection, chunked transfer

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::Result;
use tracing::{error, info, warn};

use artemis::capture::source::{run_capture, FrameSource, SourceCommand, TestPatternSource};
use artemis::capture::v4l2::V4l2Source;
use artemis::capture::frame::FrameShape;
use artemis::detect::motion::MotionOracle;
use artemis::detect::pipeline::DetectionPipeline;
use artemis::gate::CaptureGate;
use artemis::pipeline::FrameQueue;
use artemis::transfer::{run_heartbeat, run_sender, FrameSender, TransferJob};
use artemis::transport::{TransportEvent, WsClient};
use artemis::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artemis=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Artemis launching...");

    // Load configuration; first CLI argument is an optional TOML file.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // Queues and control channels
    let frames = FrameQueue::bounded(config.capture.queue_capacity);
    let jobs = FrameQueue::<TransferJob>::bounded(1);
    let (commands_tx, commands_rx) = flume::bounded::<SourceCommand>(4);
    let (events_tx, events_rx) = flume::bounded::<TransportEvent>(64);
    // Keeping `pause_tx` alive keeps the detection thread alive; dropping
    // it on shutdown lets the thread drain and exit.
    let (pause_tx, pause_rx) = flume::bounded::<bool>(4);

    // Transport
    let transport = Arc::new(WsClient::connect(
        config.transport.server_url.clone(),
        config.transport.reconnect_delay(),
        events_tx,
    ));
    tokio::spawn(run_heartbeat(transport.clone(), config.transport.clone()));

    // Capture source, with a synthetic fallback for machines without a camera
    let source: Box<dyn FrameSource> = match V4l2Source::open(&config.capture) {
        Ok(source) => {
            info!("using capture device {}", config.capture.device);
            Box::new(source)
        }
        Err(e) => {
            warn!(
                "failed to open {}: {e:#}; falling back to test pattern",
                config.capture.device
            );
            let shape = FrameShape {
                width: config.capture.width,
                height: config.capture.height,
                format: config.capture.format,
            };
            Box::new(TestPatternSource::new(shape, config.capture.fps))
        }
    };
    let capture_handle = tokio::spawn(run_capture(source, commands_rx, frames.clone()));

    // Detection runs as a blocking loop on its own pinned thread
    let pipeline = DetectionPipeline::new(
        config.detector.clone(),
        frames.clone(),
        pause_rx,
        Box::new(MotionOracle::new(config.detector.stage1_threshold)),
    )
    .with_stage2(Box::new(MotionOracle::new(config.detector.stage2_threshold)))
    .with_output(jobs.clone());
    let detect_handle = std::thread::Builder::new()
        .name("artemis-detect".into())
        .spawn(move || {
            if let Some(core) = core_affinity::get_core_ids().and_then(|ids| ids.into_iter().last())
            {
                core_affinity::set_for_current(core);
            }
            pipeline.run();
        })?;

    // Transfer worker owns the gate: capture halts around each send
    let gate = CaptureGate::new(commands_tx, frames.clone(), jobs.clone(), config.gate.clone());
    let sender = FrameSender::new(transport.clone(), events_rx, config.transfer.clone());
    let sender_handle = tokio::spawn(run_sender(jobs, sender, gate));

    tokio::signal::ctrl_c().await?;
    info!("Artemis shutting down");

    // Dropping the pause channel stops the detection thread; aborting the
    // async tasks tears down capture and transfer.
    drop(pause_tx);
    capture_handle.abort();
    sender_handle.abort();
    transport.disconnect().await;
    if detect_handle.join().is_err() {
        error!("detection thread panicked");
    }

    let (written, read, dropped) = frames.stats();
    info!(written, read, dropped, "frame queue totals");
    Ok(())
}
