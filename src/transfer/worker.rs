//! Transfer worker and heartbeat tasks

use std::sync::Arc;

use tracing::{info, warn};

use crate::capture::frame::Frame;
use crate::gate::CaptureGate;
use crate::pipeline::FrameQueue;
use crate::transfer::envelope::ControlMessage;
use crate::transfer::protocol::FrameSender;
use crate::transfer::region::{self, CropRegion};
use crate::transport::TransportChannel;
use crate::TransportConfig;

/// A detection-selected frame plus the region to transfer, handed from the
/// detection pipeline to the transfer worker. Dropping the job releases the
/// frame.
pub struct TransferJob {
    pub frame: Frame,
    pub region: CropRegion,
}

/// Long-lived sender loop. One job at a time: capture is halted before the
/// handshake starts and resumes only after the cooldown, which is what
/// keeps a second transfer from ever overlapping the first.
pub async fn run_sender<C: TransportChannel>(
    jobs: FrameQueue<TransferJob>,
    mut sender: FrameSender<C>,
    mut gate: CaptureGate,
) {
    while let Some(TransferJob { frame, region }) = jobs.recv_async().await {
        let frame_id = frame.id();
        info!(frame_id, "detection selected for transfer, halting capture");
        gate.halt();

        let payload = region::crop_frame(&frame, region);
        info!(
            frame_id,
            size = payload.len(),
            x = region.x,
            y = region.y,
            w = region.width,
            h = region.height,
            "transfer prepared"
        );
        // The crop is an independent copy; the source frame goes back to
        // the pool before the handshake starts.
        drop(frame);

        sender.wait_connected().await;
        let outcome = sender.send_frame(frame_id, payload.freeze()).await;
        info!(frame_id, ?outcome, "transfer finished");

        gate.resume().await;
    }
}

/// Periodic heartbeat while connected; keeps idle connections alive and
/// gives the receiver a liveness signal. Send failures are logged and left
/// to the reconnect logic.
pub async fn run_heartbeat<C: TransportChannel>(transport: Arc<C>, config: TransportConfig) {
    let mut interval = tokio::time::interval(config.heartbeat_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The immediate first tick would race connection setup.
    interval.tick().await;
    loop {
        interval.tick().await;
        if !transport.is_connected() {
            continue;
        }
        if let Err(e) = transport
            .send_text(&ControlMessage::Heartbeat.to_json())
            .await
        {
            warn!("heartbeat send failed: {e}");
        }
    }
}
