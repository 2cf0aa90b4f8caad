//! Capture duty-cycle gate
//!
//! Two states, driven solely by the transfer lifecycle: halt the frame
//! source when a transfer begins, and after the transfer reaches a terminal
//! state wait out the cooldown before restarting. Queues are flushed on
//! both edges so a resumed pipeline never sees a frame captured before the
//! pause.

use tracing::info;

use crate::capture::frame::Frame;
use crate::capture::source::SourceCommand;
use crate::pipeline::FrameQueue;
use crate::transfer::TransferJob;
use crate::GateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Running,
    Halted,
}

pub struct CaptureGate {
    commands: flume::Sender<SourceCommand>,
    frames: FrameQueue<Frame>,
    jobs: FrameQueue<TransferJob>,
    config: GateConfig,
    state: GateState,
}

impl CaptureGate {
    pub fn new(
        commands: flume::Sender<SourceCommand>,
        frames: FrameQueue<Frame>,
        jobs: FrameQueue<TransferJob>,
        config: GateConfig,
    ) -> Self {
        Self {
            commands,
            frames,
            jobs,
            config,
            state: GateState::Running,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Stop the source and drain everything already in flight. Flushed
    /// frames release their buffers on drop.
    pub fn halt(&mut self) {
        if self.state == GateState::Halted {
            return;
        }
        info!("halting capture for transfer");
        let _ = self.commands.send(SourceCommand::Stop);
        self.frames.flush();
        self.jobs.flush();
        self.state = GateState::Halted;
    }

    /// Wait out the cooldown, flush again, restart the source.
    pub async fn resume(&mut self) {
        if self.state == GateState::Running {
            return;
        }
        info!(
            cooldown_secs = self.config.cooldown_secs,
            "cooldown before capture restart"
        );
        tokio::time::sleep(self.config.cooldown()).await;
        self.frames.flush();
        self.jobs.flush();
        let _ = self.commands.send(SourceCommand::Start);
        self.state = GateState::Running;
        info!("capture restarted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameShape, PixelFormat};
    use bytes::BytesMut;

    const SHAPE: FrameShape = FrameShape {
        width: 4,
        height: 4,
        format: PixelFormat::Rgb565,
    };

    fn gate() -> (
        CaptureGate,
        flume::Receiver<SourceCommand>,
        FrameQueue<Frame>,
    ) {
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let frames: FrameQueue<Frame> = FrameQueue::bounded(4);
        let jobs: FrameQueue<TransferJob> = FrameQueue::bounded(4);
        let g = CaptureGate::new(
            cmd_tx,
            frames.clone(),
            jobs,
            GateConfig { cooldown_secs: 30 },
        );
        (g, cmd_rx, frames)
    }

    #[tokio::test(start_paused = true)]
    async fn halt_stops_source_and_flushes_frames() {
        let (mut g, cmds, frames) = gate();
        let (recycle_tx, recycle_rx) = flume::bounded(4);
        frames.push(Frame::with_recycler(
            BytesMut::zeroed(SHAPE.byte_len()),
            SHAPE,
            1,
            recycle_tx,
        ));

        g.halt();
        assert_eq!(g.state(), GateState::Halted);
        assert_eq!(cmds.try_recv(), Ok(SourceCommand::Stop));
        // The queued frame was drained and its buffer released.
        assert!(frames.is_empty());
        assert!(recycle_rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_waits_cooldown_then_restarts() {
        let (mut g, cmds, _frames) = gate();
        g.halt();
        cmds.try_recv().unwrap();

        let before = tokio::time::Instant::now();
        g.resume().await;
        assert!(tokio::time::Instant::now() - before >= std::time::Duration::from_secs(30));
        assert_eq!(g.state(), GateState::Running);
        assert_eq!(cmds.try_recv(), Ok(SourceCommand::Start));
    }

    #[tokio::test(start_paused = true)]
    async fn halt_and_resume_are_idempotent() {
        let (mut g, cmds, _frames) = gate();
        g.resume().await; // already running, no command
        assert!(cmds.try_recv().is_err());
        g.halt();
        g.halt();
        assert_eq!(cmds.len(), 1);
    }
}
