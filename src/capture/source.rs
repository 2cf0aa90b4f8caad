//! Frame sources and the capture producer task

use async_trait::async_trait;
use bytes::BytesMut;
use color_eyre::{eyre::eyre, Result};
use tracing::{error, info, warn};

use crate::capture::frame::{Frame, FrameShape};
use crate::pipeline::FrameQueue;

/// A device (or synthetic generator) that produces frames on demand.
///
/// `stop()`/`start()` bracket the transfer duty cycle: while a transfer is in
/// flight the source is halted so nothing new enters the pipeline.
#[async_trait]
pub trait FrameSource: Send {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    async fn next_frame(&mut self) -> Result<Frame>;
}

/// Control input of the capture task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCommand {
    Start,
    Stop,
}

/// Fixed-size buffer pool backing a source's frames.
///
/// Frames carry the pool's return handle and give their buffer back on drop,
/// so the pool bounds total frame memory without any manual release calls.
pub struct BufferPool {
    tx: flume::Sender<BytesMut>,
    rx: flume::Receiver<BytesMut>,
    buf_len: usize,
}

impl BufferPool {
    pub fn new(capacity: usize, buf_len: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self { tx, rx, buf_len }
    }

    /// Reuse a returned buffer if one is waiting, allocate otherwise.
    pub fn acquire(&self) -> BytesMut {
        match self.rx.try_recv() {
            Ok(mut buf) => {
                buf.clear();
                buf.resize(self.buf_len, 0);
                buf
            }
            Err(_) => BytesMut::zeroed(self.buf_len),
        }
    }

    pub fn recycler(&self) -> flume::Sender<BytesMut> {
        self.tx.clone()
    }
}

/// Long-lived capture loop: pulls frames from the source and pushes them onto
/// the detection queue, dropping (never blocking) when the queue is full.
///
/// Commands are applied between captures; while stopped the task parks on the
/// command channel instead of spinning.
pub async fn run_capture(
    mut source: Box<dyn FrameSource>,
    commands: flume::Receiver<SourceCommand>,
    frames: FrameQueue<Frame>,
) {
    let mut running = match source.start() {
        Ok(()) => true,
        Err(e) => {
            error!("failed to start frame source: {e:#}");
            false
        }
    };

    loop {
        // Drain pending commands; last one wins.
        let mut latest = None;
        while let Ok(cmd) = commands.try_recv() {
            latest = Some(cmd);
        }
        if latest.is_none() && !running {
            match commands.recv_async().await {
                Ok(cmd) => latest = Some(cmd),
                Err(_) => break,
            }
        }

        match latest {
            Some(SourceCommand::Stop) if running => {
                if let Err(e) = source.stop() {
                    warn!("frame source stop failed: {e:#}");
                }
                running = false;
                info!("capture halted");
                continue;
            }
            Some(SourceCommand::Start) if !running => {
                match source.start() {
                    Ok(()) => {
                        running = true;
                        info!("capture resumed");
                    }
                    Err(e) => error!("failed to restart frame source: {e:#}"),
                }
                continue;
            }
            _ => {}
        }

        if !running {
            continue;
        }

        match source.next_frame().await {
            Ok(frame) => {
                if !frames.push(frame) {
                    warn!("detection queue full, dropping frame");
                }
            }
            Err(e) => {
                error!("capture error: {e:#}");
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        }
    }
}

/// Synthetic gradient source for running without camera hardware.
pub struct TestPatternSource {
    shape: FrameShape,
    pool: BufferPool,
    sequence: u64,
    running: bool,
    interval: std::time::Duration,
}

impl TestPatternSource {
    pub fn new(shape: FrameShape, fps: u32) -> Self {
        let pool = BufferPool::new(4, shape.byte_len());
        Self {
            shape,
            pool,
            sequence: 0,
            running: false,
            interval: std::time::Duration::from_millis(1000 / fps.max(1) as u64),
        }
    }
}

#[async_trait]
impl FrameSource for TestPatternSource {
    fn start(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        if !self.running {
            return Err(eyre!("source is stopped"));
        }
        tokio::time::sleep(self.interval).await;
        let mut buf = self.pool.acquire();
        // Diagonal gradient that shifts per frame, enough to exercise the
        // motion detector.
        let phase = (self.sequence % 251) as usize;
        for (i, b) in buf.iter_mut().enumerate() {
            *b = ((i + phase) % 251) as u8;
        }
        self.sequence += 1;
        Ok(Frame::with_recycler(
            buf,
            self.shape,
            self.sequence,
            self.pool.recycler(),
        ))
    }
}
