//! Bounded queues for the frame pipeline

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::utils::CachePadded;
use tracing::debug;

/// Bounded queue carrying owned values between pipeline tasks.
///
/// Thin wrapper over a flume channel: the channel is the ownership-transfer
/// point for frames, and the wrapper adds drop-on-full semantics for the
/// producer plus written/read/dropped counters. Clones share the same queue,
/// which is what lets the capture gate drain a queue another task reads from.
pub struct FrameQueue<T> {
    tx: flume::Sender<T>,
    rx: flume::Receiver<T>,
    stats: Arc<CachePadded<Stats>>,
}

#[derive(Default)]
struct Stats {
    written: AtomicUsize,
    read: AtomicUsize,
    dropped: AtomicUsize,
}

impl<T> Clone for FrameQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<T> FrameQueue<T> {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self {
            tx,
            rx,
            stats: Arc::new(CachePadded::new(Stats::default())),
        }
    }

    /// Producer: non-blocking push. A full queue drops the value (its
    /// destructor releases whatever it owns) rather than stalling the
    /// producer.
    pub fn push(&self, value: T) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(flume::TrySendError::Full(dropped)) | Err(flume::TrySendError::Disconnected(dropped)) => {
                drop(dropped);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("artemis_queue_dropped_total").increment(1);
                false
            }
        }
    }

    /// Consumer: block for up to `timeout` waiting for the next value.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => {
                self.stats.read.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(_) => None,
        }
    }

    pub async fn recv_async(&self) -> Option<T> {
        match self.rx.recv_async().await {
            Ok(value) => {
                self.stats.read.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Drain-and-discard everything currently queued. Used by the capture
    /// gate so a resumed pipeline never sees a frame from before the pause.
    pub fn flush(&self) -> usize {
        let mut flushed = 0;
        while self.rx.try_recv().is_ok() {
            flushed += 1;
        }
        if flushed > 0 {
            debug!(flushed, "flushed queue");
        }
        flushed
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// (written, read, dropped)
    pub fn stats(&self) -> (usize, usize, usize) {
        (
            self.stats.written.load(Ordering::Relaxed),
            self.stats.read.load(Ordering::Relaxed),
            self.stats.dropped.load(Ordering::Relaxed),
        )
    }
}
