//! Sender side of the frame transfer protocol
//!
//! The transport disconnects clients when a frame goes out as one large
//! multi-fragment message, so the payload is chunked at the application
//! level instead: a `frame_start` envelope, raw binary chunks strictly in
//! order with a pacing delay, `frame_end`, then a bounded wait for
//! `frame_ack`. Any send failure aborts the transfer; there are no retries.

use std::sync::Arc;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::transfer::envelope::ControlMessage;
use crate::transfer::session::{TransferOutcome, TransferSession};
use crate::transport::{TransportChannel, TransportEvent};
use crate::TransferConfig;

pub struct FrameSender<C: TransportChannel> {
    transport: Arc<C>,
    events: flume::Receiver<TransportEvent>,
    config: TransferConfig,
}

impl<C: TransportChannel> FrameSender<C> {
    pub fn new(
        transport: Arc<C>,
        events: flume::Receiver<TransportEvent>,
        config: TransferConfig,
    ) -> Self {
        Self {
            transport,
            events,
            config,
        }
    }

    /// Park until the transport reports a live connection.
    pub async fn wait_connected(&self) {
        if self.transport.is_connected() {
            return;
        }
        info!("waiting for connection before transfer");
        while let Ok(event) = self.events.recv_async().await {
            if event == TransportEvent::Connected {
                return;
            }
        }
    }

    /// Drive one payload through the full handshake. Runs to a terminal
    /// state; the payload (and whatever the caller still holds for this
    /// frame) is released when this returns, whichever way it went.
    pub async fn send_frame(&mut self, frame_id: u64, payload: Bytes) -> TransferOutcome {
        // Stale events (old acks, heartbeat replies) must not satisfy this
        // transfer's wait.
        while self.events.try_recv().is_ok() {}

        let mut session = TransferSession::new(frame_id, payload.len());
        info!(
            frame_id,
            size = payload.len(),
            "starting transfer"
        );

        let start = ControlMessage::FrameStart {
            size: payload.len(),
            id: frame_id,
        };
        if let Err(e) = self.transport.send_text(&start.to_json()).await {
            error!(frame_id, "failed to announce transfer: {e}");
            return self.finish(&mut session, TransferOutcome::Failed);
        }
        session.start_sent();
        tokio::time::sleep(self.config.chunk_delay()).await;

        for chunk in payload.chunks(self.config.chunk_size) {
            match self.transport.send_binary(chunk).await {
                Ok(sent) if sent == chunk.len() => session.chunk_sent(sent),
                Ok(sent) => {
                    error!(
                        frame_id,
                        sent,
                        expected = chunk.len(),
                        "partial chunk send, aborting transfer"
                    );
                    return self.finish(&mut session, TransferOutcome::Failed);
                }
                Err(e) => {
                    error!(frame_id, "chunk send failed: {e}");
                    return self.finish(&mut session, TransferOutcome::Failed);
                }
            }
            // Pacing: give the receiver's processing loop room between
            // chunks.
            tokio::time::sleep(self.config.chunk_delay()).await;
        }
        session.end_sent();

        if let Err(e) = self.transport.send_text(&ControlMessage::FrameEnd.to_json()).await {
            error!(frame_id, "failed to send frame_end: {e}");
            return self.finish(&mut session, TransferOutcome::Failed);
        }
        session.awaiting_ack();

        let outcome = self.await_ack(frame_id).await;
        self.finish(&mut session, outcome)
    }

    async fn await_ack(&self, frame_id: u64) -> TransferOutcome {
        let deadline = Instant::now() + self.config.ack_timeout();
        loop {
            let now = Instant::now();
            if now >= deadline {
                error!(
                    frame_id,
                    timeout_secs = self.config.ack_timeout_secs,
                    "no ack within timeout"
                );
                return TransferOutcome::TimedOut;
            }
            match tokio::time::timeout(deadline - now, self.events.recv_async()).await {
                // Loop back to the deadline check, which logs and returns.
                Err(_elapsed) => continue,
                Ok(Err(_closed)) => return TransferOutcome::Failed,
                Ok(Ok(TransportEvent::Text(text))) => {
                    if ControlMessage::parse(&text) == Some(ControlMessage::FrameAck) {
                        info!(frame_id, "got ack");
                        return TransferOutcome::Acked;
                    }
                }
                Ok(Ok(TransportEvent::Disconnected)) => {
                    warn!(frame_id, "disconnected while awaiting ack");
                    return TransferOutcome::Failed;
                }
                Ok(Ok(_)) => {}
            }
        }
    }

    fn finish(&self, session: &mut TransferSession, outcome: TransferOutcome) -> TransferOutcome {
        match outcome {
            TransferOutcome::Acked => {
                metrics::counter!("artemis_transfers_acked_total").increment(1)
            }
            TransferOutcome::Failed => {
                metrics::counter!("artemis_transfers_failed_total").increment(1)
            }
            TransferOutcome::TimedOut => {
                metrics::counter!("artemis_transfers_timed_out_total").increment(1)
            }
        }
        session.finish(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted transport: records everything sent, optionally fails or
    /// truncates the Nth binary send, and can answer `frame_end` with a
    /// scripted event so tests stay deterministic.
    struct MockTransport {
        texts: Mutex<Vec<String>>,
        binaries: Mutex<Vec<Vec<u8>>>,
        binary_sends: AtomicUsize,
        fail_binary_at: Option<usize>,
        truncate_binary_at: Option<usize>,
        on_end: Option<TransportEvent>,
        events_tx: flume::Sender<TransportEvent>,
    }

    impl MockTransport {
        fn with_events(events_tx: flume::Sender<TransportEvent>) -> Self {
            Self {
                texts: Mutex::new(Vec::new()),
                binaries: Mutex::new(Vec::new()),
                binary_sends: AtomicUsize::new(0),
                fail_binary_at: None,
                truncate_binary_at: None,
                on_end: None,
                events_tx,
            }
        }
    }

    #[async_trait]
    impl TransportChannel for MockTransport {
        async fn send_text(&self, text: &str) -> TransportResult<()> {
            self.texts.lock().push(text.to_owned());
            if text == ControlMessage::FrameEnd.to_json() {
                if let Some(event) = &self.on_end {
                    self.events_tx.send(event.clone()).unwrap();
                }
            }
            Ok(())
        }

        async fn send_binary(&self, data: &[u8]) -> TransportResult<usize> {
            let n = self.binary_sends.fetch_add(1, Ordering::SeqCst);
            if self.fail_binary_at == Some(n) {
                return Err(TransportError::SendFailed("simulated".into()));
            }
            self.binaries.lock().push(data.to_vec());
            if self.truncate_binary_at == Some(n) {
                return Ok(data.len() / 2);
            }
            Ok(data.len())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn config() -> TransferConfig {
        TransferConfig {
            chunk_size: 1024,
            chunk_delay_ms: 10,
            ack_timeout_secs: 30,
            max_frame_bytes: 160_000,
        }
    }

    fn sender(
        mock: MockTransport,
        events_rx: flume::Receiver<TransportEvent>,
    ) -> (FrameSender<MockTransport>, Arc<MockTransport>) {
        let transport = Arc::new(mock);
        (
            FrameSender::new(transport.clone(), events_rx, config()),
            transport,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn acked_transfer_sends_envelope_and_ordered_chunks() {
        let (events_tx, events_rx) = flume::unbounded();
        let mut mock = MockTransport::with_events(events_tx);
        mock.on_end = Some(TransportEvent::Text(ControlMessage::FrameAck.to_json()));
        let (mut sender, transport) = sender(mock, events_rx);

        let payload = Bytes::from(vec![0x5a; 3200]);
        let outcome = sender.send_frame(7, payload).await;
        assert_eq!(outcome, TransferOutcome::Acked);

        let texts = transport.texts.lock();
        assert_eq!(texts[0], r#"{"type":"frame_start","size":3200,"id":7}"#);
        assert_eq!(texts[1], r#"{"type":"frame_end"}"#);
        let chunks: Vec<usize> = transport.binaries.lock().iter().map(|c| c.len()).collect();
        assert_eq!(chunks, vec![1024, 1024, 1024, 128]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_chunk_aborts_without_frame_end() {
        let (events_tx, events_rx) = flume::unbounded();
        let mut mock = MockTransport::with_events(events_tx);
        mock.fail_binary_at = Some(1);
        let (mut sender, transport) = sender(mock, events_rx);

        let outcome = sender.send_frame(3, Bytes::from(vec![1u8; 3000])).await;
        assert_eq!(outcome, TransferOutcome::Failed);

        let texts = transport.texts.lock();
        assert_eq!(texts.len(), 1, "no frame_end after an aborted send");
        assert!(texts[0].contains("frame_start"));
        assert_eq!(transport.binaries.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_send_counts_as_failure() {
        let (events_tx, events_rx) = flume::unbounded();
        let mut mock = MockTransport::with_events(events_tx);
        mock.truncate_binary_at = Some(0);
        let (mut sender, _transport) = sender(mock, events_rx);

        let outcome = sender.send_frame(4, Bytes::from(vec![1u8; 500])).await;
        assert_eq!(outcome, TransferOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_ack_times_out() {
        let (events_tx, events_rx) = flume::unbounded();
        let mock = MockTransport::with_events(events_tx);
        let (mut sender, transport) = sender(mock, events_rx);

        let outcome = sender.send_frame(5, Bytes::from(vec![1u8; 100])).await;
        assert_eq!(outcome, TransferOutcome::TimedOut);
        // The full handshake went out; only the ack was missing.
        assert_eq!(transport.texts.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_while_waiting_fails_the_transfer() {
        let (events_tx, events_rx) = flume::unbounded();
        let mut mock = MockTransport::with_events(events_tx);
        mock.on_end = Some(TransportEvent::Disconnected);
        let (mut sender, _transport) = sender(mock, events_rx);

        let outcome = sender.send_frame(6, Bytes::from(vec![1u8; 100])).await;
        assert_eq!(outcome, TransferOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ack_from_previous_transfer_is_drained() {
        let (events_tx, events_rx) = flume::unbounded();
        let mock = MockTransport::with_events(events_tx.clone());
        let (mut sender, _transport) = sender(mock, events_rx);

        // An ack left over from an earlier session must not complete this
        // one.
        events_tx
            .send(TransportEvent::Text(ControlMessage::FrameAck.to_json()))
            .unwrap();
        let outcome = sender.send_frame(8, Bytes::from(vec![1u8; 100])).await;
        assert_eq!(outcome, TransferOutcome::TimedOut);
    }
}
