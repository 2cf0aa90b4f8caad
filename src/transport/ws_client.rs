//! WebSocket client transport
//!
//! Maintains one connection to the receiver, reconnecting with a fixed
//! delay whenever it drops. Incoming messages and connectivity changes are
//! forwarded onto an event channel; the write half sits behind an async
//! mutex held for the duration of one send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::transport::{TransportChannel, TransportError, TransportEvent, TransportResult};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct WsClient {
    sink: Arc<Mutex<Option<WsSink>>>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
}

impl WsClient {
    /// Spawn the connection manager and return the send handle. The manager
    /// reconnects until `disconnect` is called; `events` carries
    /// connectivity changes and incoming messages to whoever consumes them.
    pub fn connect(
        url: String,
        reconnect_delay: Duration,
        events: flume::Sender<TransportEvent>,
    ) -> Self {
        let sink: Arc<Mutex<Option<WsSink>>> = Arc::new(Mutex::new(None));
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let manager_sink = sink.clone();
        let manager_connected = connected.clone();
        let manager_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                if manager_shutdown.load(Ordering::Acquire) {
                    return;
                }
                match connect_async(&url).await {
                    Ok((stream, _response)) => {
                        info!("connected to {url}");
                        let (tx, mut rx) = stream.split();
                        *manager_sink.lock().await = Some(tx);
                        manager_connected.store(true, Ordering::Release);
                        if events.send_async(TransportEvent::Connected).await.is_err() {
                            return;
                        }

                        while let Some(msg) = rx.next().await {
                            match msg {
                                Ok(Message::Text(text)) => {
                                    forward(&events, TransportEvent::Text(text));
                                }
                                Ok(Message::Binary(data)) => {
                                    forward(&events, TransportEvent::Binary(data));
                                }
                                Ok(Message::Close(_)) | Err(_) => break,
                                Ok(_) => {} // ping/pong handled by tungstenite
                            }
                        }

                        manager_connected.store(false, Ordering::Release);
                        *manager_sink.lock().await = None;
                        if events
                            .send_async(TransportEvent::Disconnected)
                            .await
                            .is_err()
                        {
                            return;
                        }
                        if manager_shutdown.load(Ordering::Acquire) {
                            return;
                        }
                        warn!("connection to {url} lost");
                    }
                    Err(e) => debug!("connect to {url} failed: {e}"),
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        });

        Self {
            sink,
            connected,
            shutdown,
        }
    }

    /// Close the current connection and stop the manager; terminal, no
    /// reconnect afterwards.
    pub async fn disconnect(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.connected.store(false, Ordering::Release);
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
    }
}

/// Event delivery must never stall the read pump (it also services pings),
/// so a full event channel drops the message.
fn forward(events: &flume::Sender<TransportEvent>, event: TransportEvent) {
    if events.try_send(event).is_err() {
        warn!("event channel full, dropping transport event");
    }
}

#[async_trait]
impl TransportChannel for WsClient {
    async fn send_text(&self, text: &str) -> TransportResult<()> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::Text(text.to_owned()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn send_binary(&self, data: &[u8]) -> TransportResult<usize> {
        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(data.len())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[tokio::test]
    async fn disconnect_stops_the_reconnect_loop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));

        let counter = accepts.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _ws = accept_async(stream).await;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });

        let (events_tx, events_rx) = flume::bounded(16);
        let client = WsClient::connect(
            format!("ws://{addr}/"),
            Duration::from_millis(20),
            events_tx,
        );
        assert_eq!(
            events_rx.recv_async().await.unwrap(),
            TransportEvent::Connected
        );

        client.disconnect().await;
        assert!(!client.is_connected());

        // Many reconnect delays later, the one original connection is still
        // the only one the listener ever saw.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1);
    }
}
