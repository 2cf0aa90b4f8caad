//! WebSocket receiver server
//!
//! Accepts any number of sender connections; each peer gets its own task
//! and its own frame assembly, so a malformed transfer on one connection
//! never disturbs another. Completed frames are handed to the application
//! over a channel.

use std::net::SocketAddr;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, info, warn};

use crate::transfer::assembler::{EndResult, FrameAssembly};
use crate::transfer::envelope::ControlMessage;
use crate::transport::{TransportError, TransportResult};

/// A fully reassembled frame, as delivered to the application.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub id: u64,
    pub peer: SocketAddr,
    pub data: Bytes,
}

pub struct WsServer {
    listener: TcpListener,
    max_frame_bytes: usize,
    frames_out: flume::Sender<ReceivedFrame>,
}

impl WsServer {
    pub async fn bind(
        addr: &str,
        max_frame_bytes: usize,
        frames_out: flume::Sender<ReceivedFrame>,
    ) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        Ok(Self {
            listener,
            max_frame_bytes,
            frames_out,
        })
    }

    /// The actually bound address; useful when binding port 0.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| TransportError::BindFailed(e.to_string()))
    }

    /// Accept loop. Runs until the listener errors.
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("listening on {addr}");
        }
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let frames_out = self.frames_out.clone();
                    let max = self.max_frame_bytes;
                    tokio::spawn(async move {
                        handle_peer(stream, peer, max, frames_out).await;
                    });
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    return;
                }
            }
        }
    }
}

async fn handle_peer(
    stream: TcpStream,
    peer: SocketAddr,
    max_frame_bytes: usize,
    frames_out: flume::Sender<ReceivedFrame>,
) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "websocket handshake failed: {e}");
            return;
        }
    };
    info!(%peer, "peer connected");
    metrics::gauge!("artemis_receiver_peers").increment(1.0);

    if ws
        .send(Message::Text("artemis receiver ready".to_owned()))
        .await
        .is_err()
    {
        metrics::gauge!("artemis_receiver_peers").decrement(1.0);
        return;
    }

    let mut assembly = FrameAssembly::new(max_frame_bytes);
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if !dispatch_control(&mut ws, peer, &text, &mut assembly, &frames_out).await {
                    break;
                }
            }
            Ok(Message::Binary(data)) => {
                if !assembly.push_chunk(&data) {
                    warn!(%peer, len = data.len(), "discarding unexpected binary chunk");
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {} // ping/pong handled by tungstenite
        }
    }

    assembly.abort();
    metrics::gauge!("artemis_receiver_peers").decrement(1.0);
    info!(%peer, "peer disconnected");
}

/// Handle one control message. Returns false when the connection should be
/// torn down.
async fn dispatch_control(
    ws: &mut WebSocketStream<TcpStream>,
    peer: SocketAddr,
    text: &str,
    assembly: &mut FrameAssembly,
    frames_out: &flume::Sender<ReceivedFrame>,
) -> bool {
    match ControlMessage::parse(text) {
        Some(ControlMessage::Heartbeat) => reply(ws, ControlMessage::HeartbeatAck).await,
        Some(ControlMessage::FrameStart { size, id }) => {
            if !assembly.begin(size, id) {
                warn!(%peer, size, id, "rejected frame start");
            }
            true
        }
        Some(ControlMessage::FrameEnd) => match assembly.finish() {
            EndResult::Complete { id, data } => {
                info!(%peer, id, size = data.len(), "frame received");
                metrics::counter!("artemis_receiver_frames_total").increment(1);
                if !reply(ws, ControlMessage::FrameAck).await {
                    return false;
                }
                if frames_out
                    .send_async(ReceivedFrame { id, peer, data })
                    .await
                    .is_err()
                {
                    debug!("frame consumer gone, dropping received frame");
                }
                true
            }
            // No ack on a mismatched or orphaned end; the sender's timeout
            // handles it.
            EndResult::SizeMismatch {
                id,
                expected,
                received,
            } => {
                warn!(%peer, id, expected, received, "frame size mismatch, no ack");
                true
            }
            EndResult::NoTransfer => {
                warn!(%peer, "frame end without a transfer in progress");
                true
            }
        },
        Some(other) => {
            debug!(%peer, ?other, "unexpected control message");
            true
        }
        None => {
            debug!(%peer, "ignoring unparseable text message");
            true
        }
    }
}

async fn reply(ws: &mut WebSocketStream<TcpStream>, msg: ControlMessage) -> bool {
    ws.send(Message::Text(msg.to_json())).await.is_ok()
}
