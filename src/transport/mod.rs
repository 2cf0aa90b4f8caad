pub mod ws_client;
pub mod ws_server;

use async_trait::async_trait;
use thiserror::Error;

pub use ws_client::WsClient;
pub use ws_server::{ReceivedFrame, WsServer};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("bind failed: {0}")]
    BindFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("not connected")]
    NotConnected,
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Connectivity and message events, delivered on a channel rather than via
/// callbacks so that all shared-state mutation happens on the one task that
/// consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Text(String),
    Binary(Vec<u8>),
}

/// An unreliable, ordered, message-oriented connection.
///
/// Sends are serialized internally: a single send call owns the connection
/// for its duration, so concurrent callers (heartbeat, control messages,
/// data chunks) never interleave partial writes.
#[async_trait]
pub trait TransportChannel: Send + Sync {
    async fn send_text(&self, text: &str) -> TransportResult<()>;

    /// Returns the number of bytes accepted; a short count is a failed send
    /// as far as the transfer protocol is concerned.
    async fn send_binary(&self, data: &[u8]) -> TransportResult<usize>;

    fn is_connected(&self) -> bool;
}
