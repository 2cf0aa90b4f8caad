//! Artemis receiver: accepts sender connections and logs reassembled frames

use std::path::PathBuf;

use color_eyre::Result;
use tracing::info;

use artemis::transport::{ReceivedFrame, WsServer};
use artemis::Config;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artemis=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let (frames_tx, frames_rx) = flume::bounded::<ReceivedFrame>(8);
    let server = WsServer::bind(
        &config.transport.listen_addr,
        config.transfer.max_frame_bytes,
        frames_tx,
    )
    .await?;
    tokio::spawn(server.run());

    let consumer = tokio::spawn(async move {
        let mut total = 0u64;
        while let Ok(frame) = frames_rx.recv_async().await {
            total += 1;
            info!(
                id = frame.id,
                peer = %frame.peer,
                size = frame.data.len(),
                total,
                "frame stored"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Artemis receiver shutting down");
    consumer.abort();
    Ok(())
}
