pub mod capture;
pub mod detect;
pub mod gate;
pub mod pipeline;
pub mod transfer;
pub mod transport;

use std::path::Path;
use std::time::Duration;

use capture::frame::PixelFormat;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub detector: DetectorConfig,
    pub transfer: TransferConfig,
    pub gate: GateConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    /// Capacity of the capture->detection queue. Small on purpose: a full
    /// queue means the producer drops the frame rather than blocking.
    pub queue_capacity: usize,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Run the second (high-precision) stage over stage-1 candidates.
    pub two_stage: bool,
    pub stage1_threshold: f32,
    pub stage2_threshold: f32,
    /// Draw boxes/keypoints onto the frame before it is forwarded.
    pub annotate: bool,
    /// Idle poll interval of the detection loop, in milliseconds.
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Application-level chunk size in bytes. Kept conservatively below the
    /// transport's message-size limit; native fragmentation is never used.
    pub chunk_size: usize,
    /// Pacing delay between chunks, in milliseconds.
    pub chunk_delay_ms: u64,
    /// How long the sender waits for `frame_ack` before giving up.
    pub ack_timeout_secs: u64,
    /// Receiver-side cap on a declared transfer size.
    pub max_frame_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Pause after a transfer reaches a terminal state before capture resumes.
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Receiver endpoint the device connects to.
    pub server_url: String,
    /// Listen address of the receiver binary.
    pub listen_addr: String,
    pub reconnect_delay_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            width: 320,
            height: 240,
            fps: 30,
            format: PixelFormat::Rgb565,
            queue_capacity: 2,
            buffer_count: 4,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            two_stage: true,
            stage1_threshold: 0.25,
            stage2_threshold: 0.35,
            annotate: true,
            tick_ms: 10,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            chunk_delay_ms: 10,
            ack_timeout_secs: 30,
            max_frame_bytes: 160_000,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { cooldown_secs: 30 }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".into(),
            listen_addr: "127.0.0.1:8080".into(),
            reconnect_delay_secs: 5,
            heartbeat_interval_secs: 300,
        }
    }
}

impl Config {
    /// Load configuration, layering an optional TOML file and `ARTEMIS_*`
    /// environment variables over the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let cfg = builder
            .add_source(config::Environment::with_prefix("ARTEMIS").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }
}

impl DetectorConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl TransferConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }
}

impl GateConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl TransportConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}
