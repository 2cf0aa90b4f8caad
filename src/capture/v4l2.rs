//! V4L2 frame source

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use tracing::info;
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::decode;
use crate::capture::frame::{Frame, FrameShape, PixelFormat};
use crate::capture::source::{BufferPool, FrameSource};
use crate::CaptureConfig;

/// V4L2-backed frame source. Captures MJPEG or YUYV from the device and
/// converts into the pipeline's pixel format before handing frames out.
pub struct V4l2Source {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    shape: FrameShape,
    fourcc: FourCC,
    buffer_count: u32,
    pool: BufferPool,
    sequence: u64,
}

impl V4l2Source {
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        info!("initializing V4L2 capture: {}", config.device);

        let device = Device::with_path(&config.device)?;
        let caps = device.query_caps()?;
        info!("device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(eyre!("device doesn't support video capture"));
        }

        // Prefer MJPEG, fall back to YUYV; the raw pipeline format is
        // produced by conversion either way.
        let mut fourcc = None;
        for fmt in device.enum_formats()? {
            if fmt.fourcc == FourCC::new(b"MJPG") {
                fourcc = Some(fmt.fourcc);
                break;
            }
            if fmt.fourcc == FourCC::new(b"YUYV") && fourcc.is_none() {
                fourcc = Some(fmt.fourcc);
            }
        }
        let fourcc = fourcc.ok_or_else(|| eyre!("no MJPG or YUYV format on device"))?;

        if fourcc == FourCC::new(b"YUYV") && config.format != PixelFormat::Rgb565 {
            return Err(eyre!("YUYV capture only feeds an RGB565 pipeline"));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = fourcc;
        device.set_format(&fmt)?;

        let shape = FrameShape {
            width: config.width,
            height: config.height,
            format: config.format,
        };
        let pool = BufferPool::new(config.queue_capacity + 2, shape.byte_len());

        Ok(Self {
            device: Box::new(device),
            stream: None,
            shape,
            fourcc,
            buffer_count: config.buffer_count,
            pool,
            sequence: 0,
        })
    }
}

#[async_trait]
impl FrameSource for V4l2Source {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, self.buffer_count)?;
        self.stream = Some(stream);
        info!("capture stream started with {} buffers", self.buffer_count);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        // Dropping the stream turns streaming off at the driver.
        self.stream = None;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| eyre!("stream not started"))?;

        let (buf, _meta) = stream.next()?;
        let mut pixels = self.pool.acquire();

        if self.fourcc == FourCC::new(b"MJPG") {
            let rgb = decode::decode_mjpeg(buf)?;
            match self.shape.format {
                PixelFormat::Rgb888 => {
                    if rgb.len() != pixels.len() {
                        return Err(eyre!(
                            "decoded frame is {} bytes, expected {}",
                            rgb.len(),
                            pixels.len()
                        ));
                    }
                    pixels.copy_from_slice(&rgb);
                }
                PixelFormat::Rgb565 => decode::rgb888_buf_to_rgb565(&rgb, &mut pixels)?,
            }
        } else {
            decode::yuyv_to_rgb565(buf, &mut pixels)?;
        }

        self.sequence += 1;
        Ok(Frame::with_recycler(
            pixels,
            self.shape,
            self.sequence,
            self.pool.recycler(),
        ))
    }
}
