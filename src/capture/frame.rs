use bytes::BytesMut;
use serde::{Deserialize, Serialize};

/// Pixel formats the pipeline understands.
///
/// `Rgb565` is the native format of the capture path (2 bytes per pixel,
/// little-endian); `Rgb888` comes out of the MJPEG decode path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb565,
    Rgb888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgb888 => 3,
        }
    }
}

/// Frame dimensions and pixel encoding, copied around by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameShape {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// One captured frame.
///
/// Move-only owner of its pixel buffer: whichever stage holds the `Frame`
/// holds the buffer, and ownership transfers through queues. On drop the
/// buffer goes back to the source's pool, so every exit path (forwarded,
/// dropped, error) releases it exactly once.
pub struct Frame {
    data: BytesMut,
    shape: FrameShape,
    id: u64,
    recycler: Option<flume::Sender<BytesMut>>,
}

impl Frame {
    pub fn new(data: BytesMut, shape: FrameShape, id: u64) -> Self {
        Self {
            data,
            shape,
            id,
            recycler: None,
        }
    }

    pub fn with_recycler(
        data: BytesMut,
        shape: FrameShape,
        id: u64,
        recycler: flume::Sender<BytesMut>,
    ) -> Self {
        Self {
            data,
            shape,
            id,
            recycler: Some(recycler),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn width(&self) -> u32 {
        self.shape.width
    }

    pub fn height(&self) -> u32 {
        self.shape.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(recycler) = self.recycler.take() {
            // Pool full or gone means the allocation is simply freed here.
            let _ = recycler.try_send(std::mem::take(&mut self.data));
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("len", &self.data.len())
            .finish()
    }
}
