//! Crop-region derivation

use bytes::BytesMut;

use crate::capture::frame::Frame;
use crate::detect::types::BoundingBox;

/// Rectangular sub-area of a frame selected for transfer. Always fully
/// inside the frame and non-empty; construction rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Clamp a detection box to the frame. Returns `None` when nothing with
    /// area remains, which callers must treat as "do not transfer".
    pub fn from_box(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> Option<Self> {
        let xmin = bbox.xmin.clamp(0, frame_width as i32);
        let ymin = bbox.ymin.clamp(0, frame_height as i32);
        let xmax = bbox.xmax.clamp(0, frame_width as i32);
        let ymax = bbox.ymax.clamp(0, frame_height as i32);
        if xmax <= xmin || ymax <= ymin {
            return None;
        }
        Some(Self {
            x: xmin as u32,
            y: ymin as u32,
            width: (xmax - xmin) as u32,
            height: (ymax - ymin) as u32,
        })
    }

    /// Payload size of the region in the frame's pixel format.
    pub fn byte_len(&self, bytes_per_pixel: usize) -> usize {
        self.width as usize * self.height as usize * bytes_per_pixel
    }
}

/// Copy the region out of the frame, row by row.
pub fn crop_frame(frame: &Frame, region: CropRegion) -> BytesMut {
    let bpp = frame.shape().format.bytes_per_pixel();
    let stride = frame.width() as usize * bpp;
    let row_len = region.width as usize * bpp;
    let src = frame.pixels();

    let mut out = BytesMut::with_capacity(region.byte_len(bpp));
    for row in 0..region.height as usize {
        let offset = (region.y as usize + row) * stride + region.x as usize * bpp;
        out.extend_from_slice(&src[offset..offset + row_len]);
    }
    out
}
