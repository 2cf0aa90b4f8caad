//! Pixel decode/convert helpers for the capture path

use bytes::BytesMut;
use color_eyre::{eyre::eyre, Result};
use jpeg_decoder::Decoder;

/// Decode an MJPEG frame to packed RGB888.
pub fn decode_mjpeg(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder.decode()?;
    Ok(pixels)
}

/// Pack one RGB888 triple into little-endian RGB565.
#[inline]
pub fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xf8) << 8) | ((g as u16 & 0xfc) << 3) | (b as u16 >> 3)
}

/// Convert packed RGB888 into an RGB565 buffer (little-endian per pixel).
pub fn rgb888_buf_to_rgb565(src: &[u8], dst: &mut BytesMut) -> Result<()> {
    if src.len() % 3 != 0 {
        return Err(eyre!("RGB888 buffer length {} not a multiple of 3", src.len()));
    }
    let pixels = src.len() / 3;
    if dst.len() != pixels * 2 {
        return Err(eyre!(
            "destination holds {} bytes, need {}",
            dst.len(),
            pixels * 2
        ));
    }
    for (i, rgb) in src.chunks_exact(3).enumerate() {
        let v = rgb888_to_rgb565(rgb[0], rgb[1], rgb[2]);
        dst[i * 2] = (v & 0xff) as u8;
        dst[i * 2 + 1] = (v >> 8) as u8;
    }
    Ok(())
}

/// Convert a YUYV (YUV 4:2:2) buffer into RGB565.
pub fn yuyv_to_rgb565(src: &[u8], dst: &mut BytesMut) -> Result<()> {
    if src.len() % 4 != 0 {
        return Err(eyre!("YUYV buffer length {} not a multiple of 4", src.len()));
    }
    let pixels = src.len() / 2;
    if dst.len() != pixels * 2 {
        return Err(eyre!(
            "destination holds {} bytes, need {}",
            dst.len(),
            pixels * 2
        ));
    }
    for (i, quad) in src.chunks_exact(4).enumerate() {
        let y0 = quad[0] as f32;
        let u = quad[1] as f32 - 128.0;
        let y1 = quad[2] as f32;
        let v = quad[3] as f32 - 128.0;
        for (j, y) in [y0, y1].into_iter().enumerate() {
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            let packed = rgb888_to_rgb565(r, g, b);
            let off = (i * 2 + j) * 2;
            dst[off] = (packed & 0xff) as u8;
            dst[off + 1] = (packed >> 8) as u8;
        }
    }
    Ok(())
}
