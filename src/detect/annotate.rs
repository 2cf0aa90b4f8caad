//! In-place frame annotation
//!
//! Draws detection boxes and facial keypoints directly into the frame
//! buffer. Every coordinate is clamped to the frame before any pixel write,
//! so out-of-range oracle output cannot write outside the buffer.

use crate::capture::frame::{Frame, FrameShape, PixelFormat};
use crate::detect::types::Detection;

/// Marker colors, one per landmark role.
#[derive(Debug, Clone, Copy)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BOX_COLOR: Rgb = Rgb(0, 255, 0);
pub const EYE_COLOR: Rgb = Rgb(255, 0, 0);
pub const NOSE_COLOR: Rgb = Rgb(0, 255, 0);
pub const MOUTH_COLOR: Rgb = Rgb(0, 0, 255);

/// Half-width of the filled keypoint marker.
const MARKER_RADIUS: i32 = 4;

#[inline]
fn clamp(v: i32, max_excl: u32) -> i32 {
    v.clamp(0, max_excl as i32 - 1)
}

#[inline]
fn put_pixel(buf: &mut [u8], shape: FrameShape, x: i32, y: i32, color: Rgb) {
    debug_assert!(x >= 0 && (x as u32) < shape.width);
    debug_assert!(y >= 0 && (y as u32) < shape.height);
    let idx = (y as usize * shape.width as usize + x as usize) * shape.format.bytes_per_pixel();
    match shape.format {
        PixelFormat::Rgb565 => {
            let v = crate::capture::decode::rgb888_to_rgb565(color.0, color.1, color.2);
            buf[idx] = (v & 0xff) as u8;
            buf[idx + 1] = (v >> 8) as u8;
        }
        PixelFormat::Rgb888 => {
            buf[idx] = color.0;
            buf[idx + 1] = color.1;
            buf[idx + 2] = color.2;
        }
    }
}

fn draw_hollow_rect(
    buf: &mut [u8],
    shape: FrameShape,
    xmin: i32,
    ymin: i32,
    xmax: i32,
    ymax: i32,
    color: Rgb,
) {
    for x in xmin..=xmax {
        put_pixel(buf, shape, x, ymin, color);
        put_pixel(buf, shape, x, ymax, color);
    }
    for y in ymin..=ymax {
        put_pixel(buf, shape, xmin, y, color);
        put_pixel(buf, shape, xmax, y, color);
    }
}

fn draw_marker(buf: &mut [u8], shape: FrameShape, cx: i32, cy: i32, color: Rgb) {
    let x0 = clamp(cx - MARKER_RADIUS, shape.width);
    let x1 = clamp(cx + MARKER_RADIUS, shape.width);
    let y0 = clamp(cy - MARKER_RADIUS, shape.height);
    let y1 = clamp(cy + MARKER_RADIUS, shape.height);
    for y in y0..=y1 {
        for x in x0..=x1 {
            put_pixel(buf, shape, x, y, color);
        }
    }
}

/// Draw every detection onto the frame: a hollow rectangle at the clamped
/// box, and, when the five landmarks are present, a filled marker per
/// keypoint colored by role (eyes, nose, mouth corners).
///
/// Box max coordinates are exclusive, matching the crop path. Boxes with no
/// in-frame area left after clamping are skipped, not drawn.
pub fn draw_detections(frame: &mut Frame, detections: &[Detection]) {
    let shape = frame.shape();
    let buf = frame.pixels_mut();
    for det in detections {
        let xmin = det.bbox.xmin.clamp(0, shape.width as i32);
        let ymin = det.bbox.ymin.clamp(0, shape.height as i32);
        let xmax = det.bbox.xmax.clamp(0, shape.width as i32);
        let ymax = det.bbox.ymax.clamp(0, shape.height as i32);
        if xmin < xmax && ymin < ymax {
            draw_hollow_rect(buf, shape, xmin, ymin, xmax - 1, ymax - 1, BOX_COLOR);
        }

        if let Some(kp) = &det.keypoints {
            for (x, y) in [kp.left_eye, kp.right_eye] {
                draw_marker(buf, shape, x, y, EYE_COLOR);
            }
            draw_marker(buf, shape, kp.nose.0, kp.nose.1, NOSE_COLOR);
            for (x, y) in [kp.mouth_left, kp.mouth_right] {
                draw_marker(buf, shape, x, y, MOUTH_COLOR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::types::{BoundingBox, Keypoints};
    use bytes::BytesMut;

    fn frame(w: u32, h: u32, format: PixelFormat) -> Frame {
        let shape = FrameShape {
            width: w,
            height: h,
            format,
        };
        Frame::new(BytesMut::zeroed(shape.byte_len()), shape, 0)
    }

    fn px565(frame: &Frame, x: u32, y: u32) -> u16 {
        let idx = (y as usize * frame.width() as usize + x as usize) * 2;
        u16::from_le_bytes([frame.pixels()[idx], frame.pixels()[idx + 1]])
    }

    #[test]
    fn draws_clamped_box_in_bounds() {
        let mut f = frame(16, 16, PixelFormat::Rgb565);
        let det = Detection::new(0.9, 0, BoundingBox::new(-5, -5, 8, 8));
        draw_detections(&mut f, &[det]);
        let green = crate::capture::decode::rgb888_to_rgb565(0, 255, 0);
        // Clamped corner is (0,0); the exclusive max puts the far edges on
        // row 7 / col 7.
        assert_eq!(px565(&f, 0, 0), green);
        assert_eq!(px565(&f, 7, 0), green);
        assert_eq!(px565(&f, 0, 7), green);
        assert_eq!(px565(&f, 8, 0), 0);
        // Interior stays untouched (hollow rectangle).
        assert_eq!(px565(&f, 4, 4), 0);
    }

    #[test]
    fn box_past_far_edge_leaves_frame_untouched() {
        // Clamps to a zero-area box at the far corner; nothing may be drawn.
        let mut f = frame(8, 8, PixelFormat::Rgb565);
        let det = Detection::new(0.9, 0, BoundingBox::new(300, 200, 400, 300));
        draw_detections(&mut f, &[det]);
        assert!(f.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn box_overlapping_far_edge_draws_only_the_inside_part() {
        let mut f = frame(8, 8, PixelFormat::Rgb565);
        let det = Detection::new(0.9, 0, BoundingBox::new(4, 4, 12, 12));
        draw_detections(&mut f, &[det]);
        let green = crate::capture::decode::rgb888_to_rgb565(0, 255, 0);
        assert_eq!(px565(&f, 4, 4), green);
        assert_eq!(px565(&f, 7, 4), green);
        assert_eq!(px565(&f, 4, 7), green);
        assert_eq!(px565(&f, 0, 0), 0);
    }

    #[test]
    fn box_fully_outside_is_skipped() {
        let mut f = frame(8, 8, PixelFormat::Rgb565);
        let det = Detection::new(0.9, 0, BoundingBox::new(100, 100, 120, 120));
        draw_detections(&mut f, &[det]);
        // Whole buffer untouched: clamped box inverts and is rejected.
        assert!(f.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn keypoint_markers_use_role_colors() {
        let mut f = frame(32, 32, PixelFormat::Rgb888);
        let kp = Keypoints {
            left_eye: (8, 8),
            right_eye: (24, 8),
            nose: (16, 16),
            mouth_left: (8, 24),
            mouth_right: (24, 24),
        };
        // Degenerate box so only markers are drawn.
        let det = Detection::new(0.9, 0, BoundingBox::new(5, 5, 2, 2)).with_keypoints(kp);
        draw_detections(&mut f, &[det]);
        let at = |x: usize, y: usize| {
            let idx = (y * 32 + x) * 3;
            (f.pixels()[idx], f.pixels()[idx + 1], f.pixels()[idx + 2])
        };
        assert_eq!(at(8, 8), (255, 0, 0));
        assert_eq!(at(16, 16), (0, 255, 0));
        assert_eq!(at(24, 24), (0, 0, 255));
    }

    #[test]
    fn marker_near_edge_stays_in_bounds() {
        let mut f = frame(8, 8, PixelFormat::Rgb565);
        let kp = Keypoints {
            left_eye: (-3, -3),
            right_eye: (10, 0),
            nose: (0, 10),
            mouth_left: (7, 7),
            mouth_right: (0, 0),
        };
        let det = Detection::new(0.9, 0, BoundingBox::new(50, 50, 40, 40)).with_keypoints(kp);
        // Must not panic on any write.
        draw_detections(&mut f, &[det]);
    }
}
