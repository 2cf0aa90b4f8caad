//! Block-difference motion oracle
//!
//! Default detection backend for running without a neural model: the frame
//! is reduced to a coarse luma grid, compared against the previous frame's
//! grid, and the changed cells are merged into one bounding box whose score
//! is the changed-cell fraction. `refine` re-checks the candidate region at
//! a stricter threshold, giving the two-stage cascade something real to do.

use crate::capture::frame::{FrameShape, PixelFormat};
use crate::detect::oracle::DetectionOracle;
use crate::detect::types::{BoundingBox, Detection};

const GRID: usize = 16;

pub struct MotionOracle {
    threshold: f32,
    /// Per-cell mean luma of the previous frame.
    previous: Option<[f32; GRID * GRID]>,
}

impl MotionOracle {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            previous: None,
        }
    }

    fn luma_grid(pixels: &[u8], shape: FrameShape) -> [f32; GRID * GRID] {
        let mut sums = [0f32; GRID * GRID];
        let mut counts = [0u32; GRID * GRID];
        let bpp = shape.format.bytes_per_pixel();
        let w = shape.width as usize;
        let h = shape.height as usize;
        for y in 0..h {
            let cy = y * GRID / h;
            for x in 0..w {
                let cx = x * GRID / w;
                let idx = (y * w + x) * bpp;
                let luma = match shape.format {
                    PixelFormat::Rgb888 => {
                        let (r, g, b) = (pixels[idx], pixels[idx + 1], pixels[idx + 2]);
                        0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
                    }
                    PixelFormat::Rgb565 => {
                        let v = u16::from_le_bytes([pixels[idx], pixels[idx + 1]]);
                        let r = ((v >> 11) & 0x1f) as f32 * 8.0;
                        let g = ((v >> 5) & 0x3f) as f32 * 4.0;
                        let b = (v & 0x1f) as f32 * 8.0;
                        0.299 * r + 0.587 * g + 0.114 * b
                    }
                };
                sums[cy * GRID + cx] += luma;
                counts[cy * GRID + cx] += 1;
            }
        }
        let mut grid = [0f32; GRID * GRID];
        for i in 0..GRID * GRID {
            grid[i] = sums[i] / counts[i].max(1) as f32;
        }
        grid
    }

    /// Changed-cell fraction inside a cell rectangle, and the rectangle's
    /// union bounding box in pixels.
    fn changed_region(
        current: &[f32; GRID * GRID],
        previous: &[f32; GRID * GRID],
        shape: FrameShape,
    ) -> Option<(BoundingBox, f32)> {
        const LUMA_DELTA: f32 = 24.0;
        let (mut cx0, mut cy0, mut cx1, mut cy1) = (GRID, GRID, 0usize, 0usize);
        let mut changed = 0usize;
        for cy in 0..GRID {
            for cx in 0..GRID {
                if (current[cy * GRID + cx] - previous[cy * GRID + cx]).abs() > LUMA_DELTA {
                    changed += 1;
                    cx0 = cx0.min(cx);
                    cy0 = cy0.min(cy);
                    cx1 = cx1.max(cx);
                    cy1 = cy1.max(cy);
                }
            }
        }
        if changed == 0 {
            return None;
        }
        let cell_w = shape.width as f32 / GRID as f32;
        let cell_h = shape.height as f32 / GRID as f32;
        let bbox = BoundingBox::new(
            (cx0 as f32 * cell_w) as i32,
            (cy0 as f32 * cell_h) as i32,
            ((cx1 + 1) as f32 * cell_w) as i32,
            ((cy1 + 1) as f32 * cell_h) as i32,
        );
        let area = (cx1 + 1 - cx0) * (cy1 + 1 - cy0);
        Some((bbox, changed as f32 / area as f32))
    }
}

impl DetectionOracle for MotionOracle {
    fn infer(&mut self, pixels: &[u8], shape: FrameShape) -> Vec<Detection> {
        let grid = Self::luma_grid(pixels, shape);
        let result = match &self.previous {
            Some(prev) => Self::changed_region(&grid, prev, shape)
                .filter(|(_, score)| *score >= self.threshold)
                .map(|(bbox, score)| Detection::new(score, 0, bbox)),
            None => None,
        };
        self.previous = Some(grid);
        result.into_iter().collect()
    }

    fn refine(
        &mut self,
        _pixels: &[u8],
        _shape: FrameShape,
        candidates: &[Detection],
    ) -> Vec<Detection> {
        // Stage 2: keep only candidates comfortably above the stage-1 bar.
        candidates
            .iter()
            .filter(|d| d.score >= self.threshold)
            .cloned()
            .collect()
    }
}
