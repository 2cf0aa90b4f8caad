/// Axis-aligned box in frame pixel coordinates.
///
/// The oracle does not clamp: coordinates may be negative or exceed the
/// frame. Anything that touches pixels clamps first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// The five facial landmarks, in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypoints {
    pub left_eye: (i32, i32),
    pub right_eye: (i32, i32),
    pub nose: (i32, i32),
    pub mouth_left: (i32, i32),
    pub mouth_right: (i32, i32),
}

impl Keypoints {
    pub fn all(&self) -> [(i32, i32); 5] {
        [
            self.left_eye,
            self.right_eye,
            self.nose,
            self.mouth_left,
            self.mouth_right,
        ]
    }
}

/// One oracle output. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub score: f32,
    pub category: u32,
    pub bbox: BoundingBox,
    pub keypoints: Option<Keypoints>,
}

impl Detection {
    pub fn new(score: f32, category: u32, bbox: BoundingBox) -> Self {
        Self {
            score,
            category,
            bbox,
            keypoints: None,
        }
    }

    pub fn with_keypoints(mut self, keypoints: Keypoints) -> Self {
        self.keypoints = Some(keypoints);
        self
    }
}
