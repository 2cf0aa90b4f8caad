pub mod annotate;
pub mod motion;
pub mod oracle;
pub mod pipeline;
pub mod types;

pub use motion::MotionOracle;
pub use oracle::DetectionOracle;
pub use pipeline::{DetectionOutcome, DetectionPipeline};
pub use types::{BoundingBox, Detection, Keypoints};
