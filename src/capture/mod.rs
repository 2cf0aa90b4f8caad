pub mod decode;
pub mod frame;
pub mod source;
pub mod v4l2;

pub use frame::{Frame, FrameShape, PixelFormat};
pub use source::{BufferPool, FrameSource, SourceCommand, TestPatternSource};
pub use v4l2::V4l2Source;
