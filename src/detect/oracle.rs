use crate::capture::frame::FrameShape;
use crate::detect::types::Detection;

/// Opaque detection backend.
///
/// `infer` is the stage-1 pass (high recall, loose threshold). `refine` is
/// the stage-2 pass of a cascade: it re-scores stage-1 candidates with a
/// stricter model and returns the survivors. The default `refine` passes
/// candidates through unchanged, so single-stage backends only implement
/// `infer`.
///
/// The oracle is total: it always returns, possibly with an empty list, and
/// never takes ownership of the frame.
pub trait DetectionOracle: Send {
    fn infer(&mut self, pixels: &[u8], shape: FrameShape) -> Vec<Detection>;

    fn refine(
        &mut self,
        _pixels: &[u8],
        _shape: FrameShape,
        candidates: &[Detection],
    ) -> Vec<Detection> {
        candidates.to_vec()
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted oracle for pipeline tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns a pre-programmed detection list per frame, in order; empty
    /// once the script runs out. The shared counters let a test observe the
    /// oracle after it has moved into the pipeline.
    pub struct ScriptedOracle {
        script: VecDeque<Vec<Detection>>,
        pub infer_calls: Arc<AtomicUsize>,
        pub refine_calls: Arc<AtomicUsize>,
    }

    impl ScriptedOracle {
        pub fn new(script: Vec<Vec<Detection>>) -> Self {
            Self {
                script: script.into(),
                infer_calls: Arc::new(AtomicUsize::new(0)),
                refine_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DetectionOracle for ScriptedOracle {
        fn infer(&mut self, _pixels: &[u8], _shape: FrameShape) -> Vec<Detection> {
            self.infer_calls.fetch_add(1, Ordering::Relaxed);
            self.script.pop_front().unwrap_or_default()
        }

        fn refine(
            &mut self,
            _pixels: &[u8],
            _shape: FrameShape,
            candidates: &[Detection],
        ) -> Vec<Detection> {
            self.refine_calls.fetch_add(1, Ordering::Relaxed);
            candidates.to_vec()
        }
    }
}
