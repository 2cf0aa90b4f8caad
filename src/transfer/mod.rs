//! Face-triggered frame transfer: crop selection, wire envelopes, the
//! chunked send protocol, and receiver-side reassembly.

pub mod assembler;
pub mod envelope;
pub mod protocol;
pub mod region;
pub mod session;
pub mod worker;

pub use assembler::{EndResult, FrameAssembly};
pub use envelope::ControlMessage;
pub use protocol::FrameSender;
pub use region::{crop_frame, CropRegion};
pub use session::{SessionState, TransferOutcome, TransferSession};
pub use worker::{run_heartbeat, run_sender, TransferJob};
