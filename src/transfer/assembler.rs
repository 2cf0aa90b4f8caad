//! Receiver-side frame assembly
//!
//! Mirror of the sender's transfer session, one per connected peer. Pure
//! state machine over the start/chunk/end inputs; the transport layer feeds
//! it and sends the ack it asks for.

use bytes::{Bytes, BytesMut};
use tracing::{info, warn};

#[derive(Debug)]
struct Assembly {
    buf: BytesMut,
    expected: usize,
    id: u64,
}

/// What `finish` decided. Only `Complete` earns a `frame_ack`.
#[derive(Debug, PartialEq, Eq)]
pub enum EndResult {
    Complete { id: u64, data: Bytes },
    SizeMismatch { id: u64, expected: usize, received: usize },
    NoTransfer,
}

pub struct FrameAssembly {
    inner: Option<Assembly>,
    max_frame_bytes: usize,
}

impl FrameAssembly {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            inner: None,
            max_frame_bytes,
        }
    }

    pub fn in_progress(&self) -> bool {
        self.inner.is_some()
    }

    /// `frame_start`: discard whatever was in progress and begin fresh.
    /// A declared size over the cap leaves the assembler idle; the chunks
    /// that follow are then discarded as unexpected.
    pub fn begin(&mut self, size: usize, id: u64) -> bool {
        if let Some(old) = self.inner.take() {
            warn!(
                old_id = old.id,
                "new frame_start while assembly in progress, discarding"
            );
        }
        if size == 0 || size > self.max_frame_bytes {
            warn!(id, size, cap = self.max_frame_bytes, "rejecting frame_start");
            return false;
        }
        self.inner = Some(Assembly {
            buf: BytesMut::with_capacity(size),
            expected: size,
            id,
        });
        true
    }

    /// Binary chunk: append if an assembly is active and the chunk fits the
    /// declared total; anything else is discarded silently (protocol
    /// desync must not crash or corrupt the buffer).
    pub fn push_chunk(&mut self, chunk: &[u8]) -> bool {
        let Some(assembly) = &mut self.inner else {
            return false;
        };
        if assembly.buf.len() + chunk.len() > assembly.expected {
            warn!(
                id = assembly.id,
                received = assembly.buf.len(),
                expected = assembly.expected,
                chunk = chunk.len(),
                "chunk would overflow declared size, discarding"
            );
            return false;
        }
        assembly.buf.extend_from_slice(chunk);
        true
    }

    /// `frame_end`: compare received bytes against the declared size.
    /// Either way the assembly is destroyed and the peer is back to idle.
    pub fn finish(&mut self) -> EndResult {
        let Some(assembly) = self.inner.take() else {
            return EndResult::NoTransfer;
        };
        let received = assembly.buf.len();
        if received == assembly.expected {
            info!(id = assembly.id, bytes = received, "frame assembled");
            EndResult::Complete {
                id: assembly.id,
                data: assembly.buf.freeze(),
            }
        } else {
            EndResult::SizeMismatch {
                id: assembly.id,
                expected: assembly.expected,
                received,
            }
        }
    }

    /// Peer went away; release anything held.
    pub fn abort(&mut self) {
        if let Some(assembly) = self.inner.take() {
            warn!(
                id = assembly.id,
                received = assembly.buf.len(),
                "peer disconnected mid-transfer, discarding assembly"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_size_completes_and_yields_payload() {
        let mut a = FrameAssembly::new(160_000);
        assert!(a.begin(3200, 7));
        for chunk_len in [1024, 1024, 1024, 128] {
            assert!(a.push_chunk(&vec![0xab; chunk_len]));
        }
        match a.finish() {
            EndResult::Complete { id, data } => {
                assert_eq!(id, 7);
                assert_eq!(data.len(), 3200);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(!a.in_progress());
    }

    #[test]
    fn short_transfer_is_a_mismatch_not_an_ack() {
        let mut a = FrameAssembly::new(160_000);
        a.begin(100, 1);
        a.push_chunk(&[0u8; 60]);
        assert_eq!(
            a.finish(),
            EndResult::SizeMismatch {
                id: 1,
                expected: 100,
                received: 60
            }
        );
        // State fully reset afterwards.
        assert!(!a.in_progress());
    }

    #[test]
    fn chunk_without_start_is_discarded() {
        let mut a = FrameAssembly::new(160_000);
        assert!(!a.push_chunk(&[1, 2, 3]));
        assert_eq!(a.finish(), EndResult::NoTransfer);
    }

    #[test]
    fn overflowing_chunk_is_discarded_but_assembly_survives() {
        let mut a = FrameAssembly::new(160_000);
        a.begin(10, 2);
        assert!(a.push_chunk(&[0u8; 8]));
        assert!(!a.push_chunk(&[0u8; 8]));
        // The valid bytes so far still count; the end check reports short.
        assert_eq!(
            a.finish(),
            EndResult::SizeMismatch {
                id: 2,
                expected: 10,
                received: 8
            }
        );
    }

    #[test]
    fn restart_discards_previous_assembly() {
        let mut a = FrameAssembly::new(160_000);
        a.begin(100, 1);
        a.push_chunk(&[0u8; 40]);
        assert!(a.begin(8, 2));
        a.push_chunk(&[0u8; 8]);
        match a.finish() {
            EndResult::Complete { id, data } => {
                assert_eq!(id, 2);
                assert_eq!(data.len(), 8);
            }
            other => panic!("expected completion of second transfer, got {other:?}"),
        }
    }

    #[test]
    fn oversized_declaration_is_rejected_and_chunks_ignored() {
        let mut a = FrameAssembly::new(1000);
        assert!(!a.begin(2000, 3));
        assert!(!a.in_progress());
        assert!(!a.push_chunk(&[0u8; 10]));
        assert_eq!(a.finish(), EndResult::NoTransfer);
    }

    #[test]
    fn abort_releases_in_progress_assembly() {
        let mut a = FrameAssembly::new(1000);
        a.begin(100, 4);
        a.push_chunk(&[0u8; 50]);
        a.abort();
        assert!(!a.in_progress());
        assert_eq!(a.finish(), EndResult::NoTransfer);
    }
}
