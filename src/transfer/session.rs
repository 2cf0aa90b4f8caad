//! Transfer session bookkeeping

/// Sender-side state of one in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Sending,
    EndSent,
    AwaitingAck,
    Acked,
    Failed,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Acked | SessionState::Failed | SessionState::TimedOut
        )
    }
}

/// How a finished transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Acked,
    Failed,
    TimedOut,
}

/// One end-to-end transfer attempt. At most one session exists at a time:
/// capture is halted while a transfer is in flight, so overlap is a
/// programming error, not a runtime condition.
#[derive(Debug)]
pub struct TransferSession {
    pub frame_id: u64,
    pub total_len: usize,
    pub sent: usize,
    state: SessionState,
}

impl TransferSession {
    pub fn new(frame_id: u64, total_len: usize) -> Self {
        Self {
            frame_id,
            total_len,
            sent: 0,
            state: SessionState::Starting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start_sent(&mut self) {
        debug_assert_eq!(self.state, SessionState::Starting);
        self.state = SessionState::Sending;
    }

    pub fn chunk_sent(&mut self, len: usize) {
        debug_assert_eq!(self.state, SessionState::Sending);
        self.sent += len;
        debug_assert!(self.sent <= self.total_len);
    }

    pub fn end_sent(&mut self) {
        debug_assert_eq!(self.state, SessionState::Sending);
        debug_assert_eq!(self.sent, self.total_len);
        self.state = SessionState::EndSent;
    }

    pub fn awaiting_ack(&mut self) {
        debug_assert_eq!(self.state, SessionState::EndSent);
        self.state = SessionState::AwaitingAck;
    }

    pub fn finish(&mut self, outcome: TransferOutcome) -> TransferOutcome {
        debug_assert!(!self.state.is_terminal(), "session finished twice");
        self.state = match outcome {
            TransferOutcome::Acked => SessionState::Acked,
            TransferOutcome::Failed => SessionState::Failed,
            TransferOutcome::TimedOut => SessionState::TimedOut,
        };
        outcome
    }
}
