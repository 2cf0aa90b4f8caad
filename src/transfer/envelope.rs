//! Wire control envelope
//!
//! Small JSON text messages that bracket the raw binary chunks. Chunks
//! themselves carry no envelope; the receiver counts bytes against the size
//! declared by `frame_start` and the sender correlates the ack to the frame
//! id it announced.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Heartbeat,
    HeartbeatAck,
    FrameStart { size: usize, id: u64 },
    FrameEnd,
    FrameAck,
}

impl ControlMessage {
    pub fn to_json(&self) -> String {
        // A unit/struct-variant enum with primitive fields cannot fail to
        // serialize.
        serde_json::to_string(self).expect("control message serialization")
    }

    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_matches_protocol() {
        assert_eq!(ControlMessage::Heartbeat.to_json(), r#"{"type":"heartbeat"}"#);
        assert_eq!(
            ControlMessage::HeartbeatAck.to_json(),
            r#"{"type":"heartbeat_ack"}"#
        );
        assert_eq!(
            ControlMessage::FrameStart { size: 3200, id: 7 }.to_json(),
            r#"{"type":"frame_start","size":3200,"id":7}"#
        );
        assert_eq!(ControlMessage::FrameEnd.to_json(), r#"{"type":"frame_end"}"#);
        assert_eq!(ControlMessage::FrameAck.to_json(), r#"{"type":"frame_ack"}"#);
    }

    #[test]
    fn parse_roundtrip_and_junk() {
        let msg = ControlMessage::parse(r#"{"type":"frame_start","size":12,"id":3}"#);
        assert_eq!(msg, Some(ControlMessage::FrameStart { size: 12, id: 3 }));
        assert_eq!(ControlMessage::parse("not json"), None);
        assert_eq!(ControlMessage::parse(r#"{"type":"unknown"}"#), None);
    }
}
