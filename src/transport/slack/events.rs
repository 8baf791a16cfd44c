//! Typed decoding of RTM websocket frames.

use super::types::MessageEvent;
use crate::error::EventDecodeError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Events the RTM feed hands to the event router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackEvent {
    /// Server greeting after the websocket opens.
    Hello,
    /// A (re)connection completed; the counter starts at 1.
    Connected { connection_count: u64 },
    Message(MessageEvent),
    /// Round trip of the most recent keepalive ping.
    LatencyReport(Duration),
    ProtocolError { code: i64, message: String },
    /// The token was rejected; nothing further will arrive.
    InvalidAuth,
    /// Any other event type, by name.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct RtmErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

/// One decoded websocket frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum RtmFrame {
    Hello,
    Message(MessageEvent),
    Error {
        error: RtmErrorBody,
    },
    Pong {
        #[serde(default)]
        time: Option<i64>,
    },
    Goodbye,
    #[serde(other)]
    Unrecognized,
}

/// Frame decoded together with the raw `type` tag, for logging unknown kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedFrame {
    pub kind: String,
    pub frame: RtmFrame,
}

pub(crate) fn decode_frame(text: &str) -> Result<DecodedFrame, EventDecodeError> {
    let value: Value = serde_json::from_str(text).map_err(EventDecodeError::Json)?;
    let Some(kind) = value.get("type").and_then(Value::as_str).map(ToOwned::to_owned) else {
        // Replies to our own sends carry `reply_to` instead of a type.
        if value.get("reply_to").is_some() {
            return Ok(DecodedFrame {
                kind: "reply".into(),
                frame: RtmFrame::Unrecognized,
            });
        }
        return Err(EventDecodeError::Shape("missing event type".into()));
    };
    let frame = RtmFrame::deserialize(&value)
        .map_err(|e| EventDecodeError::Shape(format!("{kind}: {e}")))?;
    Ok(DecodedFrame { kind, frame })
}

impl DecodedFrame {
    /// Router-facing event for this frame. Pongs and goodbyes are handled by
    /// the connection itself and yield `None`.
    pub(crate) fn into_event(self) -> Option<SlackEvent> {
        match self.frame {
            RtmFrame::Hello => Some(SlackEvent::Hello),
            RtmFrame::Message(message) => Some(SlackEvent::Message(message)),
            RtmFrame::Error { error } => Some(SlackEvent::ProtocolError {
                code: error.code,
                message: error.msg,
            }),
            RtmFrame::Pong { .. } | RtmFrame::Goodbye => None,
            RtmFrame::Unrecognized => Some(SlackEvent::Other(self.kind)),
        }
    }
}
