//! Transport-independent frame types.
//!
//! The WebSocket adapter maps its own message type onto these, which keeps
//! the session engine free of any particular transport crate.

use std::fmt::Write;

/// One frame read from the client transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text data frame, expected to hold a JSON array.
    Text(String),
    /// A binary data frame; decoded as UTF-8 and treated like text.
    Binary(Vec<u8>),
    /// Transport-level ping. Answered by the transport itself.
    Ping,
    /// Transport-level pong.
    Pong,
    /// The client started the close handshake.
    Close,
    /// The transport reported an error for this connection.
    Error(String),
}

/// One frame queued for the client transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A notification payload or the first column of a result row.
    Text(String),
    /// A dispatch failure, sent as `{"error": <message>}`.
    Error(String),
    /// Transport-level heartbeat.
    Ping,
    /// Close handshake acknowledgement. Nothing is written after it.
    Close,
}

impl OutboundFrame {
    /// Creates an error frame from anything displayable.
    pub fn error(message: impl std::fmt::Display) -> Self {
        OutboundFrame::Error(message.to_string())
    }

    /// Text payload for data frames; `None` for control frames.
    pub fn to_text(&self) -> Option<String> {
        match self {
            OutboundFrame::Text(text) => Some(text.clone()),
            OutboundFrame::Error(message) => Some(error_json(message)),
            OutboundFrame::Ping | OutboundFrame::Close => None,
        }
    }

    /// Returns true for the close acknowledgement.
    pub fn is_close(&self) -> bool {
        matches!(self, OutboundFrame::Close)
    }
}

/// `{"error": "<message>"}`, spaced after the colon, with non-ASCII
/// characters escaped as `\uXXXX`.
fn error_json(message: &str) -> String {
    let quoted = serde_json::to_string(message)
        .unwrap_or_else(|_| String::from("\"unserializable error\""));
    let mut out = String::with_capacity(quoted.len() + 12);
    out.push_str("{\"error\": ");
    for ch in quoted.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    out.push('}');
    out
}
