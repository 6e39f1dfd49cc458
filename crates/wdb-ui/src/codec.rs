//! Textual wire format.
//!
//! Inbound frames are `command|payload`, split on the first `|` only.
//! Outbound frames are `Type|json` (object keys sorted) or a bare `Type`.

use std::fmt;

use serde::Serialize;

pub const SEPARATOR: char = '|';

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming<'a> {
    /// Lowercased command name.
    pub command: String,
    pub payload: &'a str,
}

pub fn parse_incoming(message: &str) -> Incoming<'_> {
    let (command, payload) = message.split_once(SEPARATOR).unwrap_or((message, ""));
    Incoming {
        command: command.to_lowercase(),
        payload,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ack,
    BreakSet,
    BreakUnset,
    Display,
    Dump,
    Echo,
    Init,
    Log,
    Pong,
    Print,
    RawHtml,
    Select,
    SelectCheck,
    Shell,
    Suggest,
    Title,
    Trace,
    Watched,
}

impl MessageType {
    pub const ALL: &'static [MessageType] = &[
        MessageType::Ack,
        MessageType::BreakSet,
        MessageType::BreakUnset,
        MessageType::Display,
        MessageType::Dump,
        MessageType::Echo,
        MessageType::Init,
        MessageType::Log,
        MessageType::Pong,
        MessageType::Print,
        MessageType::RawHtml,
        MessageType::Select,
        MessageType::SelectCheck,
        MessageType::Shell,
        MessageType::Suggest,
        MessageType::Title,
        MessageType::Trace,
        MessageType::Watched,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Ack => "Ack",
            MessageType::BreakSet => "BreakSet",
            MessageType::BreakUnset => "BreakUnset",
            MessageType::Display => "Display",
            MessageType::Dump => "Dump",
            MessageType::Echo => "Echo",
            MessageType::Init => "Init",
            MessageType::Log => "Log",
            MessageType::Pong => "Pong",
            MessageType::Print => "Print",
            MessageType::RawHtml => "RawHTML",
            MessageType::Select => "Select",
            MessageType::SelectCheck => "SelectCheck",
            MessageType::Shell => "Shell",
            MessageType::Suggest => "Suggest",
            MessageType::Title => "Title",
            MessageType::Trace => "Trace",
            MessageType::Watched => "Watched",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Empty,
    Json(serde_json::Value),
    Raw(String),
}

/// Outbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub kind: MessageType,
    body: Body,
}

impl Outgoing {
    pub fn bare(kind: MessageType) -> Self {
        Self {
            kind,
            body: Body::Empty,
        }
    }

    /// Frame carrying `payload` as JSON. Payloads that fail to convert are
    /// encoded as their error text instead, so building a frame never fails.
    pub fn json(kind: MessageType, payload: &impl Serialize) -> Self {
        let value = serde_json::to_value(payload).unwrap_or_else(|err| {
            tracing::warn!(target: "wdb.ui", kind = %kind, error = %err, "unencodable payload");
            serde_json::Value::String(err.to_string())
        });
        Self {
            kind,
            body: Body::Json(value),
        }
    }

    /// Frame whose payload is forwarded verbatim.
    pub fn raw(kind: MessageType, payload: impl Into<String>) -> Self {
        Self {
            kind,
            body: Body::Raw(payload.into()),
        }
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Outgoing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Body::Empty => f.write_str(self.kind.as_str()),
            // `serde_json::Map` is ordered, so keys come out sorted.
            Body::Json(value) => write!(f, "{}{SEPARATOR}{value}", self.kind),
            Body::Raw(raw) => write!(f, "{}{SEPARATOR}{raw}", self.kind),
        }
    }
}

/// Splits an encoded outbound frame back into its type and JSON payload.
///
/// Raw payloads that are not JSON come back as a JSON string.
pub fn decode_outgoing(frame: &str) -> Option<(MessageType, Option<serde_json::Value>)> {
    let (kind, payload) = match frame.split_once(SEPARATOR) {
        Some((kind, payload)) => (kind, Some(payload)),
        None => (frame, None),
    };
    let kind = MessageType::from_wire(kind)?;
    let payload = payload.map(|payload| {
        serde_json::from_str(payload)
            .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()))
    });
    Some((kind, payload))
}
