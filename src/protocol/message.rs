//! Inbound message envelope
//!
//! Server frames are JSON objects tagged by a `type` field. Decoding is two
//! stage: the frame is first parsed as generic JSON to read the discriminant,
//! then known discriminants are validated against their schema. Unknown
//! discriminants decode to [`ServerMessage::Unrecognized`] instead of failing,
//! so the router can log them without treating them as faults.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::registry::StreamId;

/// Discriminants this client understands
const KNOWN_TYPES: &[&str] = &[
    "connection_established",
    "stream_added",
    "stream_data",
    "stream_status",
    "stream_removed",
    "streams_list",
    "error",
];

/// A decoded server message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Server accepted the socket
    ConnectionEstablished {
        /// Id the server assigned to this client
        #[serde(default)]
        user_id: Option<String>,
    },

    /// A stream was registered for this client
    StreamAdded {
        /// Server-assigned stream id
        stream_id: StreamId,
        /// Feed address
        url: String,
        /// Display title
        title: String,
    },

    /// One chunk of encoded media
    StreamData(StreamData),

    /// Free-text status report for a stream
    StreamStatus {
        /// Target stream
        stream_id: StreamId,
        /// Human-readable status text
        #[serde(default)]
        message: Option<String>,
        /// Server-side status label, informational only
        #[serde(default)]
        status: Option<String>,
    },

    /// A stream was removed for this client
    StreamRemoved {
        /// Target stream
        stream_id: StreamId,
    },

    /// Reply to a `get_streams` command
    StreamsList {
        /// Streams the server holds for this client
        #[serde(default)]
        streams: Vec<StreamSummary>,
    },

    /// Server-side error report, not fatal to the connection
    Error {
        /// Error text
        #[serde(default)]
        message: String,
    },

    /// Any discriminant this client does not know
    #[serde(skip)]
    Unrecognized {
        /// The unknown `type` value
        kind: String,
    },
}

/// Payload of a `stream_data` message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamData {
    /// Target stream
    pub stream_id: StreamId,
    /// Base64-encoded chunk bytes
    pub chunk: String,
    /// Server timestamp (ISO 8601)
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Name of the segment the chunk came from
    #[serde(default)]
    pub segment_name: Option<String>,
    /// Decoded size as reported by the server
    #[serde(default)]
    pub chunk_size: Option<u64>,
}

/// Entry in a `streams_list` reply
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamSummary {
    /// Stream id
    pub id: StreamId,
    /// Feed address
    pub url: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Server-side status label
    #[serde(default)]
    pub status: Option<String>,
    /// Number of clients watching
    #[serde(default)]
    pub viewer_count: u32,
}

impl ServerMessage {
    /// Decode a raw text frame
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(frame).map_err(ProtocolError::InvalidJson)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_owned();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Ok(ServerMessage::Unrecognized { kind });
        }

        serde_json::from_value(value).map_err(|source| ProtocolError::Schema { kind, source })
    }

    /// The `type` discriminant of this message
    pub fn kind(&self) -> &str {
        match self {
            ServerMessage::ConnectionEstablished { .. } => "connection_established",
            ServerMessage::StreamAdded { .. } => "stream_added",
            ServerMessage::StreamData(_) => "stream_data",
            ServerMessage::StreamStatus { .. } => "stream_status",
            ServerMessage::StreamRemoved { .. } => "stream_removed",
            ServerMessage::StreamsList { .. } => "streams_list",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Unrecognized { kind } => kind,
        }
    }
}
