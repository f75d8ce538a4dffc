//! Outbound client commands

use serde::Serialize;

use crate::error::ProtocolError;
use crate::registry::StreamId;

/// A command sent to the server, tagged by `action`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Ask the server to start ingesting a feed
    AddStream {
        /// Feed address
        url: String,
        /// Display title
        title: String,
    },

    /// Ask the server to stop delivering a stream to this client
    RemoveStream {
        /// Target stream
        stream_id: StreamId,
    },

    /// Ask for the list of streams held for this client
    GetStreams,
}

impl ClientCommand {
    /// The `action` discriminant of this command
    pub fn action(&self) -> &'static str {
        match self {
            ClientCommand::AddStream { .. } => "add_stream",
            ClientCommand::RemoveStream { .. } => "remove_stream",
            ClientCommand::GetStreams => "get_streams",
        }
    }

    /// Serialize to a text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::InvalidJson)
    }
}
