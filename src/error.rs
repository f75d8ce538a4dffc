//! Error types
//!
//! Every fault the viewer can observe falls into one of four groups:
//! transport, protocol, playback and user input. None of them are fatal to
//! the viewing session; callers log them or surface them as notifications.

use std::fmt;

use crate::registry::StreamId;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Command dropped because the connection is not open
    NotConnected,
    /// The connection manager has been shut down
    ShutDown,
    /// Transport failure (socket, handshake)
    Transport(String),
    /// Malformed inbound frame
    Protocol(ProtocolError),
    /// Playback engine failure
    Playback(PlaybackError),
    /// Rejected user input
    Input(InputError),
    /// Invalid configuration value
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConnected => write!(f, "Not connected"),
            Error::ShutDown => write!(f, "Connection manager shut down"),
            Error::Transport(reason) => write!(f, "Transport error: {}", reason),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Playback(e) => write!(f, "Playback error: {}", e),
            Error::Input(e) => write!(f, "{}", e),
            Error::Config(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Protocol(e) => Some(e),
            Error::Playback(e) => Some(e),
            Error::Input(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<PlaybackError> for Error {
    fn from(e: PlaybackError) -> Self {
        Error::Playback(e)
    }
}

impl From<InputError> for Error {
    fn from(e: InputError) -> Self {
        Error::Input(e)
    }
}

/// Inbound frame could not be turned into a routed message
#[derive(Debug)]
pub enum ProtocolError {
    /// Frame is not valid JSON
    InvalidJson(serde_json::Error),
    /// Frame has no string `type` field
    MissingType,
    /// Known `type` but fields do not match its schema
    Schema {
        /// Message discriminant
        kind: String,
        /// Underlying decode error
        source: serde_json::Error,
    },
    /// `stream_data` chunk is not valid base64
    InvalidChunk {
        /// Target stream
        stream_id: StreamId,
        /// Underlying decode error
        source: base64::DecodeError,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            ProtocolError::MissingType => write!(f, "missing message type"),
            ProtocolError::Schema { kind, source } => {
                write!(f, "malformed {} message: {}", kind, source)
            }
            ProtocolError::InvalidChunk { stream_id, source } => {
                write!(f, "invalid chunk for stream {}: {}", stream_id, source)
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::InvalidJson(e) => Some(e),
            ProtocolError::Schema { source, .. } => Some(source),
            ProtocolError::InvalidChunk { source, .. } => Some(source),
            ProtocolError::MissingType => None,
        }
    }
}

/// Playback engine failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The engine cannot run in this environment
    Unsupported,
    /// An engine call failed
    Engine(String),
    /// No session exists for the stream
    NoSession(StreamId),
    /// Session exists but the engine has not reported ready
    NotReady(StreamId),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::Unsupported => write!(f, "HLS not supported"),
            PlaybackError::Engine(reason) => write!(f, "{}", reason),
            PlaybackError::NoSession(id) => write!(f, "no playback session for {}", id),
            PlaybackError::NotReady(id) => write!(f, "playback not ready for {}", id),
        }
    }
}

impl std::error::Error for PlaybackError {}

/// Rejected user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Feed address is empty or not an `rtsp://` URL
    InvalidFeedAddress(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::InvalidFeedAddress(_) => {
                write!(f, "Please enter a valid RTSP URL starting with rtsp://")
            }
        }
    }
}

impl std::error::Error for InputError {}
