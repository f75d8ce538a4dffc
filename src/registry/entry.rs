//! Stream record types
//!
//! This module defines the per-stream state stored in the registry.

use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::buffer::ChunkBuffer;

/// Server-assigned identifier of a live feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Create a stream id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Status of a stream record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Announced by the server, no data yet
    Connecting,
    /// Data is flowing
    Active,
    /// Server reported a fault for this feed
    Error,
    /// Feed paused
    Paused,
}

impl StreamStatus {
    /// Lowercase name, as shown to users
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Connecting => "connecting",
            StreamStatus::Active => "active",
            StreamStatus::Error => "error",
            StreamStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a single live feed
///
/// Records are immutable once published in the registry; the `with_*`
/// methods build the successor record that replaces this one.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    /// Server-assigned id
    pub id: StreamId,

    /// Feed address the server ingests from
    pub source_url: String,

    /// Display title
    pub title: String,

    /// Current status
    pub status: StreamStatus,

    /// Most recent raw chunks, oldest first
    pub chunks: ChunkBuffer,

    /// When this record last changed
    pub last_update: Instant,

    /// Whether the user has playback running (UI only)
    pub playing: bool,
}

impl StreamRecord {
    /// Create a fresh record in `Connecting` state with an empty buffer
    pub(super) fn new(
        id: StreamId,
        source_url: String,
        title: String,
        chunk_capacity: usize,
    ) -> Self {
        Self {
            id,
            source_url,
            title,
            status: StreamStatus::Connecting,
            chunks: ChunkBuffer::with_capacity(chunk_capacity),
            last_update: Instant::now(),
            playing: false,
        }
    }

    /// Successor record with a new status
    pub(super) fn with_status(&self, status: StreamStatus) -> Self {
        Self {
            status,
            last_update: Instant::now(),
            ..self.clone()
        }
    }

    /// Successor record with `chunk` appended; the stream becomes active
    pub(super) fn with_chunk(&self, chunk: Bytes) -> Self {
        let mut chunks = self.chunks.clone();
        chunks.push(chunk);

        Self {
            status: StreamStatus::Active,
            chunks,
            last_update: Instant::now(),
            ..self.clone()
        }
    }

    /// Successor record with the playing flag flipped
    pub(super) fn with_playing_toggled(&self) -> Self {
        Self {
            playing: !self.playing,
            ..self.clone()
        }
    }

    /// Whether at least one chunk has arrived
    pub fn has_data(&self) -> bool {
        !self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StreamRecord {
        StreamRecord::new("s1".into(), "rtsp://cam/1".into(), "Cam1".into(), 10)
    }

    #[test]
    fn test_new_record() {
        let record = record();
        assert_eq!(record.status, StreamStatus::Connecting);
        assert!(!record.has_data());
        assert!(!record.playing);
    }

    #[test]
    fn test_with_chunk_activates() {
        let original = record();
        let next = original.with_chunk(Bytes::from_static(b"abc"));

        assert_eq!(next.status, StreamStatus::Active);
        assert!(next.has_data());
        assert!(next.last_update >= original.last_update);
        // Predecessor is untouched
        assert!(!original.has_data());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(StreamStatus::Error.to_string(), "error");
        assert_eq!(StreamId::new("abc").to_string(), "abc");
    }
}
