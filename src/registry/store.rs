//! Stream registry implementation
//!
//! The central table of live feeds. Mutations replace whole records and
//! publish a `RegistryEvent` so observers can react without polling.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, RwLock};

use super::config::RegistryConfig;
use super::entry::{StreamId, StreamRecord, StreamStatus};
use super::event::RegistryEvent;

/// Table of all live feeds known to the viewer
///
/// Thread-safe via `RwLock`. Readers receive `Arc<StreamRecord>` snapshots
/// and must not assume the table stays the same between two reads.
pub struct StreamRegistry {
    /// Map of stream id to its current record
    streams: RwLock<HashMap<StreamId, Arc<StreamRecord>>>,

    /// Change-event fan-out
    events: broadcast::Sender<RegistryEvent>,

    /// Configuration
    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            streams: RwLock::new(HashMap::new()),
            events,
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Subscribe to change events
    ///
    /// A receiver that falls behind gets `RecvError::Lagged` and should
    /// resynchronise from [`list_all`](Self::list_all).
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Insert a new record in `Connecting` state
    ///
    /// An existing record with the same id is overwritten. The overwritten
    /// record is returned and the overwrite is logged, since the server is
    /// not expected to announce the same id twice.
    pub async fn create(
        &self,
        id: StreamId,
        source_url: impl Into<String>,
        title: impl Into<String>,
    ) -> Option<Arc<StreamRecord>> {
        let record = StreamRecord::new(
            id.clone(),
            source_url.into(),
            title.into(),
            self.config.chunk_capacity,
        );

        let previous = {
            let mut streams = self.streams.write().await;
            streams.insert(id.clone(), Arc::new(record))
        };

        if let Some(ref prev) = previous {
            tracing::warn!(
                stream = %id,
                previous_status = %prev.status,
                previous_chunks = prev.chunks.len(),
                "Duplicate stream id, previous record overwritten"
            );
        } else {
            tracing::info!(stream = %id, "Stream created");
        }

        self.publish(RegistryEvent::Created {
            id,
            replaced: previous.is_some(),
        });

        previous
    }

    /// Replace the status of a stream
    ///
    /// Returns false (and changes nothing) if the id is unknown.
    pub async fn set_status(&self, id: &StreamId, status: StreamStatus) -> bool {
        let applied = self.replace(id, |record| record.with_status(status)).await;

        if applied {
            tracing::debug!(stream = %id, status = %status, "Stream status updated");
        }
        applied
    }

    /// Append a chunk to a stream's buffer and mark it active
    ///
    /// The buffer keeps only the most recent `chunk_capacity` chunks.
    /// Returns false (and changes nothing) if the id is unknown.
    pub async fn append_chunk(&self, id: &StreamId, chunk: Bytes) -> bool {
        let size = chunk.len();
        let applied = self.replace(id, move |record| record.with_chunk(chunk)).await;

        if applied {
            tracing::trace!(stream = %id, bytes = size, "Chunk appended");
        }
        applied
    }

    /// Flip the UI-only playing flag
    ///
    /// Returns the new value, or `None` if the id is unknown.
    pub async fn toggle_playing(&self, id: &StreamId) -> Option<bool> {
        let playing = {
            let mut streams = self.streams.write().await;
            let current = streams.get(id)?;
            let next = Arc::new(current.with_playing_toggled());
            let playing = next.playing;
            streams.insert(id.clone(), next);
            playing
        };

        self.publish(RegistryEvent::Updated { id: id.clone() });
        Some(playing)
    }

    /// Remove a stream
    ///
    /// Idempotent: removing an unknown id is a no-op. Returns the removed
    /// record if there was one.
    pub async fn remove(&self, id: &StreamId) -> Option<Arc<StreamRecord>> {
        let removed = self.streams.write().await.remove(id);

        if removed.is_some() {
            tracing::info!(stream = %id, "Stream removed");
            self.publish(RegistryEvent::Removed { id: id.clone() });
        }
        removed
    }

    /// Get the current record for a stream
    pub async fn get(&self, id: &StreamId) -> Option<Arc<StreamRecord>> {
        self.streams.read().await.get(id).cloned()
    }

    /// Snapshot of every record, ordered by id
    pub async fn list_all(&self) -> Vec<Arc<StreamRecord>> {
        let streams = self.streams.read().await;
        let mut records: Vec<_> = streams.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Whether a stream exists
    pub async fn contains(&self, id: &StreamId) -> bool {
        self.streams.read().await.contains_key(id)
    }

    /// Number of streams
    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Whether the registry holds no streams
    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }

    /// Swap in the successor of an existing record
    async fn replace<F>(&self, id: &StreamId, next: F) -> bool
    where
        F: FnOnce(&StreamRecord) -> StreamRecord,
    {
        {
            let mut streams = self.streams.write().await;
            let Some(current) = streams.get(id) else {
                tracing::debug!(stream = %id, "Update for unknown stream ignored");
                return false;
            };
            let successor = Arc::new(next(current));
            streams.insert(id.clone(), successor);
        }

        self.publish(RegistryEvent::Updated { id: id.clone() });
        true
    }

    fn publish(&self, event: RegistryEvent) {
        // Err only means nobody is subscribed
        let _ = self.events.send(event);
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(n: u8) -> Bytes {
        Bytes::from(vec![n])
    }

    #[tokio::test]
    async fn test_create() {
        let registry = StreamRegistry::new();
        let id = StreamId::new("s1");

        assert!(registry.create(id.clone(), "rtsp://a", "Cam1").await.is_none());

        let record = registry.get(&id).await.unwrap();
        assert_eq!(record.status, StreamStatus::Connecting);
        assert_eq!(record.source_url, "rtsp://a");
        assert_eq!(record.title, "Cam1");
        assert!(record.chunks.is_empty());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_overwrites() {
        let registry = StreamRegistry::new();
        let mut events = registry.subscribe();
        let id = StreamId::new("s1");

        registry.create(id.clone(), "rtsp://a", "Cam1").await;
        registry.append_chunk(&id, chunk(1)).await;

        let previous = registry.create(id.clone(), "rtsp://b", "Cam2").await.unwrap();
        assert_eq!(previous.title, "Cam1");
        assert_eq!(previous.chunks.len(), 1);

        let record = registry.get(&id).await.unwrap();
        assert_eq!(record.title, "Cam2");
        assert!(record.chunks.is_empty());
        assert_eq!(record.status, StreamStatus::Connecting);

        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Created { id: id.clone(), replaced: false }
        );
        assert_eq!(events.recv().await.unwrap(), RegistryEvent::Updated { id: id.clone() });
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Created { id, replaced: true }
        );
    }

    #[tokio::test]
    async fn test_append_chunk_bounded() {
        let registry = StreamRegistry::new();
        let id = StreamId::new("s1");
        registry.create(id.clone(), "rtsp://a", "Cam1").await;

        for n in 0..11u8 {
            assert!(registry.append_chunk(&id, chunk(n)).await);
            let record = registry.get(&id).await.unwrap();
            assert!(record.chunks.len() <= 10);
        }

        let record = registry.get(&id).await.unwrap();
        assert_eq!(record.chunks.len(), 10);
        assert_eq!(record.status, StreamStatus::Active);
        let held: Vec<u8> = record.chunks.iter().map(|c| c[0]).collect();
        assert_eq!(held, (1..11).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_unknown_id_is_noop() {
        let registry = StreamRegistry::new();
        let mut events = registry.subscribe();
        let id = StreamId::new("missing");

        assert!(!registry.append_chunk(&id, chunk(0)).await);
        assert!(!registry.set_status(&id, StreamStatus::Error).await);
        assert!(registry.toggle_playing(&id).await.is_none());
        assert!(registry.is_empty().await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_status() {
        let registry = StreamRegistry::new();
        let id = StreamId::new("s1");
        registry.create(id.clone(), "rtsp://a", "Cam1").await;
        let before = registry.get(&id).await.unwrap();

        assert!(registry.set_status(&id, StreamStatus::Error).await);

        let after = registry.get(&id).await.unwrap();
        assert_eq!(after.status, StreamStatus::Error);
        assert!(after.last_update >= before.last_update);
        // Snapshot held by a reader is unaffected
        assert_eq!(before.status, StreamStatus::Connecting);
    }

    #[tokio::test]
    async fn test_remove_idempotent() {
        let registry = StreamRegistry::new();
        let mut events = registry.subscribe();
        let id = StreamId::new("s1");
        registry.create(id.clone(), "rtsp://a", "Cam1").await;

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.remove(&id).await.is_none());
        assert!(registry.is_empty().await);
        assert!(!registry.contains(&id).await);

        assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Created { .. }));
        assert_eq!(events.recv().await.unwrap(), RegistryEvent::Removed { id });
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_toggle_playing() {
        let registry = StreamRegistry::new();
        let id = StreamId::new("s1");
        registry.create(id.clone(), "rtsp://a", "Cam1").await;

        assert_eq!(registry.toggle_playing(&id).await, Some(true));
        assert_eq!(registry.toggle_playing(&id).await, Some(false));
    }

    #[tokio::test]
    async fn test_list_all_sorted() {
        let registry = StreamRegistry::new();
        registry.create(StreamId::new("b"), "rtsp://b", "B").await;
        registry.create(StreamId::new("a"), "rtsp://a", "A").await;

        let ids: Vec<_> = registry
            .list_all()
            .await
            .iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
