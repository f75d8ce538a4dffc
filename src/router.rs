//! Message router
//!
//! Turns inbound text frames into registry mutations. Frames are handled one
//! at a time and each is fully applied before `route` returns, so the
//! registry sees messages in the order the connection delivered them.
//!
//! Nothing a frame contains can make the router fail: malformed JSON,
//! schema violations and bad chunk encodings are logged and dropped without
//! touching the registry.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use crate::error::ProtocolError;
use crate::notify::Notification;
use crate::protocol::{ServerMessage, StreamData};
use crate::registry::{StreamRegistry, StreamStatus};

/// Derive a stream status from free-form status text
///
/// Text containing `"error"` means the stream failed; anything else,
/// including no text at all, means it is running.
pub fn classify_status(message: Option<&str>) -> StreamStatus {
    match message {
        Some(text) if text.contains("error") => StreamStatus::Error,
        _ => StreamStatus::Active,
    }
}

/// What happened to a routed frame
#[derive(Debug)]
pub enum RouteOutcome {
    /// Applied to the registry, or an informational message was consumed
    Applied,
    /// Valid message with nothing to apply (unknown stream or type)
    Ignored,
    /// Frame rejected; state unchanged
    Dropped(ProtocolError),
}

/// Result of routing one frame
#[derive(Debug)]
pub struct Routed {
    /// Effect on the registry
    pub outcome: RouteOutcome,
    /// Message to show the user, if any
    pub notification: Option<Notification>,
}

impl Routed {
    fn applied() -> Self {
        Self {
            outcome: RouteOutcome::Applied,
            notification: None,
        }
    }

    fn ignored() -> Self {
        Self {
            outcome: RouteOutcome::Ignored,
            notification: None,
        }
    }

    fn dropped(error: ProtocolError) -> Self {
        Self {
            outcome: RouteOutcome::Dropped(error),
            notification: None,
        }
    }

    fn notify(mut self, notification: Notification) -> Self {
        self.notification = Some(notification);
        self
    }

    /// Whether the frame was applied
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, RouteOutcome::Applied)
    }

    /// Whether the frame was dropped
    pub fn is_dropped(&self) -> bool {
        matches!(self.outcome, RouteOutcome::Dropped(_))
    }
}

/// Dispatches decoded server messages to the registry
pub struct MessageRouter {
    registry: Arc<StreamRegistry>,
}

impl MessageRouter {
    /// Create a router writing into `registry`
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self { registry }
    }

    /// Decode and apply one text frame
    pub async fn route(&self, frame: &str) -> Routed {
        match ServerMessage::decode(frame) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse server message");
                Routed::dropped(e)
            }
        }
    }

    /// Apply an already decoded message
    pub async fn dispatch(&self, message: ServerMessage) -> Routed {
        match message {
            ServerMessage::ConnectionEstablished { user_id } => {
                tracing::info!(user_id = ?user_id, "Connection established");
                Routed::applied().notify(Notification::success("Connected to stream server"))
            }

            ServerMessage::StreamAdded {
                stream_id,
                url,
                title,
            } => {
                let notification = Notification::success(format!("Stream \"{}\" added", title));
                self.registry.create(stream_id, url, title).await;
                Routed::applied().notify(notification)
            }

            ServerMessage::StreamData(data) => self.on_stream_data(data).await,

            ServerMessage::StreamStatus {
                stream_id,
                message,
                status,
            } => {
                let derived = classify_status(message.as_deref());
                tracing::debug!(
                    stream = %stream_id,
                    reported = ?status,
                    derived = %derived,
                    "Stream status message"
                );

                if self.registry.set_status(&stream_id, derived).await {
                    Routed::applied()
                } else {
                    Routed::ignored()
                }
            }

            ServerMessage::StreamRemoved { stream_id } => {
                // Already gone when the removal was initiated locally
                self.registry.remove(&stream_id).await;
                Routed::applied().notify(Notification::success("Stream removed successfully"))
            }

            ServerMessage::StreamsList { streams } => {
                tracing::info!(count = streams.len(), "Stream list received");
                for summary in &streams {
                    tracing::debug!(
                        stream = %summary.id,
                        url = %summary.url,
                        status = ?summary.status,
                        viewers = summary.viewer_count,
                        "Server stream"
                    );
                }
                Routed::applied()
            }

            ServerMessage::Error { message } => {
                tracing::warn!(message = %message, "Server reported error");
                let text = if message.is_empty() {
                    "Unknown error".to_owned()
                } else {
                    message
                };
                Routed::applied().notify(Notification::error(text))
            }

            ServerMessage::Unrecognized { kind } => {
                tracing::info!(kind = %kind, "Unhandled message type");
                Routed::ignored()
            }
        }
    }

    async fn on_stream_data(&self, data: StreamData) -> Routed {
        let chunk = match STANDARD.decode(data.chunk.as_bytes()) {
            Ok(bytes) => Bytes::from(bytes),
            Err(source) => {
                let error = ProtocolError::InvalidChunk {
                    stream_id: data.stream_id,
                    source,
                };
                tracing::warn!(error = %error, "Failed to decode stream chunk");
                return Routed::dropped(error);
            }
        };

        if chunk.is_empty() {
            tracing::debug!(stream = %data.stream_id, "Empty chunk skipped");
            return Routed::ignored();
        }

        if let Some(expected) = data.chunk_size {
            if expected != chunk.len() as u64 {
                tracing::debug!(
                    stream = %data.stream_id,
                    expected = expected,
                    actual = chunk.len(),
                    "Chunk size mismatch"
                );
            }
        }

        if self.registry.append_chunk(&data.stream_id, chunk).await {
            Routed::applied()
        } else {
            Routed::ignored()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationLevel;
    use crate::registry::StreamId;

    fn router() -> (MessageRouter, Arc<StreamRegistry>) {
        let registry = Arc::new(StreamRegistry::new());
        (MessageRouter::new(Arc::clone(&registry)), registry)
    }

    fn data_frame(id: &str, payload: &[u8]) -> String {
        format!(
            r#"{{"type":"stream_data","stream_id":"{}","chunk":"{}"}}"#,
            id,
            STANDARD.encode(payload)
        )
    }

    async fn add(router: &MessageRouter, id: &str) {
        let frame = format!(
            r#"{{"type":"stream_added","stream_id":"{}","url":"rtsp://cam/{}","title":"Cam {}"}}"#,
            id, id, id
        );
        assert!(router.route(&frame).await.is_applied());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(Some("fatal error occurred")), StreamStatus::Error);
        assert_eq!(classify_status(Some("stream resumed")), StreamStatus::Active);
        assert_eq!(classify_status(Some("")), StreamStatus::Active);
        assert_eq!(classify_status(None), StreamStatus::Active);
        // Case-sensitive substring match
        assert_eq!(classify_status(Some("Error")), StreamStatus::Active);
    }

    #[tokio::test]
    async fn test_stream_added() {
        let (router, registry) = router();
        let routed = router
            .route(r#"{"type":"stream_added","stream_id":"s1","url":"feed://a","title":"Cam1"}"#)
            .await;

        assert!(routed.is_applied());
        let notification = routed.notification.unwrap();
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(notification.message, "Stream \"Cam1\" added");

        let record = registry.get(&StreamId::new("s1")).await.unwrap();
        assert_eq!(record.status, StreamStatus::Connecting);
        assert_eq!(record.source_url, "feed://a");
    }

    #[tokio::test]
    async fn test_stream_data_decoded() {
        let (router, registry) = router();
        add(&router, "s1").await;

        let routed = router.route(&data_frame("s1", b"\x00\x01\x02")).await;
        assert!(routed.is_applied());

        let record = registry.get(&StreamId::new("s1")).await.unwrap();
        assert_eq!(record.status, StreamStatus::Active);
        assert_eq!(record.chunks.latest().unwrap().as_ref(), b"\x00\x01\x02");
    }

    #[tokio::test]
    async fn test_invalid_chunk_leaves_record_unchanged() {
        let (router, registry) = router();
        add(&router, "s1").await;
        router.route(&data_frame("s1", b"first")).await;
        let before = registry.get(&StreamId::new("s1")).await.unwrap();

        let routed = router
            .route(r#"{"type":"stream_data","stream_id":"s1","chunk":"@@not base64@@"}"#)
            .await;

        assert!(matches!(
            routed.outcome,
            RouteOutcome::Dropped(ProtocolError::InvalidChunk { .. })
        ));
        let after = registry.get(&StreamId::new("s1")).await.unwrap();
        assert_eq!(*after, *before);
        assert!(Arc::ptr_eq(&after, &before));
    }

    #[tokio::test]
    async fn test_empty_chunk_ignored() {
        let (router, registry) = router();
        add(&router, "s1").await;

        let routed = router
            .route(r#"{"type":"stream_data","stream_id":"s1","chunk":""}"#)
            .await;

        assert!(matches!(routed.outcome, RouteOutcome::Ignored));
        let record = registry.get(&StreamId::new("s1")).await.unwrap();
        assert!(!record.has_data());
        assert_eq!(record.status, StreamStatus::Connecting);
    }

    #[tokio::test]
    async fn test_stream_status_heuristic() {
        let (router, registry) = router();
        add(&router, "s1").await;
        let id = StreamId::new("s1");

        router
            .route(r#"{"type":"stream_status","stream_id":"s1","message":"fatal error occurred"}"#)
            .await;
        assert_eq!(registry.get(&id).await.unwrap().status, StreamStatus::Error);

        router
            .route(r#"{"type":"stream_status","stream_id":"s1","message":"stream resumed"}"#)
            .await;
        assert_eq!(registry.get(&id).await.unwrap().status, StreamStatus::Active);
    }

    #[tokio::test]
    async fn test_status_for_unknown_stream_ignored() {
        let (router, registry) = router();
        let routed = router
            .route(r#"{"type":"stream_status","stream_id":"ghost","message":"ok"}"#)
            .await;

        assert!(matches!(routed.outcome, RouteOutcome::Ignored));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_eleven_chunks_then_remove() {
        let (router, registry) = router();
        add(&router, "s1").await;
        let id = StreamId::new("s1");

        for n in 0..11u8 {
            router.route(&data_frame("s1", &[n])).await;
        }

        let record = registry.get(&id).await.unwrap();
        assert_eq!(record.chunks.len(), 10);
        assert_eq!(record.chunks.iter().next().unwrap().as_ref(), &[1u8]);
        assert_eq!(record.status, StreamStatus::Active);

        let routed = router
            .route(r#"{"type":"stream_removed","stream_id":"s1"}"#)
            .await;
        assert_eq!(
            routed.notification.unwrap().message,
            "Stream removed successfully"
        );
        assert!(registry.is_empty().await);

        // Second removal is a no-op
        assert!(router
            .route(r#"{"type":"stream_removed","stream_id":"s1"}"#)
            .await
            .is_applied());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_frames_dropped() {
        let (router, registry) = router();
        add(&router, "s1").await;
        let before = registry.list_all().await;

        for frame in [
            "not json",
            r#"{"no_type":true}"#,
            r#"{"type":"stream_added","stream_id":"s2"}"#,
            r#"{"type":"stream_data","stream_id":"s1"}"#,
        ] {
            assert!(router.route(frame).await.is_dropped(), "frame: {}", frame);
        }

        let after = registry.list_all().await;
        assert_eq!(after.len(), 1);
        assert!(Arc::ptr_eq(&after[0], &before[0]));
    }

    #[tokio::test]
    async fn test_unrecognized_type_ignored() {
        let (router, registry) = router();
        let routed = router.route(r#"{"type":"heartbeat"}"#).await;

        assert!(matches!(routed.outcome, RouteOutcome::Ignored));
        assert!(routed.notification.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_error_message_notifies() {
        let (router, _registry) = router();

        let routed = router
            .route(r#"{"type":"error","message":"Invalid RTSP URL format"}"#)
            .await;
        let notification = routed.notification.unwrap();
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.message, "Invalid RTSP URL format");

        let routed = router.route(r#"{"type":"error","message":""}"#).await;
        assert_eq!(routed.notification.unwrap().message, "Unknown error");

        let routed = router.route(r#"{"type":"error"}"#).await;
        assert!(routed.is_applied());
        assert_eq!(routed.notification.unwrap().message, "Unknown error");
    }

    #[tokio::test]
    async fn test_connection_established_notifies() {
        let (router, _registry) = router();
        let routed = router
            .route(r#"{"type":"connection_established","user_id":"u-1"}"#)
            .await;

        assert!(routed.is_applied());
        assert_eq!(
            routed.notification.unwrap().message,
            "Connected to stream server"
        );
    }
}
