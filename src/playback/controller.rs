//! Playback controller
//!
//! Owns every [`PlaybackSession`] and the surfaces they render into. The
//! controller follows registry state: once a stream holds at least one chunk
//! it gets an engine pointed at the stream's playlist, and once the stream is
//! gone the engine is torn down.
//!
//! Fatal engine errors are handled per stream:
//!
//! | kind    | action                  |
//! |---------|-------------------------|
//! | network | `start_load()`          |
//! | media   | `recover_media_error()` |
//! | other   | teardown, `Failed`      |
//!
//! A recovery call that fails, or a second fatal error before the engine
//! reports progress, is terminal for that stream. Other streams are never
//! affected.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::PlaybackError;
use crate::registry::{RegistryEvent, StreamId, StreamRegistry};

use super::config::PlaybackConfig;
use super::engine::{
    EngineError, EngineEvent, EngineEventSink, EngineFactory, ErrorKind, SessionEvent, Surface,
    SurfaceId,
};
use super::session::{PlaybackSession, PlaybackStatus};

/// Error text shown when `play` is rejected
pub const PLAY_FAILED_MESSAGE: &str = "Failed to start playback";

/// Drives one engine per stream
pub struct PlaybackController<F: EngineFactory> {
    factory: F,
    config: PlaybackConfig,

    /// Live sessions by stream
    sessions: HashMap<StreamId, PlaybackSession>,

    /// Surfaces not currently attached to an engine
    idle_surfaces: HashMap<StreamId, Surface>,

    /// Streams whose playback ended in a terminal error
    failed: HashMap<StreamId, String>,

    next_generation: u64,
    next_surface: u64,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<F: EngineFactory> PlaybackController<F> {
    /// Create a controller with no sessions
    pub fn new(factory: F, config: PlaybackConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            factory,
            config,
            sessions: HashMap::new(),
            idle_surfaces: HashMap::new(),
            failed: HashMap::new(),
            next_generation: 0,
            next_surface: 0,
            events_tx,
            events_rx,
        }
    }

    /// Controller options
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Playlist address for a stream
    pub fn playlist_url(&self, id: &StreamId) -> String {
        format!(
            "{}/api/hls/{}/playlist.m3u8",
            self.config.backend_url.trim_end_matches('/'),
            id
        )
    }

    /// Bring playback for `id` in line with its registry record
    ///
    /// Starts an engine for a record with data and no session, and forgets
    /// the stream when the record is gone. A stream in `Failed` stays failed
    /// until it is removed or recreated.
    pub async fn sync_stream(&mut self, registry: &StreamRegistry, id: &StreamId) {
        let Some(record) = registry.get(id).await else {
            self.forget(id);
            return;
        };

        if record.has_data() && !self.sessions.contains_key(id) && !self.failed.contains_key(id) {
            // Failure is recorded in `failed` and logged by `start`
            let _ = self.start(id);
        }
    }

    /// React to one registry change
    pub async fn on_registry_event(&mut self, registry: &StreamRegistry, event: &RegistryEvent) {
        match event {
            RegistryEvent::Created { id, replaced } => {
                if *replaced {
                    self.release(id);
                    self.failed.remove(id);
                }
            }
            RegistryEvent::Updated { id } => self.sync_stream(registry, id).await,
            RegistryEvent::Removed { id } => self.forget(id),
        }
    }

    /// Re-derive every session from a registry snapshot
    ///
    /// Used after registry events were missed.
    pub async fn resync(&mut self, registry: &StreamRegistry) {
        let records = registry.list_all().await;

        let known: Vec<StreamId> = self
            .sessions
            .keys()
            .chain(self.idle_surfaces.keys())
            .chain(self.failed.keys())
            .cloned()
            .collect();
        for id in known {
            if !records.iter().any(|record| record.id == id) {
                self.forget(&id);
            }
        }

        for record in records {
            self.sync_stream(registry, &record.id).await;
        }

        tracing::debug!(sessions = self.sessions.len(), "Playback resynchronised");
    }

    /// Build an engine for `id` and attach it to the stream's surface
    ///
    /// Any existing session for the stream is fully released first. On
    /// failure the stream is marked `Failed`.
    pub fn start(&mut self, id: &StreamId) -> Result<SurfaceId, PlaybackError> {
        self.release(id);
        self.failed.remove(id);

        self.next_generation += 1;
        let generation = self.next_generation;
        let sink = EngineEventSink::new(id.clone(), generation, self.events_tx.clone());

        let engine = match self.factory.create(&self.config.engine, sink) {
            Ok(engine) => engine,
            Err(e) => {
                self.mark_failed(id, e.to_string());
                return Err(e);
            }
        };

        let surface = self.take_surface(id);
        let surface_id = surface.id();
        let url = self.playlist_url(id);

        match PlaybackSession::start(id.clone(), generation, url.clone(), engine, surface) {
            Ok(session) => {
                tracing::info!(
                    stream = %id,
                    generation = generation,
                    surface = %surface_id,
                    url = %url,
                    "Playback started"
                );
                self.sessions.insert(id.clone(), session);
                Ok(surface_id)
            }
            Err((e, surface)) => {
                self.idle_surfaces.insert(id.clone(), surface);
                self.mark_failed(id, format!("Playback error: {}", e));
                Err(e)
            }
        }
    }

    /// Tear down the session for `id`, keeping its surface for reuse
    ///
    /// Returns whether a session existed.
    pub fn release(&mut self, id: &StreamId) -> bool {
        let Some(mut session) = self.sessions.remove(id) else {
            return false;
        };

        if let Some(surface) = session.teardown() {
            self.idle_surfaces.insert(id.clone(), surface);
        }
        tracing::debug!(stream = %id, "Playback released");
        true
    }

    /// Drop everything held for `id`
    pub fn forget(&mut self, id: &StreamId) {
        self.release(id);
        self.idle_surfaces.remove(id);
        self.failed.remove(id);
    }

    /// Tear down every session
    pub fn shutdown(&mut self) {
        let count = self.sessions.len();
        for (_, mut session) in self.sessions.drain() {
            session.teardown();
        }
        self.idle_surfaces.clear();
        self.failed.clear();
        if count > 0 {
            tracing::info!(sessions = count, "Playback shut down");
        }
    }

    /// Wait for the next engine event
    ///
    /// Cancel safe. Never resolves to `None` while the controller is alive,
    /// since it holds a sender itself.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Apply one engine event
    ///
    /// Returns the stream's playback status afterwards, or `None` when the
    /// event came from a superseded engine instance and was ignored.
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<PlaybackStatus> {
        let SessionEvent {
            stream_id,
            generation,
            event,
        } = event;

        let session = match self.sessions.get_mut(&stream_id) {
            Some(session) if session.generation() == generation => session,
            _ => {
                tracing::trace!(
                    stream = %stream_id,
                    generation = generation,
                    "Stale engine event ignored"
                );
                return None;
            }
        };

        match event {
            EngineEvent::ManifestParsed => {
                session.mark_ready();
                tracing::info!(stream = %stream_id, "Manifest parsed, playback ready");
            }
            EngineEvent::FragmentLoaded => {
                if session.mark_progress() {
                    tracing::info!(stream = %stream_id, "Playback recovered");
                }
            }
            EngineEvent::Error(error) if !error.fatal => {
                tracing::debug!(
                    stream = %stream_id,
                    kind = %error.kind,
                    details = %error.details,
                    "Non-fatal engine error"
                );
            }
            EngineEvent::Error(error) => self.on_fatal_error(&stream_id, error),
        }

        self.status(&stream_id)
    }

    fn on_fatal_error(&mut self, id: &StreamId, error: EngineError) {
        let message = format!("Playback error: {}", error.details);
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };

        tracing::warn!(
            stream = %id,
            kind = %error.kind,
            details = %error.details,
            "Fatal engine error"
        );
        session.set_error(message.clone());

        if let Some(previous) = session.outstanding_recovery() {
            tracing::error!(
                stream = %id,
                previous = %previous,
                "Fatal error during recovery"
            );
            self.terminate(id, message);
            return;
        }

        if error.kind == ErrorKind::Other {
            self.terminate(id, message);
            return;
        }

        match session.recover(error.kind) {
            Ok(()) => {
                tracing::info!(stream = %id, kind = %error.kind, "Recovering playback");
            }
            Err(e) => {
                tracing::error!(stream = %id, error = %e, "Recovery failed");
                self.terminate(id, message);
            }
        }
    }

    /// Play or pause a ready stream; returns the new playing state
    pub fn toggle_playback(&mut self, id: &StreamId) -> Result<bool, PlaybackError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| PlaybackError::NoSession(id.clone()))?;

        match session.toggle() {
            Ok(playing) => {
                tracing::debug!(stream = %id, playing = playing, "Playback toggled");
                Ok(playing)
            }
            Err(e @ PlaybackError::Engine(_)) => {
                tracing::warn!(stream = %id, error = %e, "Play rejected");
                session.set_error(PLAY_FAILED_MESSAGE.to_owned());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Playback status for `id`, if the stream has any playback state
    pub fn status(&self, id: &StreamId) -> Option<PlaybackStatus> {
        if let Some(message) = self.failed.get(id) {
            return Some(PlaybackStatus::Failed(message.clone()));
        }
        self.sessions.get(id).map(PlaybackSession::status)
    }

    /// Error text to show for `id`
    pub fn error(&self, id: &StreamId) -> Option<&str> {
        if let Some(message) = self.failed.get(id) {
            return Some(message.as_str());
        }
        self.sessions.get(id).and_then(PlaybackSession::last_error)
    }

    /// Whether `id` is playing
    pub fn is_playing(&self, id: &StreamId) -> bool {
        self.sessions
            .get(id)
            .map_or(false, PlaybackSession::is_playing)
    }

    /// Whether `id` has a live session
    pub fn has_session(&self, id: &StreamId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Surface the engine for `id` is attached to
    pub fn attached_surface(&self, id: &StreamId) -> Option<SurfaceId> {
        self.sessions.get(id).and_then(PlaybackSession::surface_id)
    }

    fn take_surface(&mut self, id: &StreamId) -> Surface {
        if let Some(surface) = self.idle_surfaces.remove(id) {
            return surface;
        }
        self.next_surface += 1;
        Surface::new(self.next_surface)
    }

    fn terminate(&mut self, id: &StreamId, message: String) {
        self.release(id);
        self.mark_failed(id, message);
    }

    fn mark_failed(&mut self, id: &StreamId, message: String) {
        tracing::error!(stream = %id, error = %message, "Playback failed");
        self.failed.insert(id.clone(), message);
    }
}

impl<F: EngineFactory> Drop for PlaybackController<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::playback::headless::{EngineCall, HeadlessFactory};

    fn controller() -> (PlaybackController<HeadlessFactory>, HeadlessFactory) {
        let factory = HeadlessFactory::new();
        let config = PlaybackConfig::default().backend_url("http://backend.test/");
        (PlaybackController::new(factory.clone(), config), factory)
    }

    async fn registry_with_data(id: &StreamId) -> StreamRegistry {
        let registry = StreamRegistry::new();
        registry.create(id.clone(), "rtsp://cam/1", "Camera 1").await;
        registry.append_chunk(id, Bytes::from_static(b"ts")).await;
        registry
    }

    /// Deliver every pending engine event
    fn pump(controller: &mut PlaybackController<HeadlessFactory>) {
        while let Ok(event) = controller.events_rx.try_recv() {
            controller.handle_event(event);
        }
    }

    fn emit(factory: &HeadlessFactory, id: &StreamId, event: EngineEvent) {
        factory.sink(id).unwrap().emit(event);
    }

    #[test]
    fn test_playlist_url() {
        let (controller, _) = controller();
        assert_eq!(
            controller.playlist_url(&StreamId::new("s1")),
            "http://backend.test/api/hls/s1/playlist.m3u8"
        );
    }

    #[tokio::test]
    async fn test_no_session_without_data() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        let registry = StreamRegistry::new();
        registry.create(id.clone(), "rtsp://cam/1", "Camera 1").await;

        controller.sync_stream(&registry, &id).await;

        assert!(!controller.has_session(&id));
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_session_started_once_data_arrives() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        let registry = registry_with_data(&id).await;

        controller.sync_stream(&registry, &id).await;
        controller.sync_stream(&registry, &id).await;

        assert!(controller.has_session(&id));
        assert_eq!(factory.created(), 1);
        assert_eq!(controller.status(&id), Some(PlaybackStatus::Loading));

        let calls = factory.calls_for(&id);
        assert_eq!(
            calls[1],
            EngineCall::LoadSource {
                stream_id: id.clone(),
                url: "http://backend.test/api/hls/s1/playlist.m3u8".into(),
            }
        );
        assert!(matches!(calls[2], EngineCall::AttachMedia { .. }));
    }

    #[tokio::test]
    async fn test_restart_releases_previous_engine_first() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");

        let first = controller.start(&id).unwrap();
        let second = controller.start(&id).unwrap();

        assert_eq!(first, second);
        assert_eq!(controller.session_count(), 1);

        let calls = factory.calls_for(&id);
        let detach = calls
            .iter()
            .position(|c| matches!(c, EngineCall::DetachMedia { .. }))
            .unwrap();
        let second_attach = calls
            .iter()
            .rposition(|c| matches!(c, EngineCall::AttachMedia { .. }))
            .unwrap();
        assert!(detach < second_attach);
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn test_surfaces_are_distinct_per_stream() {
        let (mut controller, _) = controller();
        let a = controller.start(&StreamId::new("a")).unwrap();
        let b = controller.start(&StreamId::new("b")).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_removed_event_tears_down() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        let registry = registry_with_data(&id).await;
        controller.sync_stream(&registry, &id).await;

        registry.remove(&id).await;
        controller
            .on_registry_event(&registry, &RegistryEvent::Removed { id: id.clone() })
            .await;

        assert!(!controller.has_session(&id));
        assert_eq!(controller.status(&id), None);
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn test_replaced_record_releases_session() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        let registry = registry_with_data(&id).await;
        controller.sync_stream(&registry, &id).await;

        registry.create(id.clone(), "rtsp://cam/2", "Camera 2").await;
        controller
            .on_registry_event(
                &registry,
                &RegistryEvent::Created {
                    id: id.clone(),
                    replaced: true,
                },
            )
            .await;

        assert!(!controller.has_session(&id));
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn test_resync_drops_vanished_streams() {
        let (mut controller, factory) = controller();
        let kept = StreamId::new("kept");
        let gone = StreamId::new("gone");
        let registry = registry_with_data(&kept).await;
        controller.start(&gone).unwrap();

        controller.resync(&registry).await;

        assert!(controller.has_session(&kept));
        assert!(!controller.has_session(&gone));
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn test_manifest_parsed_marks_ready() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();

        emit(&factory, &id, EngineEvent::ManifestParsed);
        pump(&mut controller);

        assert_eq!(controller.status(&id), Some(PlaybackStatus::Ready));
    }

    #[tokio::test]
    async fn test_network_error_restarts_loading() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();

        emit(
            &factory,
            &id,
            EngineEvent::Error(EngineError::fatal(ErrorKind::Network, "manifestLoadError")),
        );
        pump(&mut controller);

        assert!(factory
            .calls_for(&id)
            .contains(&EngineCall::StartLoad { stream_id: id.clone() }));
        assert_eq!(
            controller.status(&id),
            Some(PlaybackStatus::Recovering(ErrorKind::Network))
        );
        assert_eq!(controller.error(&id), Some("Playback error: manifestLoadError"));
    }

    #[tokio::test]
    async fn test_media_error_recovers_media() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();

        emit(
            &factory,
            &id,
            EngineEvent::Error(EngineError::fatal(ErrorKind::Media, "bufferAppendError")),
        );
        pump(&mut controller);

        assert!(factory
            .calls_for(&id)
            .contains(&EngineCall::RecoverMediaError { stream_id: id.clone() }));
        assert!(controller.has_session(&id));
    }

    #[tokio::test]
    async fn test_other_fatal_error_is_terminal() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        let other = StreamId::new("s2");
        controller.start(&id).unwrap();
        controller.start(&other).unwrap();

        emit(
            &factory,
            &id,
            EngineEvent::Error(EngineError::fatal(ErrorKind::Other, "internalException")),
        );
        pump(&mut controller);

        assert!(!controller.has_session(&id));
        assert_eq!(
            controller.status(&id),
            Some(PlaybackStatus::Failed("Playback error: internalException".into()))
        );
        assert!(controller.has_session(&other));
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn test_second_fatal_error_during_recovery_is_terminal() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();

        let fatal = EngineEvent::Error(EngineError::fatal(ErrorKind::Network, "fragLoadError"));
        emit(&factory, &id, fatal.clone());
        pump(&mut controller);
        assert!(controller.has_session(&id));

        emit(&factory, &id, fatal);
        pump(&mut controller);

        assert!(!controller.has_session(&id));
        assert!(matches!(
            controller.status(&id),
            Some(PlaybackStatus::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_progress_clears_outstanding_recovery() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();

        let fatal = EngineEvent::Error(EngineError::fatal(ErrorKind::Network, "fragLoadError"));
        emit(&factory, &id, fatal.clone());
        emit(&factory, &id, EngineEvent::FragmentLoaded);
        emit(&factory, &id, fatal);
        pump(&mut controller);

        assert!(controller.has_session(&id));
        let restarts = factory
            .calls_for(&id)
            .into_iter()
            .filter(|c| matches!(c, EngineCall::StartLoad { .. }))
            .count();
        assert_eq!(restarts, 2);
    }

    #[tokio::test]
    async fn test_failed_recovery_call_is_terminal() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();
        factory.set_fail_recovery(true);

        emit(
            &factory,
            &id,
            EngineEvent::Error(EngineError::fatal(ErrorKind::Media, "bufferStalledError")),
        );
        pump(&mut controller);

        assert!(!controller.has_session(&id));
        assert_eq!(factory.destroyed(), 1);
    }

    #[tokio::test]
    async fn test_non_fatal_error_is_ignored() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();

        emit(
            &factory,
            &id,
            EngineEvent::Error(EngineError::recoverable(ErrorKind::Network, "fragLoadTimeOut")),
        );
        pump(&mut controller);

        assert_eq!(controller.status(&id), Some(PlaybackStatus::Loading));
        assert_eq!(controller.error(&id), None);
    }

    #[tokio::test]
    async fn test_stale_generation_ignored() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();
        let stale = factory.sink(&id).unwrap();
        controller.start(&id).unwrap();

        stale.emit(EngineEvent::Error(EngineError::fatal(ErrorKind::Other, "late")));
        let event = controller.next_event().await.unwrap();

        assert_eq!(controller.handle_event(event), None);
        assert!(controller.has_session(&id));
    }

    #[tokio::test]
    async fn test_failed_stream_not_restarted_by_data() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        let registry = registry_with_data(&id).await;
        factory.set_unsupported(true);

        controller.sync_stream(&registry, &id).await;
        assert_eq!(
            controller.status(&id),
            Some(PlaybackStatus::Failed("HLS not supported".into()))
        );

        factory.set_unsupported(false);
        registry.append_chunk(&id, Bytes::from_static(b"more")).await;
        controller.sync_stream(&registry, &id).await;

        assert!(!controller.has_session(&id));
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_attach_failure_destroys_engine() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        factory.set_fail_attach(true);

        assert!(controller.start(&id).is_err());
        assert!(!controller.has_session(&id));
        assert_eq!(factory.destroyed(), 1);
        assert!(matches!(
            controller.status(&id),
            Some(PlaybackStatus::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_requires_ready() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");

        assert_eq!(
            controller.toggle_playback(&id),
            Err(PlaybackError::NoSession(id.clone()))
        );

        controller.start(&id).unwrap();
        assert_eq!(
            controller.toggle_playback(&id),
            Err(PlaybackError::NotReady(id.clone()))
        );

        emit(&factory, &id, EngineEvent::ManifestParsed);
        pump(&mut controller);

        assert_eq!(controller.toggle_playback(&id), Ok(true));
        assert!(controller.is_playing(&id));
        assert_eq!(controller.toggle_playback(&id), Ok(false));
        assert!(!controller.is_playing(&id));
    }

    #[tokio::test]
    async fn test_play_failure_sets_error() {
        let (mut controller, factory) = controller();
        let id = StreamId::new("s1");
        controller.start(&id).unwrap();
        emit(&factory, &id, EngineEvent::ManifestParsed);
        pump(&mut controller);
        factory.set_fail_play(true);

        assert!(controller.toggle_playback(&id).is_err());
        assert_eq!(controller.error(&id), Some(PLAY_FAILED_MESSAGE));
        assert!(!controller.is_playing(&id));
    }

    #[tokio::test]
    async fn test_drop_tears_down_every_session() {
        let (mut controller, factory) = controller();
        controller.start(&StreamId::new("a")).unwrap();
        controller.start(&StreamId::new("b")).unwrap();

        drop(controller);

        assert_eq!(factory.destroyed(), 2);
    }
}
