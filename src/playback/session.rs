//! Per-stream playback session
//!
//! A session couples one engine instance with the surface it renders into.
//! Teardown (detach, then destroy) runs exactly once, either explicitly
//! through [`PlaybackSession::teardown`] or from `Drop`, so no exit path can
//! leave an engine attached.

use crate::error::PlaybackError;
use crate::registry::StreamId;

use super::engine::{ErrorKind, PlaybackEngine, Surface, SurfaceId};

/// Observable state of a stream's playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Engine built, manifest not parsed yet
    Loading,
    /// Manifest parsed; playback can be toggled
    Ready,
    /// A fatal error is being recovered in place
    Recovering(ErrorKind),
    /// Engine torn down after an unrecoverable error
    Failed(String),
}

/// An engine attached to a surface
pub struct PlaybackSession {
    stream_id: StreamId,
    generation: u64,
    url: String,
    engine: Option<Box<dyn PlaybackEngine>>,
    surface: Option<Surface>,
    ready: bool,
    recovering: Option<ErrorKind>,
    playing: bool,
    last_error: Option<String>,
}

impl PlaybackSession {
    /// Load `url` into `engine` and attach it to `surface`
    ///
    /// On failure the engine is destroyed and the surface handed back.
    pub fn start(
        stream_id: StreamId,
        generation: u64,
        url: String,
        mut engine: Box<dyn PlaybackEngine>,
        surface: Surface,
    ) -> Result<Self, (PlaybackError, Surface)> {
        let attached = engine
            .load_source(&url)
            .and_then(|()| engine.attach_media(&surface));

        if let Err(e) = attached {
            engine.detach_media();
            engine.destroy();
            return Err((e, surface));
        }

        Ok(Self {
            stream_id,
            generation,
            url,
            engine: Some(engine),
            surface: Some(surface),
            ready: false,
            recovering: None,
            playing: false,
            last_error: None,
        })
    }

    /// Detach and destroy the engine, returning the surface
    ///
    /// Idempotent; later calls return `None`.
    pub fn teardown(&mut self) -> Option<Surface> {
        if let Some(mut engine) = self.engine.take() {
            engine.detach_media();
            engine.destroy();
            tracing::debug!(
                stream = %self.stream_id,
                generation = self.generation,
                "Engine destroyed"
            );
        }
        self.playing = false;
        self.surface.take()
    }

    /// Stream this session plays
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Engine instance generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Playlist URL the engine was pointed at
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Surface the engine renders into
    pub fn surface_id(&self) -> Option<SurfaceId> {
        self.surface.as_ref().map(Surface::id)
    }

    /// Current status
    pub fn status(&self) -> PlaybackStatus {
        match (self.recovering, self.ready) {
            (Some(kind), _) => PlaybackStatus::Recovering(kind),
            (None, true) => PlaybackStatus::Ready,
            (None, false) => PlaybackStatus::Loading,
        }
    }

    /// Whether playback is running
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Most recent error text shown for this stream
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Manifest parsed: the session is ready and any error is cleared
    pub(super) fn mark_ready(&mut self) {
        self.ready = true;
        self.recovering = None;
        self.last_error = None;
    }

    /// The engine made progress, so an outstanding recovery succeeded
    pub(super) fn mark_progress(&mut self) -> bool {
        self.recovering.take().is_some()
    }

    /// Record a fatal error
    pub(super) fn set_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    /// Kind of the recovery attempt still waiting for progress, if any
    pub(super) fn outstanding_recovery(&self) -> Option<ErrorKind> {
        self.recovering
    }

    /// Attempt in-place recovery for a fatal error of `kind`
    ///
    /// Only network and media faults are recoverable.
    pub(super) fn recover(&mut self, kind: ErrorKind) -> Result<(), PlaybackError> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| PlaybackError::NoSession(self.stream_id.clone()))?;

        match kind {
            ErrorKind::Network => engine.start_load()?,
            ErrorKind::Media => engine.recover_media_error()?,
            ErrorKind::Other => {
                return Err(PlaybackError::Engine("unrecoverable engine error".into()))
            }
        }
        self.recovering = Some(kind);
        Ok(())
    }

    /// Play if paused, pause if playing; returns the new playing state
    pub(super) fn toggle(&mut self) -> Result<bool, PlaybackError> {
        if !self.ready {
            return Err(PlaybackError::NotReady(self.stream_id.clone()));
        }
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| PlaybackError::NoSession(self.stream_id.clone()))?;

        if self.playing {
            engine.pause();
            self.playing = false;
        } else {
            engine.play()?;
            self.playing = true;
        }
        Ok(self.playing)
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("stream_id", &self.stream_id)
            .field("generation", &self.generation)
            .field("url", &self.url)
            .field("surface", &self.surface_id())
            .field("status", &self.status())
            .field("playing", &self.playing)
            .finish()
    }
}
