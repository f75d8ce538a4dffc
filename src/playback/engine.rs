//! Playback engine capability
//!
//! The adaptive playback engine is an external collaborator: given a
//! manifest URL and a rendering surface it fetches and plays segments, and
//! reports readiness and errors asynchronously. These traits are the seam the
//! controller drives it through.

use tokio::sync::mpsc;

use crate::error::PlaybackError;
use crate::registry::StreamId;

use super::config::EngineConfig;

/// Identifier of a rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// A rendering surface
///
/// Neither `Clone` nor `Copy`: whoever holds the value owns the
/// surface, so two engines can never be attached to it at once.
#[derive(Debug, PartialEq, Eq)]
pub struct Surface {
    id: SurfaceId,
}

impl Surface {
    pub(super) fn new(id: u64) -> Self {
        Self { id: SurfaceId(id) }
    }

    /// Surface identifier
    pub fn id(&self) -> SurfaceId {
        self.id
    }
}

/// Classification of an engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Manifest or fragment could not be fetched
    Network,
    /// Media could not be decoded or appended
    Media,
    /// Anything else
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Media => write!(f, "media"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Error reported by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Classification
    pub kind: ErrorKind,
    /// Whether playback cannot continue without intervention
    pub fatal: bool,
    /// Engine-specific detail
    pub details: String,
}

impl EngineError {
    /// Fatal error
    pub fn fatal(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: true,
            details: details.into(),
        }
    }

    /// Recoverable error, handled inside the engine
    pub fn recoverable(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            fatal: false,
            details: details.into(),
        }
    }
}

/// Asynchronous engine notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Manifest loaded and parsed; playback can start
    ManifestParsed,
    /// A fragment was loaded, so the engine is making progress
    FragmentLoaded,
    /// The engine hit an error
    Error(EngineError),
}

/// Engine event tagged with the instance that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// Stream the engine plays
    pub stream_id: StreamId,
    /// Instance generation; events from replaced instances are stale
    pub generation: u64,
    /// The event
    pub event: EngineEvent,
}

/// Handle an engine uses to report events back to the controller
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    stream_id: StreamId,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EngineEventSink {
    pub(super) fn new(
        stream_id: StreamId,
        generation: u64,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            stream_id,
            generation,
            tx,
        }
    }

    /// Stream this engine plays
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Instance generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event; silently dropped once the controller is gone
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(SessionEvent {
            stream_id: self.stream_id.clone(),
            generation: self.generation,
            event,
        });
    }
}

/// One adaptive playback engine instance
pub trait PlaybackEngine: Send {
    /// Point the engine at a manifest
    fn load_source(&mut self, url: &str) -> Result<(), PlaybackError>;

    /// Render into `surface`
    fn attach_media(&mut self, surface: &Surface) -> Result<(), PlaybackError>;

    /// Stop rendering into the attached surface
    fn detach_media(&mut self);

    /// Resume loading after a network fault
    fn start_load(&mut self) -> Result<(), PlaybackError>;

    /// Reset the media layer after a media fault
    fn recover_media_error(&mut self) -> Result<(), PlaybackError>;

    /// Start or resume playback
    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Pause playback
    fn pause(&mut self);

    /// Release every resource held by the instance
    fn destroy(&mut self);
}

/// Builds engine instances
pub trait EngineFactory {
    /// Create an engine that reports through `events`
    ///
    /// Returns `PlaybackError::Unsupported` when no engine can run here.
    fn create(
        &self,
        config: &EngineConfig,
        events: EngineEventSink,
    ) -> Result<Box<dyn PlaybackEngine>, PlaybackError>;
}
