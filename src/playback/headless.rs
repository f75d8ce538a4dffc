//! Headless engine
//!
//! An engine that renders nothing. Every call is logged and appended to a
//! shared call log, and the factory keeps each instance's event sink so the
//! owner can play the part of the media pipeline (report readiness, inject
//! faults). Used for headless runs and for exercising the controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::PlaybackError;
use crate::registry::StreamId;

use super::config::EngineConfig;
use super::engine::{
    EngineEvent, EngineEventSink, EngineFactory, PlaybackEngine, Surface, SurfaceId,
};

/// One recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// Instance created
    Create {
        /// Stream
        stream_id: StreamId,
        /// Instance generation
        generation: u64,
    },
    /// `load_source`
    LoadSource {
        /// Stream
        stream_id: StreamId,
        /// Manifest URL
        url: String,
    },
    /// `attach_media`
    AttachMedia {
        /// Stream
        stream_id: StreamId,
        /// Surface attached to
        surface: SurfaceId,
    },
    /// `detach_media`
    DetachMedia {
        /// Stream
        stream_id: StreamId,
    },
    /// `start_load`
    StartLoad {
        /// Stream
        stream_id: StreamId,
    },
    /// `recover_media_error`
    RecoverMediaError {
        /// Stream
        stream_id: StreamId,
    },
    /// `play`
    Play {
        /// Stream
        stream_id: StreamId,
    },
    /// `pause`
    Pause {
        /// Stream
        stream_id: StreamId,
    },
    /// `destroy`
    Destroy {
        /// Stream
        stream_id: StreamId,
    },
}

#[derive(Debug, Default)]
struct Switches {
    unsupported: AtomicBool,
    fail_attach: AtomicBool,
    fail_recovery: AtomicBool,
    fail_play: AtomicBool,
    auto_ready: AtomicBool,
}

/// Factory for [`HeadlessEngine`] instances
#[derive(Debug, Clone, Default)]
pub struct HeadlessFactory {
    calls: Arc<Mutex<Vec<EngineCall>>>,
    sinks: Arc<Mutex<Vec<EngineEventSink>>>,
    switches: Arc<Switches>,
}

impl HeadlessFactory {
    /// Create a factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `ManifestParsed` as soon as media is attached
    pub fn auto_ready(self, enabled: bool) -> Self {
        self.switches.auto_ready.store(enabled, Ordering::SeqCst);
        self
    }

    /// Make `create` fail with `PlaybackError::Unsupported`
    pub fn set_unsupported(&self, enabled: bool) {
        self.switches.unsupported.store(enabled, Ordering::SeqCst);
    }

    /// Make `attach_media` fail
    pub fn set_fail_attach(&self, enabled: bool) {
        self.switches.fail_attach.store(enabled, Ordering::SeqCst);
    }

    /// Make `start_load` and `recover_media_error` fail
    pub fn set_fail_recovery(&self, enabled: bool) {
        self.switches.fail_recovery.store(enabled, Ordering::SeqCst);
    }

    /// Make `play` fail
    pub fn set_fail_play(&self, enabled: bool) {
        self.switches.fail_play.store(enabled, Ordering::SeqCst);
    }

    /// Every call recorded so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded calls for one stream
    pub fn calls_for(&self, stream_id: &StreamId) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|call| call_stream(call) == stream_id)
            .collect()
    }

    /// Event sink of the newest instance created for `stream_id`
    pub fn sink(&self, stream_id: &StreamId) -> Option<EngineEventSink> {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|sink| sink.stream_id() == stream_id)
            .cloned()
    }

    /// Number of instances created
    pub fn created(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Create { .. }))
            .count()
    }

    /// Number of instances destroyed
    pub fn destroyed(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Destroy { .. }))
            .count()
    }
}

impl EngineFactory for HeadlessFactory {
    fn create(
        &self,
        config: &EngineConfig,
        events: EngineEventSink,
    ) -> Result<Box<dyn PlaybackEngine>, PlaybackError> {
        if self.switches.unsupported.load(Ordering::SeqCst) {
            return Err(PlaybackError::Unsupported);
        }

        let stream_id = events.stream_id().clone();
        let generation = events.generation();
        tracing::debug!(
            stream = %stream_id,
            generation = generation,
            low_latency = config.low_latency,
            "Headless engine created"
        );

        record(&self.calls, EngineCall::Create {
            stream_id: stream_id.clone(),
            generation,
        });
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(events.clone());

        Ok(Box::new(HeadlessEngine {
            stream_id,
            events,
            calls: Arc::clone(&self.calls),
            switches: Arc::clone(&self.switches),
        }))
    }
}

/// Engine that records calls instead of rendering
pub struct HeadlessEngine {
    stream_id: StreamId,
    events: EngineEventSink,
    calls: Arc<Mutex<Vec<EngineCall>>>,
    switches: Arc<Switches>,
}

impl HeadlessEngine {
    fn record(&self, call: EngineCall) {
        tracing::trace!(call = ?call, "Headless engine call");
        record(&self.calls, call);
    }

    fn failing(&self, switch: &AtomicBool, what: &str) -> Result<(), PlaybackError> {
        if switch.load(Ordering::SeqCst) {
            Err(PlaybackError::Engine(format!("{} failed", what)))
        } else {
            Ok(())
        }
    }
}

impl PlaybackEngine for HeadlessEngine {
    fn load_source(&mut self, url: &str) -> Result<(), PlaybackError> {
        self.record(EngineCall::LoadSource {
            stream_id: self.stream_id.clone(),
            url: url.to_owned(),
        });
        Ok(())
    }

    fn attach_media(&mut self, surface: &Surface) -> Result<(), PlaybackError> {
        self.failing(&self.switches.fail_attach, "attach_media")?;
        self.record(EngineCall::AttachMedia {
            stream_id: self.stream_id.clone(),
            surface: surface.id(),
        });
        if self.switches.auto_ready.load(Ordering::SeqCst) {
            self.events.emit(EngineEvent::ManifestParsed);
        }
        Ok(())
    }

    fn detach_media(&mut self) {
        self.record(EngineCall::DetachMedia {
            stream_id: self.stream_id.clone(),
        });
    }

    fn start_load(&mut self) -> Result<(), PlaybackError> {
        self.record(EngineCall::StartLoad {
            stream_id: self.stream_id.clone(),
        });
        self.failing(&self.switches.fail_recovery, "start_load")
    }

    fn recover_media_error(&mut self) -> Result<(), PlaybackError> {
        self.record(EngineCall::RecoverMediaError {
            stream_id: self.stream_id.clone(),
        });
        self.failing(&self.switches.fail_recovery, "recover_media_error")
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.failing(&self.switches.fail_play, "play")?;
        self.record(EngineCall::Play {
            stream_id: self.stream_id.clone(),
        });
        Ok(())
    }

    fn pause(&mut self) {
        self.record(EngineCall::Pause {
            stream_id: self.stream_id.clone(),
        });
    }

    fn destroy(&mut self) {
        self.record(EngineCall::Destroy {
            stream_id: self.stream_id.clone(),
        });
    }
}

fn record(calls: &Mutex<Vec<EngineCall>>, call: EngineCall) {
    calls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(call);
}

fn call_stream(call: &EngineCall) -> &StreamId {
    match call {
        EngineCall::Create { stream_id, .. }
        | EngineCall::LoadSource { stream_id, .. }
        | EngineCall::AttachMedia { stream_id, .. }
        | EngineCall::DetachMedia { stream_id }
        | EngineCall::StartLoad { stream_id }
        | EngineCall::RecoverMediaError { stream_id }
        | EngineCall::Play { stream_id }
        | EngineCall::Pause { stream_id }
        | EngineCall::Destroy { stream_id } => stream_id,
    }
}
