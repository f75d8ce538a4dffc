//! Live playback
//!
//! One adaptive HLS engine per stream, built once the stream has data:
//!
//! ```text
//!   RegistryEvent ──► PlaybackController ──create──► EngineFactory
//!                           │                             │
//!                           │ owns                        ▼
//!                           ▼                      Box<dyn PlaybackEngine>
//!                    PlaybackSession ◄──── engine + Surface
//!                           ▲
//!                           └──── SessionEvent (ready / progress / error)
//! ```
//!
//! The engine itself is a capability behind [`PlaybackEngine`];
//! [`HeadlessEngine`] records calls without rendering.

pub mod config;
pub mod controller;
pub mod engine;
pub mod headless;
pub mod session;

pub use config::{EngineConfig, LoadPolicy, PlaybackConfig};
pub use controller::PlaybackController;
pub use engine::{
    EngineError, EngineEvent, EngineEventSink, EngineFactory, ErrorKind, PlaybackEngine,
    SessionEvent, Surface, SurfaceId,
};
pub use headless::{EngineCall, HeadlessEngine, HeadlessFactory};
pub use session::{PlaybackSession, PlaybackStatus};
