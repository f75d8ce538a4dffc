//! streamview: core of a live multi-stream viewer
//!
//! A viewer keeps one persistent WebSocket link to a stream server, mirrors
//! the server's streams into a local registry, and runs one adaptive HLS
//! playback engine per stream once that stream is delivering data.
//!
//! ```text
//!   stream server ──ws──► ConnectionManager ──► MessageRouter ──► StreamRegistry
//!                                                                     │
//!   backend ◄──playlist.m3u8── PlaybackEngine ◄── PlaybackController ◄┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use streamview::connection::WsConnector;
//! use streamview::playback::HeadlessFactory;
//! use streamview::{Viewer, ViewerCommand, ViewerConfig};
//!
//! # async fn demo() -> streamview::Result<()> {
//! let config = ViewerConfig::from_env()?;
//! let mut viewer = Viewer::new(config, WsConnector::new(), HeadlessFactory::new());
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(16);
//! tx.send(ViewerCommand::AddStream("rtsp://camera.local/live".into()))
//!     .await
//!     .ok();
//! viewer.run(rx).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod notify;
pub mod playback;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod viewer;

pub use config::ViewerConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{Error, Result};
pub use notify::{Notification, NotificationCenter, NotificationLevel};
pub use playback::{PlaybackController, PlaybackStatus};
pub use registry::{StreamId, StreamRecord, StreamRegistry, StreamStatus};
pub use router::MessageRouter;
pub use viewer::{Viewer, ViewerCommand};
