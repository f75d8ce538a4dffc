//! Viewer configuration
//!
//! Endpoints come from the environment with local-development fallbacks:
//!
//! | variable                 | default                          |
//! |--------------------------|----------------------------------|
//! | `STREAMVIEW_WS_URL`      | `ws://localhost:8000/ws/stream/` |
//! | `STREAMVIEW_BACKEND_URL` | `http://localhost:8000`          |

use std::time::Duration;

use url::Url;

use crate::connection::ConnectionConfig;
use crate::error::{Error, Result};
use crate::notify::DEFAULT_NOTIFICATION_TTL;
use crate::playback::config::DEFAULT_BACKEND_URL;
use crate::playback::{EngineConfig, PlaybackConfig};
use crate::registry::RegistryConfig;

/// Environment variable naming the stream server socket
pub const WS_URL_ENV: &str = "STREAMVIEW_WS_URL";

/// Environment variable naming the playlist backend
pub const BACKEND_URL_ENV: &str = "STREAMVIEW_BACKEND_URL";

/// Default stream server socket
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws/stream/";

/// Everything a [`Viewer`](crate::viewer::Viewer) needs
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Stream server socket address
    pub ws_url: String,

    /// Base address playlists are fetched from
    pub backend_url: String,

    /// Reconnect policy
    pub connection: ConnectionConfig,

    /// Chunk buffering
    pub registry: RegistryConfig,

    /// Engine tuning
    pub engine: EngineConfig,

    /// How long notifications stay visible
    pub notification_ttl: Duration,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_owned(),
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            connection: ConnectionConfig::default(),
            registry: RegistryConfig::default(),
            engine: EngineConfig::default(),
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
        }
    }
}

impl ViewerConfig {
    /// Defaults overridden by `STREAMVIEW_WS_URL` and `STREAMVIEW_BACKEND_URL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(WS_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.ws_url = url.trim().to_owned();
        }
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.backend_url = url.trim().to_owned();
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the stream server socket address
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Set the playlist backend address
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.connection = self.connection.reconnect_delay(delay);
        self
    }

    /// Set the per-stream chunk capacity
    pub fn chunk_capacity(mut self, capacity: usize) -> Self {
        self.registry = self.registry.chunk_capacity(capacity);
        self
    }

    /// Set the engine tuning
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Set how long notifications stay visible
    pub fn notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    /// Check both endpoints parse and use the expected schemes
    pub fn validate(&self) -> Result<()> {
        check_url(WS_URL_ENV, &self.ws_url, &["ws", "wss"])?;
        check_url(BACKEND_URL_ENV, &self.backend_url, &["http", "https"])?;
        Ok(())
    }

    /// Playback options derived from this configuration
    pub fn playback(&self) -> PlaybackConfig {
        PlaybackConfig::default()
            .backend_url(self.backend_url.clone())
            .engine(self.engine.clone())
    }
}

fn check_url(name: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("{}: invalid URL {:?}: {}", name, value, e)))?;

    if !schemes.contains(&url.scheme()) {
        return Err(Error::Config(format!(
            "{}: scheme {:?} not one of {:?}",
            name,
            url.scheme(),
            schemes
        )));
    }
    if url.host_str().is_none() {
        return Err(Error::Config(format!("{}: missing host in {:?}", name, value)));
    }
    Ok(())
}
