//! Viewer
//!
//! The state container tying the components together. A single task owns
//! the viewer and drives it; every source of work is awaited in one
//! `select!`:
//!
//! ```text
//!   ConnectionManager ──Frame──► MessageRouter ──► StreamRegistry
//!          ▲                                            │
//!          │ ClientCommand                    RegistryEvent
//!          │                                            ▼
//!   ViewerCommand (user)                       PlaybackController
//!                                                       ▲
//!                                        SessionEvent ──┘ (engines)
//! ```
//!
//! Frames are routed one at a time and the resulting registry changes are
//! applied to playback before the next frame is read.

pub mod input;

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use crate::config::ViewerConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState, Connector};
use crate::error::Result;
use crate::notify::{Notification, NotificationCenter};
use crate::playback::{EngineFactory, PlaybackController, PlaybackStatus, SessionEvent};
use crate::protocol::ClientCommand;
use crate::registry::{RegistryEvent, StreamId, StreamRegistry};
use crate::router::MessageRouter;

pub use input::{feed_title, validate_feed_address};

/// A user action delivered to [`Viewer::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCommand {
    /// Add a feed by address
    AddStream(String),
    /// Remove a stream
    RemoveStream(StreamId),
    /// Ask the server for its stream list
    ListStreams,
    /// Play or pause a stream
    TogglePlayback(StreamId),
    /// Stop the viewer
    Shutdown,
}

/// Something the event loop woke up for
enum Wake {
    Connection(ConnectionEvent),
    Engine(SessionEvent),
    Registry(std::result::Result<RegistryEvent, broadcast::error::RecvError>),
    Command(Option<ViewerCommand>),
}

/// Owns the connection, registry, router, playback and notifications
pub struct Viewer<C: Connector, F: EngineFactory> {
    config: ViewerConfig,
    connection: ConnectionManager<C>,
    registry: Arc<StreamRegistry>,
    router: MessageRouter,
    playback: PlaybackController<F>,
    notifications: NotificationCenter,
    registry_events: broadcast::Receiver<RegistryEvent>,
}

impl<C: Connector, F: EngineFactory> Viewer<C, F> {
    /// Build a viewer; nothing connects until [`connect`](Self::connect)
    pub fn new(config: ViewerConfig, connector: C, factory: F) -> Self {
        let registry = Arc::new(StreamRegistry::with_config(config.registry.clone()));
        let registry_events = registry.subscribe();

        Self {
            connection: ConnectionManager::new(connector, config.connection.clone()),
            router: MessageRouter::new(Arc::clone(&registry)),
            playback: PlaybackController::new(factory, config.playback()),
            notifications: NotificationCenter::new(config.notification_ttl),
            registry,
            registry_events,
            config,
        }
    }

    /// Open the connection to the configured endpoint
    pub fn connect(&mut self) {
        self.connection.connect(self.config.ws_url.clone());
    }

    /// Run until a `Shutdown` command arrives or the command channel closes
    pub async fn run(&mut self, mut commands: mpsc::Receiver<ViewerCommand>) {
        self.connect();

        loop {
            match self.wait(Some(&mut commands)).await {
                Wake::Command(None) | Wake::Command(Some(ViewerCommand::Shutdown)) => break,
                Wake::Command(Some(command)) => self.handle_command(command).await,
                wake => self.handle(wake).await,
            }
        }

        self.shutdown();
    }

    /// Wait for and handle one connection, engine or registry event
    pub async fn step(&mut self) {
        let wake = self.wait(None).await;
        self.handle(wake).await;
    }

    /// Apply one user action
    ///
    /// Failures are logged; user-facing ones are also raised as
    /// notifications by the action itself.
    pub async fn handle_command(&mut self, command: ViewerCommand) {
        let result = match command {
            ViewerCommand::AddStream(url) => self.add_stream(&url).await,
            ViewerCommand::RemoveStream(id) => self.remove_stream(&id).await,
            ViewerCommand::ListStreams => self.request_stream_list(),
            ViewerCommand::TogglePlayback(id) => self.toggle_playback(&id).await.map(|_| ()),
            ViewerCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "User action failed");
        }
    }

    /// Ask the server to ingest the feed at `address`
    ///
    /// Invalid addresses are rejected with an error notification before
    /// anything is sent. The feed is titled `Camera N`, N being one more
    /// than the number of streams shown.
    pub async fn add_stream(&mut self, address: &str) -> Result<()> {
        let url = match validate_feed_address(address) {
            Ok(url) => url,
            Err(e) => {
                self.notifications.push(Notification::error(e.to_string()));
                return Err(e.into());
            }
        };

        let title = feed_title(self.registry.len().await);
        tracing::info!(url = %url, title = %title, "Adding stream");
        self.connection.send(&ClientCommand::AddStream { url, title })
    }

    /// Stop showing a stream and ask the server to drop it
    ///
    /// Playback and the local record are released right away; the server's
    /// `stream_removed` echo is then a no-op.
    pub async fn remove_stream(&mut self, id: &StreamId) -> Result<()> {
        self.playback.forget(id);
        if self.registry.remove(id).await.is_some() {
            tracing::info!(stream = %id, "Stream removed locally");
        }
        self.apply_registry_events().await;

        self.connection.send(&ClientCommand::RemoveStream {
            stream_id: id.clone(),
        })
    }

    /// Ask the server for its stream list
    pub fn request_stream_list(&mut self) -> Result<()> {
        self.connection.send(&ClientCommand::GetStreams)
    }

    /// Play or pause a ready stream; returns the new playing state
    pub async fn toggle_playback(&mut self, id: &StreamId) -> Result<bool> {
        let playing = self.playback.toggle_playback(id)?;
        self.set_playing_flag(id, playing).await;
        Ok(playing)
    }

    /// Apply one connection event
    pub async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Frame(text) => {
                let routed = self.router.route(&text).await;
                if let Some(notification) = routed.notification {
                    self.notifications.push(notification);
                }
                self.apply_registry_events().await;
            }
            ConnectionEvent::Connected => {
                tracing::debug!("Stream server link open");
            }
            ConnectionEvent::Disconnected => {
                let streams = self.registry.len().await;
                tracing::debug!(streams = streams, "Stream server link lost");
            }
            ConnectionEvent::Reconnecting => {}
        }
    }

    /// Apply one engine event
    pub async fn handle_engine_event(&mut self, event: SessionEvent) {
        let id = event.stream_id.clone();
        if let Some(PlaybackStatus::Failed(_)) = self.playback.handle_event(event) {
            self.set_playing_flag(&id, false).await;
        }
    }

    /// Tear everything down: playback first, then the connection
    pub fn shutdown(&mut self) {
        self.playback.shutdown();
        self.connection.shutdown();
    }

    /// Shared stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Observe connection state changes
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Connection manager
    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    /// Visible notification, if any
    pub fn notification(&self) -> Option<&Notification> {
        self.notifications.current()
    }

    /// Playback controller
    pub fn playback(&self) -> &PlaybackController<F> {
        &self.playback
    }

    /// Viewer configuration
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    async fn wait(&mut self, commands: Option<&mut mpsc::Receiver<ViewerCommand>>) -> Wake {
        tokio::select! {
            event = self.connection.next_event() => Wake::Connection(event),
            Some(event) = self.playback.next_event() => Wake::Engine(event),
            event = self.registry_events.recv() => Wake::Registry(event),
            command = recv_command(commands) => Wake::Command(command),
        }
    }

    async fn handle(&mut self, wake: Wake) {
        match wake {
            Wake::Connection(event) => self.handle_connection_event(event).await,
            Wake::Engine(event) => self.handle_engine_event(event).await,
            Wake::Registry(event) => self.on_registry_event(event).await,
            Wake::Command(Some(command)) => self.handle_command(command).await,
            Wake::Command(None) => {}
        }
    }

    /// Apply registry changes that are already queued
    async fn apply_registry_events(&mut self) {
        loop {
            match self.registry_events.try_recv() {
                Ok(event) => self.on_registry_event(Ok(event)).await,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    self.on_registry_event(Err(broadcast::error::RecvError::Lagged(missed)))
                        .await
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
    }

    async fn on_registry_event(
        &mut self,
        event: std::result::Result<RegistryEvent, broadcast::error::RecvError>,
    ) {
        match event {
            Ok(event) => {
                self.playback
                    .on_registry_event(&self.registry, &event)
                    .await
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed = missed, "Registry events missed, resynchronising");
                self.playback.resync(&self.registry).await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("Registry event channel closed");
            }
        }
    }

    async fn set_playing_flag(&mut self, id: &StreamId, playing: bool) {
        let current = self.registry.get(id).await.map(|record| record.playing);
        if current.is_some_and(|flag| flag != playing) {
            self.registry.toggle_playing(id).await;
            self.apply_registry_events().await;
        }
    }
}

async fn recv_command(commands: Option<&mut mpsc::Receiver<ViewerCommand>>) -> Option<ViewerCommand> {
    match commands {
        Some(commands) => commands.recv().await,
        None => pending().await,
    }
}
