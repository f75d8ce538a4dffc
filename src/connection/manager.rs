//! Connection manager
//!
//! Owns the single link to the stream server and keeps it alive:
//!
//! ```text
//!   Disconnected ──connect()──► Connecting ──Open──► Connected
//!        ▲                                               │
//!        │                                       Error / Closed
//!        │                                               │
//!        └──── reconnect delay elapsed ◄── Disconnected ◄┘
//! ```
//!
//! Every transition into `Disconnected` from a live link schedules exactly
//! one reconnect. The lost link is dropped on that first signal, so a
//! trailing `Closed` after an `Error` can never schedule a second one.
//! [`shutdown`](ConnectionManager::shutdown) cancels a pending reconnect and
//! leaves the manager inert.

use std::future::pending;
use std::pin::Pin;

use tokio::sync::watch;
use tokio::time::{sleep, Sleep};

use crate::error::{Error, Result};
use crate::protocol::ClientCommand;

use super::config::ConnectionConfig;
use super::link::{Connector, Link, LinkEvent};
use super::state::{ConnectionEvent, ConnectionState, ConnectionStats};

/// Keeps one duplex link to the server open
pub struct ConnectionManager<C: Connector> {
    connector: C,
    config: ConnectionConfig,

    /// Endpoint given to the last `connect` call
    endpoint: Option<String>,

    /// Current state, observable through `watch_state`
    state: watch::Sender<ConnectionState>,

    /// Current link, if one is open or opening
    link: Option<Link>,

    /// Pending reconnect, if the link was lost
    reconnect: Option<Pin<Box<Sleep>>>,

    shut_down: bool,
    stats: ConnectionStats,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager; nothing happens until `connect` is called
    pub fn new(connector: C, config: ConnectionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            config,
            endpoint: None,
            state,
            link: None,
            reconnect: None,
            shut_down: false,
            stats: ConnectionStats::default(),
        }
    }

    /// Start connecting to `endpoint`
    ///
    /// Idempotent: calling again with the same endpoint while connecting,
    /// connected, or waiting to reconnect does nothing. A different endpoint
    /// replaces the current link. Ignored after `shutdown`.
    pub fn connect(&mut self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();

        if self.shut_down {
            tracing::warn!(endpoint = %endpoint, "Connect after shutdown ignored");
            return;
        }

        let busy = self.link.is_some() || self.reconnect.is_some();
        if busy && self.endpoint.as_deref() == Some(endpoint.as_str()) {
            tracing::debug!(endpoint = %endpoint, state = %self.state(), "Already connecting");
            return;
        }

        self.link = None;
        self.reconnect = None;
        self.endpoint = Some(endpoint);
        self.open_link();
    }

    /// Send a command to the server
    ///
    /// Only succeeds while `Connected`. Otherwise the command is dropped,
    /// a warning is logged and `Error::NotConnected` is returned, or
    /// `Error::ShutDown` after [`shutdown`](Self::shutdown). Nothing is
    /// queued for later delivery.
    pub fn send(&mut self, command: &ClientCommand) -> Result<()> {
        if self.shut_down {
            self.stats.commands_dropped += 1;
            tracing::warn!(action = command.action(), "Shut down, command dropped");
            return Err(Error::ShutDown);
        }

        let link = match (self.state(), self.link.as_ref()) {
            (ConnectionState::Connected, Some(link)) => link,
            (state, _) => {
                self.stats.commands_dropped += 1;
                tracing::warn!(
                    action = command.action(),
                    state = %state,
                    "Not connected, command dropped"
                );
                return Err(Error::NotConnected);
            }
        };

        let text = command.encode()?;
        link.send(text)?;
        self.stats.commands_sent += 1;

        tracing::debug!(action = command.action(), "Command sent");
        Ok(())
    }

    /// Drive the state machine until something observable happens
    ///
    /// Cancel safe: dropping the future before it completes loses no
    /// events and leaves the state unchanged. After `shutdown` this never
    /// completes.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            tokio::select! {
                event = recv_link(self.link.as_mut()) => {
                    if let Some(event) = self.on_link_event(event) {
                        return event;
                    }
                }
                () = wait_reconnect(self.reconnect.as_mut()) => {
                    self.reconnect = None;
                    tracing::info!("Attempting to reconnect");
                    self.open_link();
                    return ConnectionEvent::Reconnecting;
                }
            }
        }
    }

    /// Tear the connection down for good
    ///
    /// Cancels a pending reconnect exactly once and closes the link.
    /// Subsequent calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.reconnect.take().is_some() {
            tracing::debug!("Pending reconnect cancelled");
        }
        self.link = None;
        self.set_state(ConnectionState::Disconnected);

        tracing::info!("Connection shut down");
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Whether a reconnect is scheduled
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Endpoint given to the last `connect` call
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Counters
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    fn open_link(&mut self) {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return;
        };

        tracing::info!(endpoint = %endpoint, "Connecting");
        self.link = Some(self.connector.open(endpoint));
        self.stats.connect_attempts += 1;
        self.set_state(ConnectionState::Connecting);
    }

    fn on_link_event(&mut self, event: Option<LinkEvent>) -> Option<ConnectionEvent> {
        match event {
            Some(LinkEvent::Open) => {
                if self.state() != ConnectionState::Connecting {
                    return None;
                }
                self.stats.connections += 1;
                self.set_state(ConnectionState::Connected);
                tracing::info!(endpoint = ?self.endpoint, "Connected");
                Some(ConnectionEvent::Connected)
            }
            Some(LinkEvent::Frame(text)) => {
                self.stats.frames_received += 1;
                Some(ConnectionEvent::Frame(text))
            }
            Some(LinkEvent::Error(reason)) => {
                tracing::warn!(error = %reason, "Connection error");
                Some(self.on_link_lost())
            }
            Some(LinkEvent::Closed) | None => {
                tracing::info!("Disconnected");
                Some(self.on_link_lost())
            }
        }
    }

    fn on_link_lost(&mut self) -> ConnectionEvent {
        self.link = None;
        self.set_state(ConnectionState::Disconnected);

        let delay = self.config.reconnect_delay;
        self.reconnect = Some(Box::pin(sleep(delay)));
        self.stats.reconnects_scheduled += 1;

        tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        ConnectionEvent::Disconnected
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn recv_link(link: Option<&mut Link>) -> Option<LinkEvent> {
    match link {
        Some(link) => link.recv().await,
        None => pending().await,
    }
}

async fn wait_reconnect(timer: Option<&mut Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.await,
        None => pending().await,
    }
}
