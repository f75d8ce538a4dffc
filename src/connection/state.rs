//! Connection state machine types

/// Lifecycle state of the server connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No link; a reconnect may be pending
    #[default]
    Disconnected,
    /// Link opened, waiting for the open signal
    Connecting,
    /// Link open; commands may be sent
    Connected,
}

impl ConnectionState {
    /// Lowercase name, as shown to users
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the connection manager observed while being driven
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The link opened
    Connected,
    /// A text frame arrived
    Frame(String),
    /// The link was lost; a reconnect is scheduled
    Disconnected,
    /// The reconnect delay elapsed and a new link is being opened
    Reconnecting,
}

/// Counters kept by the connection manager
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Links opened (first connect and every reconnect)
    pub connect_attempts: u64,
    /// Links that reached the open state
    pub connections: u64,
    /// Reconnects scheduled after a lost link
    pub reconnects_scheduled: u64,
    /// Frames received
    pub frames_received: u64,
    /// Commands handed to the link
    pub commands_sent: u64,
    /// Commands dropped because the link was not open
    pub commands_dropped: u64,
}
