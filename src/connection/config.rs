//! Connection configuration

use std::time::Duration;

/// Default delay between losing the connection and the next attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Connection manager options
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Fixed delay before each reconnect attempt
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ConnectionConfig {
    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}
