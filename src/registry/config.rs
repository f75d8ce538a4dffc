//! Registry configuration

/// Default number of chunks retained per stream
pub const DEFAULT_CHUNK_CAPACITY: usize = 10;

/// Default capacity of the change-event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for the stream registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum chunks kept per stream; oldest are evicted first
    pub chunk_capacity: usize,

    /// Capacity of the broadcast channel carrying change events
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the per-stream chunk capacity (at least 1)
    pub fn chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity.max(1);
        self
    }

    /// Set the change-event channel capacity (at least 1)
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.chunk_capacity, 10);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_capacity_floor() {
        let config = RegistryConfig::default().chunk_capacity(0).event_capacity(0);
        assert_eq!(config.chunk_capacity, 1);
        assert_eq!(config.event_capacity, 1);
    }
}
