//! Registry change events

use super::entry::StreamId;

/// Change notification published after every applied registry mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A record was created; `replaced` is set when an existing record with
    /// the same id was overwritten
    Created {
        /// Stream id
        id: StreamId,
        /// Whether a previous record was overwritten
        replaced: bool,
    },
    /// A record's status, buffer or playing flag changed
    Updated {
        /// Stream id
        id: StreamId,
    },
    /// A record was removed
    Removed {
        /// Stream id
        id: StreamId,
    },
}

impl RegistryEvent {
    /// The stream this event refers to
    pub fn stream_id(&self) -> &StreamId {
        match self {
            RegistryEvent::Created { id, .. }
            | RegistryEvent::Updated { id }
            | RegistryEvent::Removed { id } => id,
        }
    }
}
