//! Wire protocol
//!
//! JSON text frames exchanged with the stream server:
//! - [`ServerMessage`]: inbound, tagged by `type`
//! - [`ClientCommand`]: outbound, tagged by `action`

pub mod command;
pub mod message;

pub use command::ClientCommand;
pub use message::{ServerMessage, StreamData, StreamSummary};
