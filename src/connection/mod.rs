//! Server connection
//!
//! Provides the client side of the stream server socket:
//! - [`ConnectionManager`]: state machine with fixed-delay automatic reconnect
//! - [`Connector`] / [`Link`]: transport abstraction
//! - [`WsConnector`]: WebSocket transport
//! - [`MemoryConnector`]: in-process transport for tests and demos

pub mod config;
pub mod link;
pub mod manager;
pub mod memory;
pub mod state;
pub mod websocket;

pub use config::ConnectionConfig;
pub use link::{Connector, Link, LinkEvent};
pub use manager::ConnectionManager;
pub use memory::{MemoryConnector, MemoryRemote};
pub use state::{ConnectionEvent, ConnectionState, ConnectionStats};
pub use websocket::WsConnector;
