//! Transport link abstraction
//!
//! A [`Link`] is one attempt at a duplex text connection. It is produced by a
//! [`Connector`] and reports its lifecycle as [`LinkEvent`]s, mirroring the
//! open/message/error/close signals of a browser socket. Opening never
//! blocks: the handshake runs in the background and is reported as `Open`
//! or `Error` + `Closed`.

use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Signals emitted by a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Handshake completed
    Open,
    /// Text frame received
    Frame(String),
    /// Transport fault; a `Closed` usually follows
    Error(String),
    /// Link closed
    Closed,
}

/// Opens links to an endpoint
pub trait Connector {
    /// Start opening a link to `endpoint`
    fn open(&self, endpoint: &str) -> Link;
}

/// One duplex link
///
/// Dropping the link closes its outbound side; the transport task then
/// shuts the socket down and exits.
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    /// Create a link from its channel ends
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<LinkEvent>,
    ) -> Self {
        Self { outbound, events }
    }

    /// Queue a text frame for transmission
    pub fn send(&self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .map_err(|_| Error::Transport("link closed".into()))
    }

    /// Wait for the next lifecycle signal
    ///
    /// Returns `None` once the transport side is gone.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("outbound_closed", &self.outbound.is_closed())
            .finish()
    }
}
