//! In-process transport
//!
//! [`MemoryConnector`] hands out links whose far end is a [`MemoryRemote`]
//! held by the caller, which can then play the server: signal open, push
//! frames, fail or close the link, and read the commands the client sent.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use super::link::{Connector, Link, LinkEvent};

/// Connector whose links terminate in [`MemoryRemote`] handles
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    remotes: Arc<Mutex<VecDeque<MemoryRemote>>>,
    opened: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Create a connector
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of links opened so far
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Claim the far end of the oldest unclaimed link
    pub fn take_remote(&self) -> Option<MemoryRemote> {
        self.remotes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, endpoint: &str) -> Link {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.remotes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(MemoryRemote {
                endpoint: endpoint.to_owned(),
                events: events_tx,
                outbound: outbound_rx,
            });

        Link::new(outbound_tx, events_rx)
    }
}

/// Server side of an in-process link
#[derive(Debug)]
pub struct MemoryRemote {
    endpoint: String,
    events: mpsc::UnboundedSender<LinkEvent>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl MemoryRemote {
    /// Endpoint the client asked for
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Complete the handshake
    pub fn open(&self) {
        self.signal(LinkEvent::Open);
    }

    /// Deliver a text frame to the client
    pub fn frame(&self, text: impl Into<String>) {
        self.signal(LinkEvent::Frame(text.into()));
    }

    /// Report a transport fault
    pub fn error(&self, reason: impl Into<String>) {
        self.signal(LinkEvent::Error(reason.into()));
    }

    /// Close the link
    pub fn close(&self) {
        self.signal(LinkEvent::Closed);
    }

    /// Next command the client sent, if any is waiting
    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Whether the client has dropped its end
    pub fn is_dropped(&self) -> bool {
        self.events.is_closed()
    }

    fn signal(&self, event: LinkEvent) {
        // The client may already have dropped the link
        let _ = self.events.send(event);
    }
}
