//! WebSocket transport
//!
//! Each [`Link`] gets its own task that performs the handshake and then pumps
//! frames in both directions until either side goes away.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::link::{Connector, Link, LinkEvent};

/// Opens links over `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    fn open(&self, endpoint: &str) -> Link {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_socket(endpoint.to_owned(), outbound_rx, events_tx));

        Link::new(outbound_tx, events_rx)
    }
}

/// Drive one socket from handshake to close
async fn run_socket(
    endpoint: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let ws_stream = match connect_async(endpoint.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            tracing::debug!(endpoint = %endpoint, error = %e, "WebSocket handshake failed");
            let _ = events.send(LinkEvent::Error(e.to_string()));
            let _ = events.send(LinkEvent::Closed);
            return;
        }
    };

    if events.send(LinkEvent::Open).is_err() {
        // Link already dropped by its owner
        return;
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        let _ = events.send(LinkEvent::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    // Owner dropped the link: close politely and stop
                    let _ = ws_sender.close().await;
                    return;
                }
            },
            inbound = ws_receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if events.send(LinkEvent::Frame(text)).is_err() {
                        let _ = ws_sender.close().await;
                        return;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(bytes = data.len(), "Binary frame ignored");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(LinkEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }

    let _ = events.send(LinkEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_close() {
        // Port 9 (discard) on localhost is not expected to accept WebSocket handshakes
        let mut link = WsConnector::new().open("ws://127.0.0.1:9/ws/stream/");

        let first = link.recv().await.unwrap();
        assert!(matches!(first, LinkEvent::Error(_)));
        assert_eq!(link.recv().await, Some(LinkEvent::Closed));
        assert_eq!(link.recv().await, None);
    }

    #[tokio::test]
    async fn test_secure_endpoint_attempts_tls_handshake() {
        // Accepts TCP and hangs up, so the TLS handshake itself fails
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let mut link = WsConnector::new().open(&format!("wss://127.0.0.1:{}/ws/stream/", port));

        match link.recv().await {
            Some(LinkEvent::Error(reason)) => {
                assert!(!reason.contains("TLS support not compiled in"), "{}", reason)
            }
            other => panic!("expected handshake error, got {:?}", other),
        }
        assert_eq!(link.recv().await, Some(LinkEvent::Closed));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_reports_close() {
        let mut link = WsConnector::new().open("not a url");

        assert!(matches!(link.recv().await, Some(LinkEvent::Error(_))));
        assert_eq!(link.recv().await, Some(LinkEvent::Closed));
    }
}
