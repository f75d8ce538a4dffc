//! Headless viewer
//!
//! Connects to a stream server, mirrors its streams and drives a headless
//! playback engine for each one. Nothing is rendered; engine calls, stream
//! changes and connection state are logged.
//!
//! Run with: cargo run --example headless_viewer -- [OPTIONS]
//!
//! Examples:
//!   cargo run --example headless_viewer
//!   cargo run --example headless_viewer -- --add rtsp://10.0.0.5/live
//!   STREAMVIEW_WS_URL=ws://media.lan:8000/ws/stream/ cargo run --example headless_viewer
//!
//! Verbosity follows `RUST_LOG`, e.g. `RUST_LOG=streamview=debug`.

use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use streamview::connection::WsConnector;
use streamview::playback::HeadlessFactory;
use streamview::{ConnectionState, Viewer, ViewerCommand, ViewerConfig};

#[derive(Debug, Parser)]
#[command(name = "headless_viewer", about = "Headless live stream viewer")]
struct Args {
    /// Stream server WebSocket address
    #[arg(long, env = "STREAMVIEW_WS_URL", default_value = "ws://localhost:8000/ws/stream/")]
    ws_url: String,

    /// Backend address playlists are fetched from
    #[arg(long, env = "STREAMVIEW_BACKEND_URL", default_value = "http://localhost:8000")]
    backend_url: String,

    /// RTSP feeds to add once connected (repeatable)
    #[arg(long = "add", value_name = "RTSP_URL")]
    feeds: Vec<String>,

    /// Seconds between stream table dumps
    #[arg(long, default_value_t = 10)]
    report_every: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ViewerConfig::default()
        .ws_url(args.ws_url)
        .backend_url(args.backend_url);
    config.validate()?;

    let factory = HeadlessFactory::new().auto_ready(true);
    let mut viewer = Viewer::new(config, WsConnector::new(), factory);
    let (tx, rx) = mpsc::channel(16);

    // Queue the requested feeds as soon as the link is up
    let mut state = viewer.watch_connection();
    let feeds = args.feeds;
    let feed_tx = tx.clone();
    tokio::spawn(async move {
        if feeds.is_empty() {
            return;
        }
        while *state.borrow_and_update() != ConnectionState::Connected {
            if state.changed().await.is_err() {
                return;
            }
        }
        for feed in feeds {
            if feed_tx.send(ViewerCommand::AddStream(feed)).await.is_err() {
                return;
            }
        }
        let _ = feed_tx.send(ViewerCommand::ListStreams).await;
    });

    // Periodic stream table
    let registry = viewer.registry().clone();
    let period = Duration::from_secs(args.report_every.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let streams = registry.list_all().await;
            println!("{} stream(s)", streams.len());
            for record in streams {
                println!(
                    "  {:<24} {:<10} chunks={:<2} bytes={:<8} playing={} {}",
                    record.id,
                    record.status,
                    record.chunks.len(),
                    record.chunks.size(),
                    record.playing,
                    record.title,
                );
            }
        }
    });

    // Ctrl-C stops the viewer
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Shutting down...");
            let _ = tx.send(ViewerCommand::Shutdown).await;
        }
    });

    println!("Viewer connecting to {}", viewer.config().ws_url);
    viewer.run(rx).await;

    Ok(())
}
