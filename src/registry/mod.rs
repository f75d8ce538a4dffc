//! Stream registry
//!
//! The registry is the table of live feeds known to this viewer. The message
//! router is its only writer; the playback controller and UI read snapshots.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<StreamRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ streams: HashMap<StreamId,   │
//!                 │   Arc<StreamRecord> {        │
//!                 │     status, chunks (≤ 10),   │
//!                 │   }                          │
//!                 │ >                            │
//!                 │ events: broadcast::Tx        │
//!                 └──────────────┬───────────────┘
//!                                │
//!         ┌──────────────────────┼──────────────────────┐
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//!   [MessageRouter]     [PlaybackController]          [UI]
//!   create/append/...   events.recv() + get()     list_all()
//! ```
//!
//! # Atomic Replacement
//!
//! Records are never mutated in place. Every operation builds a complete new
//! `StreamRecord` and swaps the `Arc` under the write lock, so a reader that
//! holds a snapshot never observes a half-applied change. Chunks are
//! `bytes::Bytes`, so copying a record's buffer only bumps reference counts.

pub mod buffer;
pub mod config;
pub mod entry;
pub mod event;
pub mod store;

pub use buffer::ChunkBuffer;
pub use config::RegistryConfig;
pub use entry::{StreamId, StreamRecord, StreamStatus};
pub use event::RegistryEvent;
pub use store::StreamRegistry;
