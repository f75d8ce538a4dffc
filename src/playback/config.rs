//! Playback configuration
//!
//! Tuning for low-latency live HLS: short buffers that keep playback close
//! to the live edge, small bounded retry budgets, and a small nudge for
//! stepping over stalls.

use std::time::Duration;

/// Default backend base address for playlist retrieval
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Buffering, live-sync and retry tuning handed to every engine instance
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Prefer low-latency delivery when the stream supports it
    pub low_latency: bool,

    /// Played media retained behind the playhead
    pub back_buffer: Duration,

    /// Forward buffer target
    pub max_buffer: Duration,

    /// Forward buffer ceiling
    pub max_max_buffer: Duration,

    /// Total buffered byte budget
    pub max_buffer_size: usize,

    /// Largest gap in buffered media that is jumped over
    pub max_buffer_hole: Duration,

    /// Target distance from the live edge, in segments
    pub live_sync_segments: u32,

    /// Distance from the live edge that forces a resync, in segments
    pub live_max_latency_segments: u32,

    /// Treat live duration as unbounded
    pub live_duration_infinity: bool,

    /// Fragment load retry policy
    pub fragment_loading: LoadPolicy,

    /// Manifest load retry policy
    pub manifest_loading: LoadPolicy,

    /// Quality-level playlist load retry policy
    pub level_loading: LoadPolicy,

    /// Forward seek applied when stalled
    pub nudge_offset: Duration,

    /// Nudges attempted before a stall is reported
    pub nudge_max_retry: u32,

    /// Largest hole skipped by seeking
    pub max_seek_hole: Duration,

    /// Fetch the first fragment while the manifest is still parsing
    pub start_fragment_prefetch: bool,

    /// Run the engine's demuxer off the main loop
    pub enable_worker: bool,

    /// Verbose engine logging
    pub debug: bool,
}

/// Timeout and retry budget for one kind of load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Time allowed for one attempt
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retry: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl LoadPolicy {
    /// Create a policy
    pub const fn new(timeout: Duration, max_retry: u32, retry_delay: Duration) -> Self {
        Self {
            timeout,
            max_retry,
            retry_delay,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_latency: true,
            back_buffer: Duration::from_secs(5),
            max_buffer: Duration::from_secs(15),
            max_max_buffer: Duration::from_secs(30),
            max_buffer_size: 60 * 1000 * 1000, // 60MB
            max_buffer_hole: Duration::from_millis(500),
            live_sync_segments: 2,
            live_max_latency_segments: 4,
            live_duration_infinity: true,
            fragment_loading: LoadPolicy::new(Duration::from_secs(10), 3, Duration::from_secs(1)),
            manifest_loading: LoadPolicy::new(Duration::from_secs(5), 3, Duration::from_secs(1)),
            level_loading: LoadPolicy::new(Duration::from_secs(5), 2, Duration::from_secs(1)),
            nudge_offset: Duration::from_millis(100),
            nudge_max_retry: 3,
            max_seek_hole: Duration::from_secs(2),
            start_fragment_prefetch: true,
            enable_worker: false,
            debug: false,
        }
    }
}

impl EngineConfig {
    /// Set back-buffer retention
    pub fn back_buffer(mut self, duration: Duration) -> Self {
        self.back_buffer = duration;
        self
    }

    /// Set forward buffer target and ceiling
    ///
    /// The ceiling is raised to the target if it would be lower.
    pub fn forward_buffer(mut self, target: Duration, ceiling: Duration) -> Self {
        self.max_buffer = target;
        self.max_max_buffer = ceiling.max(target);
        self
    }

    /// Set the buffered byte budget
    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes;
        self
    }

    /// Set the live-edge sync window, in segments
    ///
    /// The resync threshold is raised to the target if it would be lower.
    pub fn live_sync(mut self, target_segments: u32, max_latency_segments: u32) -> Self {
        self.live_sync_segments = target_segments;
        self.live_max_latency_segments = max_latency_segments.max(target_segments);
        self
    }

    /// Set the fragment load policy
    pub fn fragment_loading(mut self, policy: LoadPolicy) -> Self {
        self.fragment_loading = policy;
        self
    }

    /// Set the manifest load policy
    pub fn manifest_loading(mut self, policy: LoadPolicy) -> Self {
        self.manifest_loading = policy;
        self
    }

    /// Set the level load policy
    pub fn level_loading(mut self, policy: LoadPolicy) -> Self {
        self.level_loading = policy;
        self
    }

    /// Set the stall nudge
    pub fn nudge(mut self, offset: Duration, max_retry: u32) -> Self {
        self.nudge_offset = offset;
        self.nudge_max_retry = max_retry;
        self
    }

    /// Enable verbose engine logging
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

/// Playback controller options
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Base address playlists are fetched from
    pub backend_url: String,

    /// Tuning for every engine instance
    pub engine: EngineConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            engine: EngineConfig::default(),
        }
    }
}

impl PlaybackConfig {
    /// Set the backend base address
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    /// Set the engine tuning
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}
