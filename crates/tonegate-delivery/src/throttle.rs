//! Delivery pacing.
//!
//! Mode is decided once when a stream starts and never changes
//! mid-stream. Throttling inserts a fixed inter-chunk delay; a
//! configured hard cap replaces that delay entirely, backing off only
//! while the observed rate exceeds the cap.

use std::time::Duration;

/// Backoff applied when a stream exceeds the hard bandwidth cap.
pub const HARD_CAP_BACKOFF: Duration = Duration::from_millis(20);

/// Tunable delivery parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Bytes per chunk.
    pub chunk_size: usize,
    /// Inter-chunk delay under normal load.
    pub normal_delay: Duration,
    /// Inter-chunk delay when the server is busy.
    pub throttled_delay: Duration,
    /// Hard per-stream bandwidth cap in KiB/s. Zero disables the cap.
    pub hard_cap_kbps: u32,
    /// Stream starts per window above which delivery throttles.
    pub global_threshold: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            normal_delay: Duration::ZERO,
            throttled_delay: Duration::from_millis(35),
            hard_cap_kbps: 0,
            global_threshold: 10,
        }
    }
}

impl DeliveryConfig {
    /// Picks the mode for a stream given the current load figure.
    #[must_use]
    pub fn mode_for(&self, active_streams: usize) -> DeliveryMode {
        if active_streams > self.global_threshold {
            DeliveryMode::Throttled
        } else {
            DeliveryMode::Normal
        }
    }
}

/// Delivery mode, fixed for the lifetime of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Full speed, subject only to the hard cap.
    Normal,
    /// Fixed inter-chunk delay to shed load.
    Throttled,
}

impl DeliveryMode {
    /// Wire name, as reported in the `X-Download-Mode` header.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Normal => "normal",
            DeliveryMode::Throttled => "throttled",
        }
    }
}

/// Per-stream pacing state.
///
/// Pure over (bytes sent, elapsed), so tests drive it with a simulated
/// clock instead of sleeping.
#[derive(Debug)]
pub struct Pacer {
    chunk_delay: Duration,
    hard_cap_bytes_per_sec: Option<u64>,
    bytes_sent: u64,
}

impl Pacer {
    /// Creates a pacer for one stream in the given mode.
    #[must_use]
    pub fn new(config: &DeliveryConfig, mode: DeliveryMode) -> Self {
        let chunk_delay = match mode {
            DeliveryMode::Normal => config.normal_delay,
            DeliveryMode::Throttled => config.throttled_delay,
        };
        let hard_cap_bytes_per_sec = match config.hard_cap_kbps {
            0 => None,
            kbps => Some(u64::from(kbps) * 1024),
        };
        Self {
            chunk_delay,
            hard_cap_bytes_per_sec,
            bytes_sent: 0,
        }
    }

    /// Accounts for a chunk that was just sent.
    pub fn record(&mut self, chunk_len: usize) {
        self.bytes_sent += chunk_len as u64;
    }

    /// Total bytes accounted so far.
    #[must_use]
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Delay to sleep before the next chunk, given elapsed stream time.
    ///
    /// A configured cap overrides the mode delay: streams under the
    /// target rate run unimpeded, streams over it back off.
    #[must_use]
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        if let Some(cap) = self.hard_cap_bytes_per_sec {
            let allowed = (cap as f64 * elapsed.as_secs_f64()) as u64;
            return if self.bytes_sent > allowed {
                HARD_CAP_BACKOFF
            } else {
                Duration::ZERO
            };
        }
        self.chunk_delay
    }
}
