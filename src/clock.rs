//! Wall-clock sources for the runtime.
//!
//! The pure engine takes `now_ms` as an argument everywhere; only the async
//! runtime and the in-memory store read a clock. `TokioClock` follows tokio's
//! (pausable) time so timer-driven behaviour is deterministic under
//! `#[tokio::test(start_paused = true)]`.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Epoch-anchored clock that advances with `tokio::time`.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin_ms: i64,
    start: tokio::time::Instant,
}

impl TokioClock {
    /// Anchor tokio's current instant at `origin_ms`.
    #[must_use]
    pub fn starting_at(origin_ms: i64) -> Self {
        Self { origin_ms, start: tokio::time::Instant::now() }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        let elapsed = tokio::time::Instant::now().duration_since(self.start).as_millis();
        self.origin_ms
            .saturating_add(i64::try_from(elapsed).unwrap_or(i64::MAX))
    }
}
