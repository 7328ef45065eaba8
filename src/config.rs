//! Sync engine tuning knobs, loaded from environment variables.
//!
//! DESIGN
//! ======
//! Every timing constant the engine relies on is a heuristic (cadence
//! threshold, batch delay, suppression window). They live here with their
//! defaults so a deployment can retune them without touching the engine.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

pub(crate) const DEFAULT_CADENCE_MS: i64 = 50;
pub(crate) const DEFAULT_BATCH_DELAY_MS: i64 = 100;
pub(crate) const DEFAULT_SUPPRESS_MS: i64 = 500;
pub(crate) const DEFAULT_FLASH_MS: i64 = 1500;
pub(crate) const DEFAULT_OFFLINE_RETENTION_MS: i64 = 60_000;
pub(crate) const DEFAULT_OFFLINE_RETRY_MS: u64 = 5_000;
pub(crate) const DEFAULT_OFFLINE_MAX_ATTEMPTS: u32 = 5;
pub(crate) const DEFAULT_HISTORY_LIMIT: usize = 200;
pub(crate) const DEFAULT_CANVAS_WIDTH: f64 = 800.0;
pub(crate) const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be greater than zero")]
    NotPositive { key: &'static str },
    #[error("canvas extent must be positive, got {width}x{height}")]
    InvalidExtent { width: f64, height: f64 },
}

/// Timing and sizing parameters shared by the scheduler, merge engine,
/// offline queue, history log and executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Maximum gap between non-immediate writes that still counts as one burst.
    pub cadence_ms: i64,
    /// Delay between the first write of a burst and its batched commit.
    pub batch_delay_ms: i64,
    /// How long a local optimistic write shadows the remote value.
    pub suppress_ms: i64,
    /// How long a remotely edited object carries its edit highlight.
    pub flash_ms: i64,
    /// Offline queue retention ceiling.
    pub offline_retention_ms: i64,
    /// Interval of the offline retry timer while online.
    pub offline_retry_ms: u64,
    /// Send attempts before an offline entry is abandoned.
    pub offline_max_attempts: u32,
    /// Undo depth; oldest entries beyond it are discarded.
    pub history_limit: usize,
    /// Visible canvas width used to clamp layout output.
    pub canvas_width: f64,
    /// Visible canvas height used to clamp layout output.
    pub canvas_height: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cadence_ms: DEFAULT_CADENCE_MS,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            suppress_ms: DEFAULT_SUPPRESS_MS,
            flash_ms: DEFAULT_FLASH_MS,
            offline_retention_ms: DEFAULT_OFFLINE_RETENTION_MS,
            offline_retry_ms: DEFAULT_OFFLINE_RETRY_MS,
            offline_max_attempts: DEFAULT_OFFLINE_MAX_ATTEMPTS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl SyncConfig {
    /// Build the config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `CANVAS_SYNC_CADENCE_MS`: default 50
    /// - `CANVAS_SYNC_BATCH_DELAY_MS`: default 100
    /// - `CANVAS_SYNC_SUPPRESS_MS`: default 500
    /// - `CANVAS_SYNC_FLASH_MS`: default 1500
    /// - `CANVAS_SYNC_OFFLINE_RETENTION_MS`: default 60000
    /// - `CANVAS_SYNC_OFFLINE_RETRY_MS`: default 5000
    /// - `CANVAS_SYNC_OFFLINE_MAX_ATTEMPTS`: default 5
    /// - `CANVAS_SYNC_HISTORY_LIMIT`: default 200
    /// - `CANVAS_SYNC_CANVAS_WIDTH` / `CANVAS_SYNC_CANVAS_HEIGHT`: default 800x600
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a parsed value fails [`SyncConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            cadence_ms: env_parse("CANVAS_SYNC_CADENCE_MS", DEFAULT_CADENCE_MS),
            batch_delay_ms: env_parse("CANVAS_SYNC_BATCH_DELAY_MS", DEFAULT_BATCH_DELAY_MS),
            suppress_ms: env_parse("CANVAS_SYNC_SUPPRESS_MS", DEFAULT_SUPPRESS_MS),
            flash_ms: env_parse("CANVAS_SYNC_FLASH_MS", DEFAULT_FLASH_MS),
            offline_retention_ms: env_parse("CANVAS_SYNC_OFFLINE_RETENTION_MS", DEFAULT_OFFLINE_RETENTION_MS),
            offline_retry_ms: env_parse("CANVAS_SYNC_OFFLINE_RETRY_MS", DEFAULT_OFFLINE_RETRY_MS),
            offline_max_attempts: env_parse("CANVAS_SYNC_OFFLINE_MAX_ATTEMPTS", DEFAULT_OFFLINE_MAX_ATTEMPTS),
            history_limit: env_parse("CANVAS_SYNC_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            canvas_width: env_parse("CANVAS_SYNC_CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH),
            canvas_height: env_parse("CANVAS_SYNC_CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every timing knob is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotPositive`] for zero or negative timings and
    /// [`ConfigError::InvalidExtent`] for a degenerate canvas.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timings = [
            ("CANVAS_SYNC_CADENCE_MS", self.cadence_ms),
            ("CANVAS_SYNC_BATCH_DELAY_MS", self.batch_delay_ms),
            ("CANVAS_SYNC_SUPPRESS_MS", self.suppress_ms),
            ("CANVAS_SYNC_OFFLINE_RETENTION_MS", self.offline_retention_ms),
        ];
        for (key, value) in timings {
            if value <= 0 {
                return Err(ConfigError::NotPositive { key });
            }
        }
        if self.offline_retry_ms == 0 {
            return Err(ConfigError::NotPositive { key: "CANVAS_SYNC_OFFLINE_RETRY_MS" });
        }
        if self.offline_max_attempts == 0 {
            return Err(ConfigError::NotPositive { key: "CANVAS_SYNC_OFFLINE_MAX_ATTEMPTS" });
        }
        if !(self.canvas_width > 0.0 && self.canvas_height > 0.0) {
            return Err(ConfigError::InvalidExtent { width: self.canvas_width, height: self.canvas_height });
        }
        Ok(())
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
