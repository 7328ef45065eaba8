use super::*;

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: i64 = env_parse("__CANVAS_SYNC_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__CANVAS_SYNC_TEST_VALID__", "99") };
    let val: u32 = env_parse("__CANVAS_SYNC_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__CANVAS_SYNC_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__CANVAS_SYNC_TEST_INVALID__", "soon") };
    let val: i64 = env_parse("__CANVAS_SYNC_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__CANVAS_SYNC_TEST_INVALID__") };
}

// =============================================================================
// SyncConfig
// =============================================================================

#[test]
fn default_matches_constants() {
    let config = SyncConfig::default();
    assert_eq!(config.cadence_ms, DEFAULT_CADENCE_MS);
    assert_eq!(config.batch_delay_ms, DEFAULT_BATCH_DELAY_MS);
    assert_eq!(config.suppress_ms, DEFAULT_SUPPRESS_MS);
    assert_eq!(config.flash_ms, DEFAULT_FLASH_MS);
    assert_eq!(config.offline_retention_ms, 60_000);
    assert_eq!(config.offline_max_attempts, DEFAULT_OFFLINE_MAX_ATTEMPTS);
    assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
    assert!(config.validate().is_ok());
}

#[test]
fn validate_rejects_zero_cadence() {
    let config = SyncConfig { cadence_ms: 0, ..SyncConfig::default() };
    assert_eq!(config.validate(), Err(ConfigError::NotPositive { key: "CANVAS_SYNC_CADENCE_MS" }));
}

#[test]
fn validate_rejects_zero_retry_interval() {
    let config = SyncConfig { offline_retry_ms: 0, ..SyncConfig::default() };
    assert!(matches!(config.validate(), Err(ConfigError::NotPositive { .. })));
}

#[test]
fn validate_rejects_degenerate_canvas() {
    let config = SyncConfig { canvas_width: 0.0, ..SyncConfig::default() };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidExtent { .. })));
}
