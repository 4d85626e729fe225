//! Default constants for groupline configuration
//!
//! These constants define the default values used throughout the configuration
//! system when no explicit value is provided.

/// Default coordination-service endpoint
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:2181";

/// Default coordination-service session timeout in milliseconds
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 15_000;

/// Default rebalance debounce window in milliseconds.
///
/// Intents and watch events arriving inside one window are coalesced into at
/// most one reconciliation pass.
pub const DEFAULT_REBALANCE_DELAY_MS: u64 = 250;

/// Depth of a group member's intent queue; senders block once it fills
pub const DEFAULT_INTENT_QUEUE_DEPTH: usize = 32;

/// Consecutive reconciliation failures tolerated before retries are logged
/// at error level instead of warn
pub const MAX_RECONCILE_FAILURES: u32 = 5;
