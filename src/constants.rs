//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// SERVER DEFAULTS
// =============================================================================

/// Default server host address
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_SERVER_PORT: u16 = 8080;

// =============================================================================
// DATABASE DEFAULTS
// =============================================================================

/// Default maximum database connections in the pool
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

// =============================================================================
// EVALUATION DEFAULTS
// =============================================================================

/// Default per-rule evaluation timeout in milliseconds
pub const DEFAULT_EVALUATION_TIMEOUT_MS: u64 = 250;

/// Default cap on the compiled-workflow cache
pub const DEFAULT_WORKFLOW_CACHE_CAP: usize = 256;

// =============================================================================
// CACHE DEFAULTS
// =============================================================================

/// Default expiry for warmed cache keys, in seconds (one day)
pub const DEFAULT_KEY_EXPIRY_SECS: u64 = 86_400;

// =============================================================================
// OUTBOX DEFAULTS
// =============================================================================

/// Default sweep interval for the outbox worker, in seconds
pub const DEFAULT_OUTBOX_SWEEP_INTERVAL_SECS: u64 = 5;

/// Default number of outbox messages drained per sweep
pub const DEFAULT_OUTBOX_BATCH_SIZE: i64 = 50;

/// Default downstream stream name for outbox messages
pub const DEFAULT_OUTBOX_STREAM: &str = "promo.events";

/// Ceiling for the sweeper's exponential backoff, in seconds
pub const OUTBOX_MAX_BACKOFF_SECS: u64 = 300;

// =============================================================================
// GRANTS
// =============================================================================

/// Unit recorded on placeholder grant values; the real value is computed by
/// downstream consumers of the outbox.
pub const DEFAULT_GRANT_UNIT: &str = "EUR";

// =============================================================================
// REWARD KINDS
// =============================================================================

/// Reward kind identifiers
pub mod reward_kinds {
    pub const COUPON: &str = "coupon";
    pub const POINTS: &str = "points";
    pub const GIFT: &str = "gift";
    pub const CASHBACK: &str = "cashback";

    /// All supported reward kinds
    pub const ALL: &[&str] = &[COUPON, POINTS, GIFT, CASHBACK];
}

// =============================================================================
// GRANT STATUSES
// =============================================================================

/// Contact-reward status identifiers
pub mod grant_statuses {
    pub const PENDING: &str = "pending";
    pub const GRANTED: &str = "granted";
    pub const REJECTED: &str = "rejected";

    /// All grant statuses
    pub const ALL: &[&str] = &[PENDING, GRANTED, REJECTED];
}

// =============================================================================
// CATALOG DATA TYPES
// =============================================================================

/// Attribute data-type identifiers
pub mod data_types {
    pub const STRING: &str = "string";
    pub const NUMBER: &str = "number";
    pub const DATE: &str = "date";
    pub const BOOL: &str = "bool";
    pub const GUID: &str = "guid";
    pub const STRING_ARRAY: &str = "string_array";
    pub const NUMBER_ARRAY: &str = "number_array";

    /// All attribute data types
    pub const ALL: &[&str] = &[STRING, NUMBER, DATE, BOOL, GUID, STRING_ARRAY, NUMBER_ARRAY];
}

// =============================================================================
// OPERATOR CODES
// =============================================================================

/// Operator codes the compiler understands
pub mod operators {
    pub const GT: &str = "gt";
    pub const GTE: &str = "gte";
    pub const LT: &str = "lt";
    pub const LTE: &str = "lte";
    pub const EQ: &str = "eq";
    pub const NEQ: &str = "neq";
    pub const CONTAINS: &str = "contains";
    pub const IN: &str = "in";
}

// =============================================================================
// OUTBOX MESSAGE TYPES
// =============================================================================

/// Outbox message type identifiers
pub mod outbox_types {
    pub const PROMOTION_PUBLISHED: &str = "promotion.published";
    pub const REWARDS_GRANTED: &str = "promotion.rewards.granted";
}

// =============================================================================
// API VERSIONING
// =============================================================================

/// API base path
pub const API_BASE_PATH: &str = "/api";

// =============================================================================
// RATE LIMITING
// =============================================================================

/// Rate limiting configuration
pub mod rate_limits {
    /// Authoring endpoints - max requests
    pub const AUTHORING_MAX_REQUESTS: i64 = 30;
    /// Authoring endpoints - window in seconds
    pub const AUTHORING_WINDOW_SECS: i64 = 60;

    /// Runtime evaluate endpoint - max requests
    pub const RUNTIME_MAX_REQUESTS: i64 = 600;
    /// Runtime evaluate endpoint - window in seconds
    pub const RUNTIME_WINDOW_SECS: i64 = 60;

    /// General API - max requests
    pub const GENERAL_MAX_REQUESTS: i64 = 100;
    /// General API - window in seconds
    pub const GENERAL_WINDOW_SECS: i64 = 60;
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Maximum promotion name length
pub const MAX_PROMOTION_NAME_LENGTH: u64 = 256;

/// Maximum number of tiers a draft may carry
pub const MAX_TIERS_PER_PROMOTION: usize = 32;

/// Maximum number of groups per tier
pub const MAX_GROUPS_PER_TIER: usize = 64;

/// Maximum cooldown in days
pub const MAX_COOLDOWN_DAYS: i32 = 3650;
