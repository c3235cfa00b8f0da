//! Default constants for dapctl configuration
//!
//! Everything that is configurable has its default here.

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

/// Config file path override
pub const ENV_DAPCTL_CONFIG: &str = "DAPCTL_CONFIG";

/// dapctl home directory override
pub const ENV_DAPCTL_HOME: &str = "DAPCTL_HOME";

/// Config file looked up in the current directory
pub const DEFAULT_CONFIG_FILENAME: &str = "dapctl.toml";

// ============================================================================
// CONNECTION TIMEOUTS
// ============================================================================

/// Timeout for the `terminate` request and the `terminated` event that follows
pub const DEFAULT_TERMINATE_TIMEOUT_MS: u64 = 5000;

/// Timeout for the `disconnect` request
pub const DEFAULT_DISCONNECT_TIMEOUT_MS: u64 = 500;

/// Timeout for establishing a TCP connection to an adapter
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Delay between TCP connection attempts
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 100;

/// Upper bound for the exponential retry delay
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 2000;

/// "Connection refused" attempts before giving up early
pub const DEFAULT_MAX_CONNECTION_REFUSED_ATTEMPTS: u32 = 20;

// ============================================================================
// CHANNEL CAPACITIES
// ============================================================================

/// Buffered incoming transport frames per connection
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// TCP KEEPALIVE
// ============================================================================

/// Idle time before the first keepalive probe
pub const DEFAULT_TCP_KEEPALIVE_TIME_SECS: u64 = 30;

/// Interval between keepalive probes
pub const DEFAULT_TCP_KEEPALIVE_INTERVAL_SECS: u64 = 10;

// ============================================================================
// LOGGING
// ============================================================================

/// Days rotated log files are kept; 0 keeps them forever
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 7;

// ============================================================================
// SESSION
// ============================================================================

/// Client id sent in `initialize`
pub const DEFAULT_CLIENT_ID: &str = "dapctl";

/// Client name sent in `initialize`
pub const DEFAULT_CLIENT_NAME: &str = "dapctl";

/// Locale sent in `initialize`
pub const DEFAULT_LOCALE: &str = "en-US";

// ============================================================================
// WORKSPACE
// ============================================================================

/// Debounce for workspace-root changes before models are re-synced
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Launch file location relative to a workspace root
pub const DEFAULT_LAUNCH_FILE: &str = ".dapctl/launch.json";

/// File name of the key-value store inside the dapctl home
pub const DEFAULT_STATE_FILENAME: &str = "state.json";

/// Bound of the recently used dynamic configuration list
pub const DEFAULT_RECENT_DYNAMIC_MAX: usize = 3;
