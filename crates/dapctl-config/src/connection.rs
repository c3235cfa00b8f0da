//! Debug adapter connection configuration

use crate::constants::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_DISCONNECT_TIMEOUT_MS,
    DEFAULT_MAX_CONNECTION_REFUSED_ATTEMPTS, DEFAULT_MAX_RETRY_DELAY_MS,
    DEFAULT_RETRY_INTERVAL_MS, DEFAULT_TCP_KEEPALIVE_INTERVAL_SECS,
    DEFAULT_TCP_KEEPALIVE_TIME_SECS, DEFAULT_TERMINATE_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings shared by every debug session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Timeout applied to requests sent without an explicit one.
    /// Unset means such requests wait until answered or the channel closes.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,
    #[serde(default = "default_disconnect_timeout_ms")]
    pub disconnect_timeout_ms: u64,
    /// Incoming frame buffer per connection
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// When nothing listens on the port, fail after this many refusals
    /// instead of waiting for the full connect timeout
    #[serde(default = "default_max_connection_refused_attempts")]
    pub max_connection_refused_attempts: u32,
    #[serde(default = "default_tcp_keepalive_time_secs")]
    pub tcp_keepalive_time_secs: u64,
    #[serde(default = "default_tcp_keepalive_interval_secs")]
    pub tcp_keepalive_interval_secs: u64,
}

fn default_terminate_timeout_ms() -> u64 {
    DEFAULT_TERMINATE_TIMEOUT_MS
}

fn default_disconnect_timeout_ms() -> u64 {
    DEFAULT_DISCONNECT_TIMEOUT_MS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL_MS
}

fn default_max_retry_delay_ms() -> u64 {
    DEFAULT_MAX_RETRY_DELAY_MS
}

fn default_max_connection_refused_attempts() -> u32 {
    DEFAULT_MAX_CONNECTION_REFUSED_ATTEMPTS
}

fn default_tcp_keepalive_time_secs() -> u64 {
    DEFAULT_TCP_KEEPALIVE_TIME_SECS
}

fn default_tcp_keepalive_interval_secs() -> u64 {
    DEFAULT_TCP_KEEPALIVE_INTERVAL_SECS
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            terminate_timeout_ms: default_terminate_timeout_ms(),
            disconnect_timeout_ms: default_disconnect_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            connect_timeout_ms: default_connect_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            max_connection_refused_attempts: default_max_connection_refused_attempts(),
            tcp_keepalive_time_secs: default_tcp_keepalive_time_secs(),
            tcp_keepalive_interval_secs: default_tcp_keepalive_interval_secs(),
        }
    }
}

impl ConnectionConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }
}
