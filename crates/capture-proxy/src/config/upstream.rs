//! Backend connection settings.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPoolConfig {
    pub max_idle_per_host: usize,
    pub idle_timeout_secs: u64,
    pub keepalive_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Whole-request deadline for the backend. `None` waits forever.
    pub upstream_timeout_secs: Option<u64>,
}

impl ConnectionPoolConfig {
    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_pool_max_idle_per_host(),
            idle_timeout_secs: default_pool_idle_timeout(),
            keepalive_timeout_secs: default_keepalive_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            upstream_timeout_secs: None,
        }
    }
}

pub fn default_pool_max_idle_per_host() -> usize {
    100
}

pub fn default_pool_idle_timeout() -> u64 {
    90
}

pub fn default_keepalive_timeout() -> u64 {
    60
}

pub fn default_connect_timeout() -> u64 {
    5
}
