//! Configuration types for the capture proxy.
//!
//! A `Config` is built once at startup and passed to constructors; nothing
//! below reads the process environment.

mod protocol;
mod upstream;

use std::collections::HashSet;
use std::path::PathBuf;

use hyper::Uri;

pub use protocol::Protocol;
pub use upstream::{
    default_connect_timeout, default_keepalive_timeout, default_pool_idle_timeout,
    default_pool_max_idle_per_host, ConnectionPoolConfig,
};

use crate::capture::DEFAULT_QUEUE_CAPACITY;

/// Listen address used when a proxy value has no `listen::` part.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:21001";

/// Separator between listen address and backend URL.
pub const ROUTE_SEPARATOR: &str = "::";

/// One listener and the backend it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub listen: String,
    pub backend: Uri,
    pub protocol: Protocol,
}

impl ProxyRoute {
    /// Parse `[listen::]target`.
    pub fn parse(value: &str) -> Result<Self, anyhow::Error> {
        let parts: Vec<&str> = value.split(ROUTE_SEPARATOR).collect();
        let (listen, target) = match parts.as_slice() {
            [target] => (DEFAULT_LISTEN_ADDR, *target),
            [listen, target] => (*listen, *target),
            _ => anyhow::bail!("Invalid proxy address: {value}"),
        };

        if listen.is_empty() {
            anyhow::bail!("Listen address is empty: {value}");
        }
        if target.is_empty() {
            anyhow::bail!("Target address is empty: {value}");
        }

        let backend: Uri = target
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid URL: {target}: {e}"))?;
        let scheme = backend
            .scheme_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid URL (missing scheme): {target}"))?;
        let protocol = Protocol::from_scheme(scheme).map_err(anyhow::Error::msg)?;
        if backend.authority().is_none() {
            anyhow::bail!("Invalid URL (missing host): {target}");
        }

        Ok(Self {
            listen: listen.to_string(),
            backend,
            protocol,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub routes: Vec<ProxyRoute>,
    pub imposters_dir: PathBuf,
    pub queue_capacity: usize,
    pub connection_pool: ConnectionPoolConfig,
}

impl Config {
    /// Build a validated configuration from raw proxy values.
    pub fn new(proxies: &[String], imposters_dir: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
        let config = Self {
            routes: parse_routes(proxies)?,
            imposters_dir: imposters_dir.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            connection_pool: ConnectionPoolConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_connection_pool(mut self, pool: ConnectionPoolConfig) -> Self {
        self.connection_pool = pool;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.routes.is_empty() {
            anyhow::bail!("No proxy addresses provided");
        }
        if self.imposters_dir.as_os_str().is_empty() {
            anyhow::bail!("imposters-dir is required");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("Queue capacity must be at least 1");
        }

        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert(route.listen.as_str()) {
                anyhow::bail!("Duplicate proxy listen address: {}", route.listen);
            }
        }
        Ok(())
    }
}

/// Parse proxy values, ignoring blanks and exact repeats.
pub fn parse_routes(values: &[String]) -> Result<Vec<ProxyRoute>, anyhow::Error> {
    let mut unique: Vec<&str> = Vec::new();
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }

    unique.into_iter().map(ProxyRoute::parse).collect()
}
