//! capture-proxy - record HTTP traffic as imposter fixtures
//!
//! # Usage
//!
//! ```bash
//! # Forward 0.0.0.0:21001 to a backend, recording into ./imposters
//! capture-proxy --proxy http://api:8080 --imposters-dir ./imposters
//!
//! # Several listeners, configured from the environment
//! PROXY_ADDR=":9001::http://a:80,:9002::https://b.example.com" \
//! IMPOSTERS_DIR=./imposters capture-proxy
//! ```

use anyhow::Context;
use capture_proxy::capture::DEFAULT_QUEUE_CAPACITY;
use capture_proxy::config::{
    default_connect_timeout, default_keepalive_timeout, default_pool_idle_timeout,
    default_pool_max_idle_per_host, Config, ConnectionPoolConfig,
};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "capture-proxy")]
#[command(
    author,
    version,
    about = "Transparent HTTP proxy that records traffic as imposter fixtures"
)]
struct Args {
    /// Proxy definition `[LISTEN::]TARGET`, repeatable
    #[arg(long = "proxy", env = "PROXY_ADDR", value_delimiter = ',', required = true)]
    proxies: Vec<String>,

    /// Directory that receives the imposter fixtures
    #[arg(long, env = "IMPOSTERS_DIR")]
    imposters_dir: PathBuf,

    /// Number of captured exchanges buffered before requests wait
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Deadline in seconds for a whole backend round trip
    #[arg(long)]
    upstream_timeout_secs: Option<u64>,

    /// Backend connect timeout in seconds
    #[arg(long, default_value_t = default_connect_timeout())]
    connect_timeout_secs: u64,

    /// Seconds an idle pooled backend connection is kept
    #[arg(long, default_value_t = default_pool_idle_timeout())]
    idle_timeout_secs: u64,

    /// TCP keepalive interval in seconds for backend connections
    #[arg(long, default_value_t = default_keepalive_timeout())]
    keepalive_timeout_secs: u64,

    /// Maximum idle pooled connections per backend host
    #[arg(long, default_value_t = default_pool_max_idle_per_host())]
    max_idle_per_host: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = ConnectionPoolConfig {
        max_idle_per_host: args.max_idle_per_host,
        idle_timeout_secs: args.idle_timeout_secs,
        keepalive_timeout_secs: args.keepalive_timeout_secs,
        connect_timeout_secs: args.connect_timeout_secs,
        upstream_timeout_secs: args.upstream_timeout_secs,
    };
    let config = Config::new(&args.proxies, args.imposters_dir)?
        .with_queue_capacity(args.queue_capacity)
        .with_connection_pool(pool);
    config.validate()?;

    capture_proxy::app::run(config).await
}
