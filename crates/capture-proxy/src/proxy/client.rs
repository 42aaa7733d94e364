//! HTTP client creation and configuration.
//!
//! One pooled client is shared by every listener. Backends may be plain
//! HTTP or HTTPS.

use crate::config::ConnectionPoolConfig;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::{info, warn};

/// Error type carried by forwarded request bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body type of requests sent upstream.
pub type UpstreamBody = UnsyncBoxBody<Bytes, BoxError>;

/// Type alias for the HTTP client used by the proxy.
pub type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, UpstreamBody>;

/// Create a shared HTTP client with connection pooling.
pub fn create_http_client(pool: &ConnectionPoolConfig) -> HttpClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let builder = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            warn!("No native root certificates loaded, HTTPS backends will fail: {}", e);
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(
                rustls::ClientConfig::builder()
                    .with_root_certificates(rustls::RootCertStore::empty())
                    .with_no_client_auth(),
            )
        }
    };
    let https_connector = builder
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build(https_connector);

    info!(
        "Connection pool configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
        pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs
    );

    http_client
}
