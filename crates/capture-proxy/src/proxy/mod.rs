//! Proxy server module.
//!
//! This module provides the intercepting reverse proxy:
//! - Transparent forwarding to one backend per listener
//! - Hop-by-hop header handling
//! - Capture of every completed exchange onto the capture channel
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct and accept loop
//! - `handler` - Per-request forwarding and capture
//! - `body` - Body wrappers that copy traffic for capture
//! - `forwarding` - Upstream URI rewriting and buffered forwarding
//! - `client` - HTTP client creation and configuration
//! - `headers` - Hop-by-hop and forwarding headers

mod body;
mod client;
mod forwarding;
mod handler;
mod headers;
mod response_ext;
mod server;

pub use body::{CaptureBody, PendingExchange, TeeBody, TeeBuffer};
pub use client::{create_http_client, BoxError, HttpClient, UpstreamBody};
pub use forwarding::{capture_url, error_response, upstream_uri, ForwardError};
pub use handler::{ProxyBody, ProxyHandler};
pub use headers::{append_forwarded_for, strip_hop_by_hop};
pub use response_ext::ResponseExt;
pub use server::{bind_address, serve, ProxyServer};
