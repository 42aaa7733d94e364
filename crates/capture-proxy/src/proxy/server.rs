//! ProxyServer struct and accept loop.
//!
//! One ProxyServer runs per configured route. Each accepted connection is
//! served on its own task with HTTP/1.1 keep-alive.

use super::client::HttpClient;
use super::handler::ProxyHandler;
use crate::capture::CaptureSender;
use crate::config::{Protocol, ProxyRoute};
use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Listener bound to one route.
pub struct ProxyServer {
    listen: String,
    protocol: Protocol,
    handler: ProxyHandler,
}

impl ProxyServer {
    /// Create a server for `route` sharing `http_client` and `sender` with
    /// every other route.
    pub fn new(route: &ProxyRoute, http_client: HttpClient, sender: CaptureSender) -> Self {
        Self {
            listen: route.listen.clone(),
            protocol: route.protocol,
            handler: ProxyHandler::new(route.backend.clone(), http_client, sender),
        }
    }

    /// Apply an upstream round trip limit to every request.
    pub fn with_upstream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler = self.handler.with_upstream_timeout(timeout);
        self
    }

    /// Protocol spoken to the backend.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Bind the listen address and serve until the listener fails.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = bind_address(&self.listen);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind listener on {addr}"))?;

        info!("Listening on http://{}", listener.local_addr()?);
        info!(
            "Proxying to {} over {}",
            self.handler.backend(),
            self.protocol.as_str()
        );

        serve(listener, Arc::new(self.handler)).await;
        Ok(())
    }
}

/// Listen addresses of the form `:port` bind every interface.
pub fn bind_address(listen: &str) -> String {
    if listen.starts_with(':') {
        format!("0.0.0.0{listen}")
    } else {
        listen.to_string()
    }
}

/// Accept connections on `listener` forever, serving each with `handler`.
pub async fn serve(listener: TcpListener, handler: Arc<ProxyHandler>) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                error!("Failed to accept connection: {}", err);
                continue;
            }
        };
        let handler = Arc::clone(&handler);

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let handler = Arc::clone(&handler);
                async move { handler.handle(req, remote_addr).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!(
                    "Error serving HTTP connection from {}: {}",
                    remote_addr, err
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::capture_channel;
    use crate::config::ConnectionPoolConfig;
    use crate::proxy::create_http_client;

    #[test]
    fn test_bind_address_port_only() {
        assert_eq!(bind_address(":21001"), "0.0.0.0:21001");
    }

    #[test]
    fn test_bind_address_explicit_host() {
        assert_eq!(bind_address("127.0.0.1:8080"), "127.0.0.1:8080");
        assert_eq!(bind_address("0.0.0.0:21001"), "0.0.0.0:21001");
    }

    #[tokio::test]
    async fn test_server_takes_protocol_from_route() {
        let (sender, _receiver) = capture_channel(1);
        let client = create_http_client(&ConnectionPoolConfig::default());

        let https = ProxyRoute::parse(":9443::https://api.example.com").unwrap();
        let server = ProxyServer::new(&https, client.clone(), sender.clone());
        assert_eq!(server.protocol(), Protocol::Https);
        assert_eq!(server.protocol().as_str(), "https");

        let http = ProxyRoute::parse("http://api:8080").unwrap();
        let server = ProxyServer::new(&http, client, sender);
        assert_eq!(server.protocol(), Protocol::Http);
    }
}
