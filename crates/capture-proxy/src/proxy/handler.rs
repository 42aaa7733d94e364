//! Intercepting request handler.
//!
//! Forwards each request to one backend, serves the backend's response
//! unchanged and emits exactly one captured exchange per successful
//! upstream round trip. Capture never changes what the client observes.

use super::body::{CaptureBody, PendingExchange, TeeBody};
use super::client::{BoxError, HttpClient, UpstreamBody};
use super::forwarding::{capture_url, forward_buffered, upstream_uri, ForwardError};
use super::headers::{append_forwarded_for, strip_hop_by_hop};
use super::response_ext::ResponseExt;
use crate::capture::CaptureSender;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper::header::HOST;
use hyper::{Request, Response, Uri};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error};

/// Body type of responses served to clients.
pub type ProxyBody = UnsyncBoxBody<Bytes, Infallible>;

/// Request handler for a single backend.
pub struct ProxyHandler {
    backend: Uri,
    http_client: HttpClient,
    sender: CaptureSender,
    upstream_timeout: Option<Duration>,
}

impl ProxyHandler {
    /// Build a handler forwarding to `backend` and capturing onto `sender`.
    pub fn new(backend: Uri, http_client: HttpClient, sender: CaptureSender) -> Self {
        Self {
            backend,
            http_client,
            sender,
            upstream_timeout: None,
        }
    }

    /// Bound the whole upstream round trip. `None` waits indefinitely.
    pub fn with_upstream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Uri {
        &self.backend
    }

    /// Handle one inbound request.
    pub async fn handle<B>(
        &self,
        req: Request<B>,
        remote_addr: SocketAddr,
    ) -> Result<Response<ProxyBody>, Infallible>
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        debug!("Received request: {} {}", parts.method, parts.uri);

        let target = match upstream_uri(&self.backend, &parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                let err = ForwardError::from(e);
                error!("{}", err);
                return Ok(err.to_response().into_proxy_body());
            }
        };

        let mut upstream_headers = parts.headers.clone();
        strip_hop_by_hop(&mut upstream_headers);
        upstream_headers.remove(HOST);
        append_forwarded_for(&mut upstream_headers, remote_addr.ip());

        let (tee, request_body) = TeeBody::new(body);
        let upstream_body: UpstreamBody = tee.map_err(Into::<BoxError>::into).boxed_unsync();
        let mut upstream_req = Request::new(upstream_body);
        *upstream_req.method_mut() = parts.method.clone();
        *upstream_req.uri_mut() = target;
        *upstream_req.headers_mut() = upstream_headers;

        // Failed upstream contact is not captured.
        let response =
            match forward_buffered(&self.http_client, upstream_req, self.upstream_timeout).await {
                Ok(response) => response,
                Err(e) => return Ok(e.to_response().into_proxy_body()),
            };

        let (mut response_parts, response_body) = response.into_parts();
        strip_hop_by_hop(&mut response_parts.headers);

        let pending = PendingExchange {
            url: capture_url(&self.backend, &parts.uri),
            method: parts.method,
            request_uri: parts.uri,
            request_headers: parts.headers,
            request_body,
            status: response_parts.status,
            response_headers: response_parts.headers.clone(),
            response_body: response_body.clone(),
        };
        let body = CaptureBody::new(response_body, pending, &self.sender);
        Ok(Response::from_parts(response_parts, body.boxed_unsync()))
    }
}
