//! Request forwarding to the backend.
//!
//! This module rewrites inbound URIs onto the backend, performs the
//! upstream call and maps failures to gateway error responses.

use super::client::{HttpClient, UpstreamBody};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::http::uri::PathAndQuery;
use hyper::{Request, Response, StatusCode, Uri};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Failure to obtain a complete response from the backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream URI: {0}")]
    Uri(#[from] hyper::http::Error),
    #[error("failed to forward request to upstream: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read upstream response body: {0}")]
    Body(#[from] hyper::Error),
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Gateway error response shown to the client.
    pub fn to_response(&self) -> Response<Full<Bytes>> {
        let status = self.status();
        error_response(status, status.canonical_reason().unwrap_or("Bad Gateway"))
    }
}

/// Helper function to create an error response.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Join two URL paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Map an inbound URI onto the backend.
///
/// The inbound path is appended to the backend's base path and the two
/// query strings are concatenated.
pub fn upstream_uri(backend: &Uri, inbound: &Uri) -> Result<Uri, hyper::http::Error> {
    let path = join_paths(backend.path(), inbound.path());
    let query = match (backend.query().unwrap_or(""), inbound.query().unwrap_or("")) {
        ("", "") => String::new(),
        (base, "") => format!("?{base}"),
        ("", own) => format!("?{own}"),
        (base, own) => format!("?{base}&{own}"),
    };

    let mut builder = Uri::builder();
    if let Some(scheme) = backend.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = backend.authority() {
        builder = builder.authority(authority.clone());
    }
    builder.path_and_query(format!("{path}{query}")).build()
}

/// URL recorded for a captured exchange: backend scheme and authority, the
/// inbound path and query untouched.
pub fn capture_url(backend: &Uri, inbound: &Uri) -> Uri {
    let mut parts = inbound.clone().into_parts();
    parts.scheme = backend.scheme().cloned();
    parts.authority = backend.authority().cloned();
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    Uri::from_parts(parts).unwrap_or_else(|_| inbound.clone())
}

/// Send `request` upstream and buffer the full response.
pub async fn forward_buffered(
    http_client: &HttpClient,
    request: Request<UpstreamBody>,
    timeout: Option<Duration>,
) -> Result<Response<Bytes>, ForwardError> {
    debug!("Forwarding to: {}", request.uri());

    let exchange = async {
        let response: Response<Incoming> = http_client.request(request).await?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok::<_, ForwardError>(Response::from_parts(parts, body))
    };

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .unwrap_or(Err(ForwardError::Timeout(limit))),
        None => exchange.await,
    };

    if let Err(ref e) = result {
        error!("{}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_error_response_basic() {
        let response = error_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
        assert_eq!(response.status(), 502);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_forward_error_status() {
        assert_eq!(
            ForwardError::Timeout(Duration::from_secs(1)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ForwardError::Timeout(Duration::from_secs(1))
                .to_response()
                .status(),
            504
        );
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/v1/items"), "/v1/items");
        assert_eq!(join_paths("/api", "/v1"), "/api/v1");
        assert_eq!(join_paths("/api/", "/v1"), "/api/v1");
        assert_eq!(join_paths("/api", "v1"), "/api/v1");
    }

    #[test]
    fn test_upstream_uri_plain_backend() {
        let out = upstream_uri(&uri("http://api:8080"), &uri("/v1/items?id=1")).unwrap();
        assert_eq!(out, uri("http://api:8080/v1/items?id=1"));
    }

    #[test]
    fn test_upstream_uri_joins_base_path_and_query() {
        let backend = uri("https://api.example.com/base?key=abc");
        assert_eq!(
            upstream_uri(&backend, &uri("/v1?id=1")).unwrap(),
            uri("https://api.example.com/base/v1?key=abc&id=1")
        );
        assert_eq!(
            upstream_uri(&backend, &uri("/v1")).unwrap(),
            uri("https://api.example.com/base/v1?key=abc")
        );
    }

    #[test]
    fn test_capture_url_keeps_inbound_path() {
        let backend = uri("http://api:8080/base");
        let inbound = uri("http://127.0.0.1:21001/v1/items?id=1");
        assert_eq!(
            capture_url(&backend, &inbound),
            uri("http://api:8080/v1/items?id=1")
        );
    }

    #[test]
    fn test_capture_url_origin_form() {
        let out = capture_url(&uri("http://api:8080"), &uri("/health"));
        assert_eq!(out.authority().unwrap().as_str(), "api:8080");
        assert_eq!(out.path(), "/health");
    }
}
