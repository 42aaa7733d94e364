//! Captured traffic and the channel that carries it off the request path.
//!
//! An exchange is produced by the proxy once per forwarded request and is
//! consumed exactly once by the exchange recorder.
//!
//! # Module Structure
//!
//! - `channel` - Bounded multi-producer / single-consumer capture queue
//! - `decode` - Response body decompression (gzip, br)

mod channel;
mod decode;

pub use channel::{capture_channel, CaptureReceiver, CaptureSender, DEFAULT_QUEUE_CAPACITY};
pub use decode::{
    decode_body, decode_body_limited, decoded_or_raw, ContentCoding, DecodeError, MAX_DECODED_BODY,
};

use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode, Uri};
use std::collections::BTreeMap;

/// Query parameters keyed by name, values in order of appearance.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// One observed request/response pair.
#[derive(Debug, Clone)]
pub struct CapturedExchange {
    /// Inbound URL with scheme and authority rewritten to the backend's.
    pub url: Uri,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
}

/// Copy of the inbound request as the client sent it.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Copy of the backend response, body already decompressed.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedRequest {
    /// Build a request copy from its URI parts.
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(parse_query).unwrap_or_default(),
            headers,
            body,
        }
    }
}

/// Parse a raw query string with form-urlencoded rules.
///
/// `+` decodes to a space, a key without `=` gets an empty value and
/// repeated keys keep their order of appearance.
pub fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
