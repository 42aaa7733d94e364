//! Persisted imposter types.

use crate::capture::CapturedResponse;
use hyper::header::{CONTENT_ENCODING, DATE};
use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator for multi-valued params and headers.
pub const VALUE_SEPARATOR: &str = ", ";

/// A replayable request/response fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Imposter {
    pub request: ImposterRequest,
    pub response: ImposterResponse,
}

/// Request side of an imposter. Field order is part of the fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImposterRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImposterResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl ImposterResponse {
    /// Build the stored response, dropping `Content-Encoding` and `Date`.
    pub fn from_captured(response: &CapturedResponse) -> Self {
        Self {
            status: response.status.as_u16(),
            headers: scrubbed_headers(&response.headers),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
    }
}

fn scrubbed_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .keys()
        .filter(|name| **name != CONTENT_ENCODING && **name != DATE)
        .map(|name| {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (canonical_header_name(name.as_str()), values.join(VALUE_SEPARATOR))
        })
        .collect()
}

/// `content-type` -> `Content-Type`.
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}
