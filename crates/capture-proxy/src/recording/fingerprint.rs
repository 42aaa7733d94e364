//! Canonical request identity used to deduplicate imposters.
//!
//! Identity is method + path + query. Headers never take part.

use super::types::{ImposterRequest, VALUE_SEPARATOR};
use crate::capture::CapturedExchange;

impl ImposterRequest {
    /// Build the stored request from a captured exchange.
    pub fn from_exchange(exchange: &CapturedExchange) -> Self {
        let path = exchange.url.path();
        let endpoint = match urlencoding::decode(path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => path.to_string(),
        };

        Self {
            method: exchange.request.method.as_str().to_uppercase(),
            endpoint,
            params: exchange
                .request
                .query
                .iter()
                .map(|(name, values)| (name.clone(), values.join(VALUE_SEPARATOR)))
                .collect(),
        }
    }

    /// Deterministic serialization; equal fingerprints mean duplicate requests.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
