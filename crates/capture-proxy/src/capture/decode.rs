//! Response body decompression for captured exchanges.
//!
//! Only the capture copy is decoded; the client always receives the
//! backend's bytes untouched.

use bytes::Bytes;
use hyper::header::CONTENT_ENCODING;
use hyper::HeaderMap;
use std::io::Read;
use thiserror::Error;
use tracing::warn;

/// Brotli decoder buffer size.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Largest decoded body kept in a capture.
pub const MAX_DECODED_BODY: usize = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("gzip decode failed: {0}")]
    Gzip(#[source] std::io::Error),
    #[error("brotli decode failed: {0}")]
    Brotli(#[source] std::io::Error),
    #[error("decoded body exceeds {0} bytes")]
    TooLarge(usize),
}

/// Content coding of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Gzip,
    Brotli,
    /// Absent or any coding we do not decode.
    Identity,
}

impl ContentCoding {
    /// Read the coding from the first `Content-Encoding` value.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let Some(value) = headers.get(CONTENT_ENCODING).and_then(|v| v.to_str().ok()) else {
            return ContentCoding::Identity;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" => ContentCoding::Gzip,
            "br" => ContentCoding::Brotli,
            _ => ContentCoding::Identity,
        }
    }
}

/// Decode `body` according to `coding`, up to [`MAX_DECODED_BODY`] bytes.
pub fn decode_body(coding: ContentCoding, body: &[u8]) -> Result<Bytes, DecodeError> {
    decode_body_limited(coding, body, MAX_DECODED_BODY)
}

/// Decode `body`, failing once the output would exceed `limit` bytes.
pub fn decode_body_limited(
    coding: ContentCoding,
    body: &[u8],
    limit: usize,
) -> Result<Bytes, DecodeError> {
    let mut decoded = Vec::new();
    // One byte past the limit tells a full body apart from a truncated one.
    let cap = limit as u64 + 1;
    match coding {
        ContentCoding::Gzip => {
            flate2::read::GzDecoder::new(body)
                .take(cap)
                .read_to_end(&mut decoded)
                .map_err(DecodeError::Gzip)?;
        }
        ContentCoding::Brotli => {
            brotli::Decompressor::new(body, BROTLI_BUFFER_SIZE)
                .take(cap)
                .read_to_end(&mut decoded)
                .map_err(DecodeError::Brotli)?;
        }
        ContentCoding::Identity => return Ok(Bytes::copy_from_slice(body)),
    }
    if decoded.len() > limit {
        return Err(DecodeError::TooLarge(limit));
    }
    Ok(Bytes::from(decoded))
}

/// Decode a captured body, keeping the raw bytes when decoding fails.
pub fn decoded_or_raw(headers: &HeaderMap, body: Bytes) -> Bytes {
    let coding = ContentCoding::from_headers(headers);
    if coding == ContentCoding::Identity {
        return body;
    }
    match decode_body(coding, &body) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("Capturing raw response body: {}", e);
            body
        }
    }
}
