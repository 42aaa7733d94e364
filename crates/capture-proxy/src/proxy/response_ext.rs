//! Response extension traits for common transformations.

use super::handler::ProxyBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;

/// Extension trait for `Response<Full<Bytes>>` providing common transformations.
pub trait ResponseExt {
    /// Convert the response body into the body type served by the proxy.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use crate::proxy::response_ext::ResponseExt;
    ///
    /// let response = Response::new(Full::new(Bytes::from("hello")));
    /// let served = response.into_proxy_body();
    /// ```
    fn into_proxy_body(self) -> Response<ProxyBody>;
}

impl ResponseExt for Response<Full<Bytes>> {
    fn into_proxy_body(self) -> Response<ProxyBody> {
        self.map(|b| b.boxed_unsync())
    }
}
