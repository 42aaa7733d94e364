//! Body wrappers that copy traffic for capture.
//!
//! - [`TeeBody`] streams the inbound request body upstream while copying
//!   every data frame into a side buffer.
//! - [`CaptureBody`] serves the buffered backend response to the client and
//!   hands the captured exchange to the capture channel once the body has
//!   been written.

use crate::capture::{
    decoded_or_raw, CaptureSender, CapturedExchange, CapturedRequest, CapturedResponse,
};
use bytes::{Bytes, BytesMut};
use hyper::body::{Body, Frame, SizeHint};
use hyper::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio_util::sync::PollSender;
use tracing::{debug, warn};

/// Side buffer filled by a [`TeeBody`].
#[derive(Debug, Clone, Default)]
pub struct TeeBuffer(Arc<Mutex<BytesMut>>);

impl TeeBuffer {
    /// Everything copied so far.
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0.lock())
    }
}

/// Request body that records every data frame it yields.
pub struct TeeBody<B> {
    inner: B,
    buffer: TeeBuffer,
}

impl<B> TeeBody<B> {
    pub fn new(inner: B) -> (Self, TeeBuffer) {
        let buffer = TeeBuffer::default();
        (
            Self {
                inner,
                buffer: buffer.clone(),
            },
            buffer,
        )
    }
}

impl<B> Body for TeeBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, B::Error>>> {
        let this = self.get_mut();
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        if let Some(Ok(ref frame)) = frame {
            if let Some(data) = frame.data_ref() {
                this.buffer.0.lock().extend_from_slice(data);
            }
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Everything needed to build a [`CapturedExchange`] once the client has
/// been served.
///
/// Decompression and the request body snapshot are deferred to
/// [`PendingExchange::into_exchange`].
pub struct PendingExchange {
    pub url: Uri,
    pub method: Method,
    pub request_uri: Uri,
    pub request_headers: HeaderMap,
    pub request_body: TeeBuffer,
    pub status: StatusCode,
    pub response_headers: HeaderMap,
    pub response_body: Bytes,
}

impl PendingExchange {
    pub fn into_exchange(self) -> CapturedExchange {
        let body = decoded_or_raw(&self.response_headers, self.response_body);
        CapturedExchange {
            url: self.url,
            request: CapturedRequest::new(
                self.method,
                &self.request_uri,
                self.request_headers,
                self.request_body.snapshot(),
            ),
            response: CapturedResponse {
                status: self.status,
                headers: self.response_headers,
                body,
            },
        }
    }
}

/// Buffered response body that emits its exchange after being written.
///
/// A queue slot is reserved before the data frame is yielded, so a full
/// queue holds the response back. The exchange itself is sent when the
/// connection drops the body, which happens right after the last byte has
/// been written. If the body is dropped before a slot was reserved (bodiless
/// responses, client disconnects) the exchange is handed to a background
/// task that waits for capacity.
pub struct CaptureBody {
    data: Option<Bytes>,
    pending: Option<PendingExchange>,
    sender: PollSender<CapturedExchange>,
    reserved: bool,
}

impl CaptureBody {
    pub fn new(data: Bytes, pending: PendingExchange, sender: &CaptureSender) -> Self {
        Self {
            data: Some(data).filter(|d| !d.is_empty()),
            pending: Some(pending),
            sender: sender.poll_sender(),
            reserved: false,
        }
    }

    fn emit(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let exchange = pending.into_exchange();
        debug!("Capturing {} {}", exchange.request.method, exchange.url);

        if self.reserved {
            if self.sender.send_item(exchange).is_err() {
                debug!("Capture channel closed, exchange discarded");
            }
            return;
        }

        let Some(tx) = self.sender.get_ref().cloned() else {
            debug!("Capture channel closed, exchange discarded");
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if tx.send(exchange).await.is_err() {
                        debug!("Capture channel closed, exchange discarded");
                    }
                });
            }
            Err(_) => warn!("No runtime available, capture of {} dropped", exchange.url),
        }
    }
}

impl Body for CaptureBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let this = self.get_mut();

        if this.pending.is_some() && !this.reserved {
            match ready!(this.sender.poll_reserve(cx)) {
                Ok(()) => this.reserved = true,
                Err(_) => {
                    debug!("Capture channel closed, exchange discarded");
                    this.pending = None;
                }
            }
        }

        if let Some(data) = this.data.take() {
            return Poll::Ready(Some(Ok(Frame::data(data))));
        }

        this.emit();
        Poll::Ready(None)
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_none() && self.pending.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.data.as_ref().map_or(0, |d| d.len() as u64))
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        self.emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::capture_channel;
    use http_body_util::{BodyExt, Full};
    use hyper::header::{HeaderValue, CONTENT_ENCODING};
    use std::io::Write;
    use std::time::Duration;

    fn pending(response_headers: HeaderMap, response_body: Bytes) -> PendingExchange {
        PendingExchange {
            url: "http://api:8080/v1/items?id=1".parse().unwrap(),
            method: Method::GET,
            request_uri: "/v1/items?id=1".parse().unwrap(),
            request_headers: HeaderMap::new(),
            request_body: TeeBuffer::default(),
            status: StatusCode::OK,
            response_headers,
            response_body,
        }
    }

    #[tokio::test]
    async fn test_tee_body_copies_frames() {
        let (tee, buffer) = TeeBody::new(Full::new(Bytes::from_static(b"request payload")));
        let forwarded = tee.collect().await.unwrap().to_bytes();
        assert_eq!(forwarded, Bytes::from_static(b"request payload"));
        assert_eq!(buffer.snapshot(), Bytes::from_static(b"request payload"));
    }

    #[tokio::test]
    async fn test_capture_body_emits_after_data() {
        let (tx, mut rx) = capture_channel(1);
        let body = CaptureBody::new(
            Bytes::from_static(b"hello"),
            pending(HeaderMap::new(), Bytes::from_static(b"hello")),
            &tx,
        );

        let served = body.collect().await.unwrap().to_bytes();
        assert_eq!(served, Bytes::from_static(b"hello"));

        let exchange = rx.recv().await.unwrap();
        assert_eq!(exchange.response.body, Bytes::from_static(b"hello"));
        assert_eq!(exchange.request.query["id"], vec!["1"]);
    }

    #[tokio::test]
    async fn test_client_sees_compressed_capture_sees_plain() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello").unwrap();
        let gz = Bytes::from(encoder.finish().unwrap());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        let (tx, mut rx) = capture_channel(1);
        let body = CaptureBody::new(gz.clone(), pending(headers, gz.clone()), &tx);
        assert_eq!(body.collect().await.unwrap().to_bytes(), gz);

        let exchange = rx.recv().await.unwrap();
        assert_eq!(exchange.response.body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_full_queue_holds_body_back() {
        let (tx, mut rx) = capture_channel(1);
        let first = CaptureBody::new(
            Bytes::from_static(b"one"),
            pending(HeaderMap::new(), Bytes::from_static(b"one")),
            &tx,
        );
        first.collect().await.unwrap();

        let second = CaptureBody::new(
            Bytes::from_static(b"two"),
            pending(HeaderMap::new(), Bytes::from_static(b"two")),
            &tx,
        );
        let collecting = tokio::spawn(async move { second.collect().await.unwrap().to_bytes() });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!collecting.is_finished(), "body should wait for a queue slot");

        assert_eq!(rx.recv().await.unwrap().response.body, Bytes::from_static(b"one"));
        assert_eq!(collecting.await.unwrap(), Bytes::from_static(b"two"));
        assert_eq!(rx.recv().await.unwrap().response.body, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_dropped_body_still_emits() {
        let (tx, mut rx) = capture_channel(1);
        let body = CaptureBody::new(
            Bytes::new(),
            pending(HeaderMap::new(), Bytes::new()),
            &tx,
        );
        assert!(!body.is_end_stream());
        drop(body);

        let exchange = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exchange.response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_exactly_one_exchange_per_body() {
        let (tx, mut rx) = capture_channel(4);
        let body = CaptureBody::new(
            Bytes::from_static(b"x"),
            pending(HeaderMap::new(), Bytes::from_static(b"x")),
            &tx,
        );
        body.collect().await.unwrap();
        drop(tx);

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
