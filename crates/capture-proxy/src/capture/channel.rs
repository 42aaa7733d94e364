//! Bounded capture queue shared by every listener.
//!
//! Producers wait for free capacity instead of dropping exchanges. The
//! receiver cannot be cloned, so there is exactly one consumer.

use super::CapturedExchange;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Create a capture channel holding at most `capacity` exchanges.
pub fn capture_channel(capacity: usize) -> (CaptureSender, CaptureReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CaptureSender { tx }, CaptureReceiver { rx })
}

/// Producer half, cloned into every proxy handler.
#[derive(Debug, Clone)]
pub struct CaptureSender {
    tx: mpsc::Sender<CapturedExchange>,
}

impl CaptureSender {
    /// Enqueue an exchange, waiting while the queue is full.
    ///
    /// Returns false when the consumer is gone.
    pub async fn send(&self, exchange: CapturedExchange) -> bool {
        self.tx.send(exchange).await.is_ok()
    }

    /// Poll-driven sender for use inside `Body` implementations.
    pub fn poll_sender(&self) -> PollSender<CapturedExchange> {
        PollSender::new(self.tx.clone())
    }

    /// Free slots left in the queue.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer half, owned by the exchange recorder.
#[derive(Debug)]
pub struct CaptureReceiver {
    rx: mpsc::Receiver<CapturedExchange>,
}

impl CaptureReceiver {
    /// Next exchange in FIFO order, or `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<CapturedExchange> {
        self.rx.recv().await
    }
}
