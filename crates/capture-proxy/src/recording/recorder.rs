//! Exchange recorder: the single consumer of the capture channel.

use super::error::RecordError;
use super::store::{FixtureStore, MergeOutcome};
use crate::capture::{CaptureReceiver, CapturedExchange};
use std::path::PathBuf;
use tracing::{info, warn};

/// Drains captured exchanges into the fixture store, one at a time.
pub struct ExchangeRecorder {
    store: FixtureStore,
}

impl ExchangeRecorder {
    pub fn new(imposters_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: FixtureStore::new(imposters_dir),
        }
    }

    /// Record until every sender has been dropped.
    ///
    /// Failures are logged and the loop moves on to the next exchange.
    pub async fn run(self, mut receiver: CaptureReceiver) {
        info!("Recording imposters into {:?}", self.store.base_dir());
        while let Some(exchange) = receiver.recv().await {
            // Errors are already logged by `record`.
            let _ = self.record(&exchange).await;
        }
        info!("Capture channel closed, recorder stopping");
    }

    /// Merge a single exchange.
    pub async fn record(&self, exchange: &CapturedExchange) -> Result<MergeOutcome, RecordError> {
        match self.store.merge(exchange).await {
            Ok(outcome) => {
                info!(
                    "Recorded {} {} -> {:?} ({} imposters{})",
                    exchange.request.method,
                    exchange.url,
                    outcome.path,
                    outcome.total,
                    if outcome.replaced { ", replaced" } else { "" }
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    "Dropping capture of {} {} ({}): {}",
                    exchange.request.method, exchange.url, exchange.response.status, e
                );
                Err(e)
            }
        }
    }
}
