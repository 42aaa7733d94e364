//! Imposter recording: turns captured exchanges into persisted fixtures.
//!
//! # Module Structure
//!
//! - `types` - Persisted imposter types
//! - `fingerprint` - Canonical request identity for deduplication
//! - `store` - On-disk fixture store and merge logic
//! - `recorder` - Single consumer draining the capture channel
//! - `error` - Storage errors

mod error;
mod fingerprint;
mod recorder;
mod store;
mod types;

pub use error::RecordError;
pub use recorder::ExchangeRecorder;
pub use store::{upsert, FixtureStore, MergeOutcome, FIXTURE_FILE};
pub use types::{canonical_header_name, Imposter, ImposterRequest, ImposterResponse};
