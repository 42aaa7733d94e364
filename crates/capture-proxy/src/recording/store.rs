//! On-disk fixture store.
//!
//! One `imposters.json` array per (backend host, URL path) directory:
//! `<base>/<host with ':' as '_'>/<path segments>/imposters.json`.
//!
//! The store is not safe for concurrent writers. It is owned by the single
//! exchange recorder task.

use super::error::RecordError;
use super::types::{Imposter, ImposterRequest, ImposterResponse};
use crate::capture::CapturedExchange;
use hyper::Uri;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File name of every fixture array.
pub const FIXTURE_FILE: &str = "imposters.json";

const EMPTY_FIXTURE: &[u8] = b"[]";

/// Result of merging one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Fixture file that was rewritten.
    pub path: PathBuf,
    /// Whether an imposter with the same fingerprint was replaced.
    pub replaced: bool,
    /// Imposters in the file after the merge.
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct FixtureStore {
    base_dir: PathBuf,
}

impl FixtureStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the fixtures for `url`.
    ///
    /// Empty, `.` and `..` path segments are skipped so the result always
    /// stays below the base directory.
    pub fn fixture_dir(&self, url: &Uri) -> PathBuf {
        let host = match (url.host(), url.port_u16()) {
            (Some(host), Some(port)) => format!("{host}_{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => "localhost".to_string(),
        }
        .replace(':', "_");

        let decoded = urlencoding::decode(url.path())
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| url.path().to_string());

        let mut dir = self.base_dir.join(host);
        for segment in decoded.split('/') {
            if matches!(Path::new(segment).components().next(), Some(Component::Normal(_)))
                && !segment.contains(std::path::MAIN_SEPARATOR)
            {
                dir.push(segment);
            }
        }
        dir
    }

    /// Create the fixture directory for `url` if it does not exist yet.
    pub async fn ensure_dir(&self, url: &Uri) -> Result<PathBuf, RecordError> {
        let dir = self.fixture_dir(url);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| RecordError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        Ok(dir)
    }

    /// Load the imposters in `dir`, initializing the file to `[]` if missing.
    pub async fn load(&self, dir: &Path) -> Result<Vec<Imposter>, RecordError> {
        let path = dir.join(FIXTURE_FILE);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Initializing empty fixture file {:?}", path);
                fs::write(&path, EMPTY_FIXTURE)
                    .await
                    .map_err(|source| RecordError::Write {
                        path: path.clone(),
                        source,
                    })?;
                return Ok(Vec::new());
            }
            Err(source) => return Err(RecordError::Read { path, source }),
        };

        serde_json::from_slice(&data).map_err(|source| RecordError::Parse { path, source })
    }

    /// Replace the whole fixture file in `dir`.
    ///
    /// The array is written to a sibling temporary file and renamed into
    /// place, so readers never observe a partially written file.
    pub async fn save(&self, dir: &Path, imposters: &[Imposter]) -> Result<PathBuf, RecordError> {
        let path = dir.join(FIXTURE_FILE);
        let json = serde_json::to_vec_pretty(imposters).map_err(|source| {
            RecordError::Serialize {
                path: path.clone(),
                source,
            }
        })?;

        let tmp = dir.join(format!("{FIXTURE_FILE}.tmp"));
        fs::write(&tmp, json)
            .await
            .map_err(|source| RecordError::Write {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| RecordError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Merge one captured exchange into its fixture file.
    pub async fn merge(&self, exchange: &CapturedExchange) -> Result<MergeOutcome, RecordError> {
        let dir = self.ensure_dir(&exchange.url).await?;
        let mut imposters = self.load(&dir).await?;

        let imposter = Imposter {
            request: ImposterRequest::from_exchange(exchange),
            response: ImposterResponse::from_captured(&exchange.response),
        };
        let replaced = upsert(&mut imposters, imposter);

        let path = self.save(&dir, &imposters).await?;
        Ok(MergeOutcome {
            path,
            replaced,
            total: imposters.len(),
        })
    }
}

/// Remove every imposter sharing the new one's fingerprint, then append it.
///
/// Returns true if anything was removed.
pub fn upsert(imposters: &mut Vec<Imposter>, imposter: Imposter) -> bool {
    let fingerprint = imposter.request.fingerprint();
    let before = imposters.len();
    imposters.retain(|existing| existing.request.fingerprint() != fingerprint);
    let replaced = imposters.len() != before;
    imposters.push(imposter);
    replaced
}
