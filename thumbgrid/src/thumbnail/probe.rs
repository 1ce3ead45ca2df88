//! Disk-cache probe: batched existence checks for generated thumbnails.
//!
//! The probe answers "is this thumbnail already on disk, and where?" for many
//! keys at once. A hit lets the scheduler skip the generation service entirely.
//!
//! # On-disk layout
//!
//! ```text
//! <cache_dir>/
//!   tiny/<content_hash>.webp
//!   small/<content_hash>.webp
//!   medium/<content_hash>.webp
//!   large/<content_hash>.webp
//! ```
//!
//! A content hash must be a single file-name component of ASCII
//! alphanumerics, `-` or `_`; any other key is reported as a miss and never
//! touches the filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{trace, warn};

use super::key::ThumbnailKey;
use super::BoxFuture;

/// File extension of generated thumbnails.
pub const THUMBNAIL_EXTENSION: &str = "webp";

/// Application directory name under the platform data dir.
const APP_DIR_NAME: &str = "thumbgrid";

/// Thumbnail directory name under the application dir.
const THUMBNAIL_DIR_NAME: &str = "Thumbnails";

/// Errors reported by a disk-cache probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// I/O failure while inspecting the cache directory.
    #[error("I/O error probing thumbnail cache: {0}")]
    Io(#[from] std::io::Error),

    /// The probe backend is not available (e.g. host bridge missing).
    #[error("Probe backend unavailable: {0}")]
    Unavailable(String),
}

/// Result of probing one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub cached: bool,
    pub path: Option<PathBuf>,
}

impl ProbeResult {
    pub fn hit(path: impl Into<PathBuf>) -> Self {
        Self {
            cached: true,
            path: Some(path.into()),
        }
    }

    pub fn miss() -> Self {
        Self::default()
    }
}

/// Batched disk-cache lookup.
///
/// Implementations must be `Send + Sync`; the scheduler holds them as
/// `Arc<dyn DiskCacheProbe>`. Keys absent from the returned map are treated
/// as misses.
pub trait DiskCacheProbe: Send + Sync {
    fn batch_check<'a>(
        &'a self,
        keys: &'a [ThumbnailKey],
    ) -> BoxFuture<'a, Result<HashMap<ThumbnailKey, ProbeResult>, ProbeError>>;
}

/// Probe over a local directory in the standard thumbnail layout.
#[derive(Debug, Clone)]
pub struct FsDiskCacheProbe {
    cache_dir: PathBuf,
}

impl FsDiskCacheProbe {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Probe over [`default_cache_dir`], if the platform has a data dir.
    pub fn with_default_dir() -> Option<Self> {
        default_cache_dir().map(Self::new)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Expected path of `key` under this cache directory.
    pub fn path_for(&self, key: &ThumbnailKey) -> Option<PathBuf> {
        thumbnail_path(&self.cache_dir, key)
    }
}

impl DiskCacheProbe for FsDiskCacheProbe {
    fn batch_check<'a>(
        &'a self,
        keys: &'a [ThumbnailKey],
    ) -> BoxFuture<'a, Result<HashMap<ThumbnailKey, ProbeResult>, ProbeError>> {
        Box::pin(async move {
            let mut checks: FuturesUnordered<_> = keys
                .iter()
                .map(move |key| async move {
                    let Some(path) = self.path_for(key) else {
                        warn!(key = %key, "Content hash is not a valid file name; treating as miss");
                        return Ok::<_, std::io::Error>((key, None));
                    };
                    let exists = tokio::fs::try_exists(&path).await?;
                    Ok((key, exists.then_some(path)))
                })
                .collect();

            let mut results = HashMap::with_capacity(keys.len());
            while let Some(check) = checks.next().await {
                let (key, path) = check?;
                let result = match path {
                    Some(path) => ProbeResult::hit(path),
                    None => ProbeResult::miss(),
                };
                trace!(key = %key, cached = result.cached, "Probed disk cache");
                results.insert(key.clone(), result);
            }
            Ok(results)
        })
    }
}

/// `<cache_dir>/<tier>/<content_hash>.webp`, or `None` when the content hash
/// is not a plain file name.
pub fn thumbnail_path(cache_dir: &Path, key: &ThumbnailKey) -> Option<PathBuf> {
    if !is_file_name_safe(&key.content_hash) {
        return None;
    }
    Some(
        cache_dir
            .join(key.size_tier.name())
            .join(format!("{}.{}", key.content_hash, THUMBNAIL_EXTENSION)),
    )
}

fn is_file_name_safe(hash: &str) -> bool {
    !hash.is_empty()
        && hash
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Platform default thumbnail directory (`<data_dir>/thumbgrid/Thumbnails`).
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join(THUMBNAIL_DIR_NAME))
}
