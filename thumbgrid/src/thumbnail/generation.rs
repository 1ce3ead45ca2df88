//! Interface to the external thumbnail generation service.
//!
//! The service accepts batches of [`GenerationTask`]s and later reports each
//! outcome as a [`GenerationEvent`]. Dispatched tasks cannot be cancelled.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::key::{SizeTier, ThumbnailKey};
use super::BoxFuture;

/// One generation request as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    pub source_path: PathBuf,
    pub content_hash: String,
    pub size_tier: SizeTier,
    /// Higher values are served first. A hint only.
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl GenerationTask {
    pub fn key(&self) -> ThumbnailKey {
        ThumbnailKey::new(self.content_hash.clone(), self.size_tier)
    }
}

/// Acknowledgement of an accepted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueAck {
    /// Number of tasks the service accepted.
    pub accepted: usize,
}

/// Errors from the generation service.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The service rejected or failed to receive the batch.
    #[error("Enqueue failed: {0}")]
    Enqueue(String),

    /// The service has shut down.
    #[error("Generation service unavailable")]
    Unavailable,
}

/// Completion report from the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Thumbnail written to `path`.
    Ready { key: ThumbnailKey, path: PathBuf },
    /// Generation failed permanently for `key`.
    Failed { key: ThumbnailKey, reason: String },
}

impl GenerationEvent {
    pub fn key(&self) -> &ThumbnailKey {
        match self {
            GenerationEvent::Ready { key, .. } | GenerationEvent::Failed { key, .. } => key,
        }
    }
}

/// Broadcast to tile loaders when a thumbnail becomes displayable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailReady {
    pub key: ThumbnailKey,
    pub uri: String,
}

/// Outcome broadcast to tile loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailEvent {
    /// The thumbnail is displayable.
    Ready(ThumbnailReady),
    /// Generation failed; the key will not become ready unless requested
    /// again.
    Failed { key: ThumbnailKey, reason: String },
}

impl ThumbnailEvent {
    pub fn key(&self) -> &ThumbnailKey {
        match self {
            ThumbnailEvent::Ready(ready) => &ready.key,
            ThumbnailEvent::Failed { key, .. } => key,
        }
    }
}

/// Throughput-limited thumbnail generator.
pub trait ThumbnailGenerationService: Send + Sync {
    /// Submit a batch, highest priority first.
    fn enqueue(&self, tasks: Vec<GenerationTask>) -> BoxFuture<'_, Result<EnqueueAck, GenerationError>>;
}
