//! Thumbnail identity, the in-memory cache, and the external collaborators
//! (disk-cache probe, generation service, asset resolver).
//!
//! Collaborators are trait objects so the host can plug in its own bridge;
//! filesystem and asset-protocol implementations are provided.

use std::future::Future;
use std::pin::Pin;

mod cache;
mod generation;
mod key;
mod probe;
mod resolver;

pub use cache::{
    CacheConfig, CacheEntry, CacheStats, EntryState, ThumbnailCache, DEFAULT_MAX_ENTRIES,
};
pub use generation::{
    EnqueueAck, GenerationError, GenerationEvent, GenerationTask, ThumbnailEvent,
    ThumbnailGenerationService, ThumbnailReady,
};
pub use key::{SizeTier, ThumbnailKey, UnknownSizeTier};
pub use probe::{
    default_cache_dir, thumbnail_path, DiskCacheProbe, FsDiskCacheProbe, ProbeError, ProbeResult,
    THUMBNAIL_EXTENSION,
};
pub use resolver::{
    AssetProtocolResolver, MediaAssetResolver, PassthroughResolver, DEFAULT_ASSET_PREFIX,
};

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
