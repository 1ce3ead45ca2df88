//! Tile load states and the snapshot observed by the rendering host.

use serde::Serialize;
use thiserror::Error;

/// Progressive load state of one tile.
///
/// ```text
/// Idle ──► RequestingTiny ──► TinyShown ──► RequestingFull ──► FullShown
///   │                                          ▲      │
///   └──────────── (tiny disabled/cached) ──────┘      └──► Error ──(manual retry)──► RequestingFull
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadState {
    #[default]
    Idle,
    RequestingTiny,
    TinyShown,
    RequestingFull,
    FullShown,
    Error,
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::FullShown | LoadState::Error)
    }
}

/// What the host renders for a tile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSnapshot {
    pub state: LoadState,
    /// Blurred placeholder URI, once available.
    pub tiny_uri: Option<String>,
    /// Full-tier URI, once available.
    pub full_uri: Option<String>,
    /// Automatic retries used since the last success or manual retry.
    pub retry_count: u32,
    /// Bumped on every re-request so the host reloads the image.
    pub attempt: u32,
}

/// Why a tier could not be shown: a decode failure reported by the
/// rendering host, or a generation failure reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The image data is truncated or malformed.
    #[error("Corrupt image data: {0}")]
    Corrupt(String),

    /// The host cannot decode this format.
    #[error("Unsupported image format: {0}")]
    Unsupported(String),

    /// The URI could not be loaded.
    #[error("Failed to load image: {0}")]
    Load(String),

    /// The thumbnail could not be generated.
    #[error("Thumbnail unavailable: {0}")]
    Unavailable(String),
}
