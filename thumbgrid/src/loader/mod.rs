//! Progressive per-tile loading.
//!
//! A [`TileLoader`] takes one tile from nothing, through a blurred tiny
//! placeholder, to the full-tier thumbnail, retrying decode and generation
//! failures with linear backoff before settling in `Error`.
//!
//! ```text
//! host ──mount(item)──► TileLoader ──request──► ThumbnailSource (scheduler)
//!   ▲                       │  ▲                        │
//!   │                  watch│  └──── ThumbnailEvent ────┘
//!   └──── TileSnapshot ◄────┘
//!   └──report_*_decoded──►
//! ```

mod config;
mod state;
mod tile;

pub use config::{
    LoaderConfig, ScrollActivity, DEFAULT_LOAD_DELAY, DEFAULT_MAX_RETRY, DEFAULT_RETRY_BASE_DELAY,
};
pub use state::{DecodeError, LoadState, TileSnapshot};
pub use tile::TileLoader;
