//! thumbgrid - Adaptive media grid layout and thumbnail scheduling
//!
//! This library keeps large, scrollable photo grids populated with
//! progressively-refined thumbnails without flooding the external,
//! throughput-limited thumbnail generation service.
//!
//! # Architecture
//!
//! ```text
//! LayoutPacker ──► VisibilityTracker ──► RequestScheduler.demand(..)
//!                                               │
//!                     ┌─────────────────────────┼──────────────────────┐
//!                     ▼                         ▼                      ▼
//!              ThumbnailCache            DiskCacheProbe     ThumbnailGenerationService
//!                     │                         │                      │
//!                     └─────────── ThumbnailEvent (ready/failed) ◄─────┘
//!                                               │
//!                                               ▼
//!                                  TileLoader (per tile) ──► rendering host
//! ```
//!
//! The [`grid::ThumbnailGrid`] facade wires these together behind one
//! configuration surface.

pub mod config;
pub mod grid;
pub mod layout;
pub mod loader;
pub mod logging;
pub mod media;
pub mod scheduler;
pub mod thumbnail;
pub mod timer;
pub mod visibility;

pub use media::MediaItem;
