//! Adaptive grid layout.
//!
//! Maps `(items, columns)` to rows of variable-span placements. The packer is
//! pure: the same input always yields the same rows, and every layout pass
//! produces a fresh sequence.
//!
//! ```text
//! columns = 3
//!
//!   [normal][ wide  wide ]      row "a-b"
//!   [normal][normal]            row "c-d"
//! ```

mod aspect;
mod packer;

pub use aspect::{AspectCategory, AspectThresholds, DEFAULT_TALL_RATIO, DEFAULT_WIDE_RATIO};
pub use packer::{
    columns_for_width, pack, GridRow, LayoutPacker, MediaItemWithSpan, PackerConfig, TallPolicy,
    DEFAULT_GAP, DEFAULT_TILE_SIZE, MIN_COLUMNS,
};
