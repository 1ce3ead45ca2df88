//! Argument types shared across CLI commands.

use clap::ValueEnum;
use thumbgrid::layout::TallPolicy;
use thumbgrid::thumbnail::SizeTier;

/// Thumbnail size tier selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum TierArg {
    /// 50px blurred placeholder
    Tiny,
    /// 300px grid thumbnail
    Small,
    /// 500px
    Medium,
    /// 800px
    Large,
}

impl From<TierArg> for SizeTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Tiny => SizeTier::Tiny,
            TierArg::Small => SizeTier::Small,
            TierArg::Medium => SizeTier::Medium,
            TierArg::Large => SizeTier::Large,
        }
    }
}

/// Tall item placement for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum TallPolicyArg {
    /// Tall items span two rows beside their siblings
    DoubleHeight,
    /// Tall items get a row of their own
    OwnRow,
}

impl From<TallPolicyArg> for TallPolicy {
    fn from(policy: TallPolicyArg) -> Self {
        match policy {
            TallPolicyArg::DoubleHeight => TallPolicy::DoubleHeight,
            TallPolicyArg::OwnRow => TallPolicy::OwnRow,
        }
    }
}
