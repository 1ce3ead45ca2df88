//! Thumbnail identity: content hash plus size tier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Thumbnail resolution tier.
///
/// `Tiny` is the blurred placeholder used for progressive loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
    Tiny,
    Small,
    Medium,
    Large,
}

impl SizeTier {
    /// All tiers, smallest first.
    pub const ALL: [SizeTier; 4] = [
        SizeTier::Tiny,
        SizeTier::Small,
        SizeTier::Medium,
        SizeTier::Large,
    ];

    /// Longest edge in pixels.
    pub fn dimensions(&self) -> u32 {
        match self {
            SizeTier::Tiny => 50,
            SizeTier::Small => 300,
            SizeTier::Medium => 500,
            SizeTier::Large => 800,
        }
    }

    /// Lowercase tier name, also the on-disk directory name.
    pub fn name(&self) -> &'static str {
        match self {
            SizeTier::Tiny => "tiny",
            SizeTier::Small => "small",
            SizeTier::Medium => "medium",
            SizeTier::Large => "large",
        }
    }

    /// Parse a tier name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tiny" => Some(SizeTier::Tiny),
            "small" => Some(SizeTier::Small),
            "medium" => Some(SizeTier::Medium),
            "large" => Some(SizeTier::Large),
            _ => None,
        }
    }

    /// Whether this is the placeholder tier.
    pub fn is_tiny(&self) -> bool {
        matches!(self, SizeTier::Tiny)
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a size tier name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown size tier: {0}")]
pub struct UnknownSizeTier(pub String);

impl FromStr for SizeTier {
    type Err = UnknownSizeTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeTier::parse(s).ok_or_else(|| UnknownSizeTier(s.to_string()))
    }
}

/// Identity of one thumbnail.
///
/// At most one generation request per key is in flight at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailKey {
    pub content_hash: String,
    pub size_tier: SizeTier,
}

impl ThumbnailKey {
    pub fn new(content_hash: impl Into<String>, size_tier: SizeTier) -> Self {
        Self {
            content_hash: content_hash.into(),
            size_tier,
        }
    }
}

impl fmt::Display for ThumbnailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.content_hash, self.size_tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(SizeTier::parse("TINY"), Some(SizeTier::Tiny));
        assert_eq!(SizeTier::parse(" Medium "), Some(SizeTier::Medium));
        assert_eq!(SizeTier::parse("huge"), None);
        assert!("huge".parse::<SizeTier>().is_err());
        assert_eq!("large".parse::<SizeTier>(), Ok(SizeTier::Large));
    }

    #[test]
    fn test_dimensions_increase_with_tier() {
        let dims: Vec<u32> = SizeTier::ALL.iter().map(|t| t.dimensions()).collect();
        assert_eq!(dims, vec![50, 300, 500, 800]);
    }

    #[test]
    fn test_key_display() {
        let key = ThumbnailKey::new("abc", SizeTier::Small);
        assert_eq!(key.to_string(), "abc_small");
    }
}
