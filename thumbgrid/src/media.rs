//! Media items as supplied by the external metadata store.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A photo in the library.
///
/// Owned by the metadata store; the grid and the scheduler only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Stable item identifier.
    pub id: String,
    /// Content-addressed hash of the source image.
    pub content_hash: String,
    /// Absolute path of the source image.
    pub source_path: PathBuf,
    /// Pixel width, if known.
    #[serde(default)]
    pub width: Option<u32>,
    /// Pixel height, if known.
    #[serde(default)]
    pub height: Option<u32>,
    /// Capture date, used only when grouping by date.
    #[serde(default)]
    pub taken_at: Option<NaiveDate>,
}

impl MediaItem {
    /// Create an item without dimensions or date.
    pub fn new(
        id: impl Into<String>,
        content_hash: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            content_hash: content_hash.into(),
            source_path: source_path.into(),
            width: None,
            height: None,
            taken_at: None,
        }
    }

    /// Set the pixel dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set the capture date.
    pub fn with_taken_at(mut self, date: NaiveDate) -> Self {
        self.taken_at = Some(date);
        self
    }

    /// Width divided by height, when both are known and non-zero.
    pub fn aspect_ratio(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(w as f64 / h as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_requires_both_dimensions() {
        let item = MediaItem::new("a", "h", "/p/a.jpg");
        assert_eq!(item.aspect_ratio(), None);

        let item = item.with_dimensions(300, 0);
        assert_eq!(item.aspect_ratio(), None);

        let item = MediaItem::new("a", "h", "/p/a.jpg").with_dimensions(400, 200);
        assert_eq!(item.aspect_ratio(), Some(2.0));
    }

    #[test]
    fn test_deserialize_camel_case_with_missing_fields() {
        let json = r#"{"id":"1","contentHash":"abc","sourcePath":"/photos/1.jpg"}"#;
        let item: MediaItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.content_hash, "abc");
        assert_eq!(item.width, None);
        assert_eq!(item.taken_at, None);
    }
}
