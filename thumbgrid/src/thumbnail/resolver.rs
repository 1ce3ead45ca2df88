//! Local file path → displayable URI.
//!
//! Whether the rendering host exposes an asset bridge is a capability chosen
//! at startup: inject [`AssetProtocolResolver`] when it does, and
//! [`PassthroughResolver`] when the host can load plain paths.

use std::path::Path;

/// Default URI prefix of the host asset protocol.
pub const DEFAULT_ASSET_PREFIX: &str = "asset://localhost/";

/// Maps a local file path to a URI the rendering host can load.
pub trait MediaAssetResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> String;
}

/// Percent-encodes the whole path behind a scheme prefix.
#[derive(Debug, Clone)]
pub struct AssetProtocolResolver {
    prefix: String,
}

impl Default for AssetProtocolResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_PREFIX)
    }
}

impl AssetProtocolResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl MediaAssetResolver for AssetProtocolResolver {
    fn resolve(&self, path: &Path) -> String {
        let raw = path.to_string_lossy().replace('\\', "/");
        format!("{}{}", self.prefix, urlencoding::encode(&raw))
    }
}

/// Returns the path unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl MediaAssetResolver for PassthroughResolver {
    fn resolve(&self, path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}
