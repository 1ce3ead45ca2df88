//! INI configuration file.
//!
//! `~/.config/thumbgrid/config.ini` (per `dirs::config_dir()`) holds one
//! section per subsystem:
//!
//! ```ini
//! [layout]
//! tile_size = 200
//! tall_policy = double-height
//!
//! [scheduler]
//! debounce_ms = 150
//!
//! [cache]
//! directory = /var/cache/thumbgrid
//! ```
//!
//! A missing file or key keeps the default. Every recognised key is listed by
//! [`ConfigKey::all`], which drives loading, saving and the CLI's
//! `config get/set/list`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::{debug, warn};

use crate::grid::GridOptions;
use crate::layout::TallPolicy;
use crate::loader::LoaderConfig;
use crate::logging::LoggingConfig;
use crate::scheduler::SchedulerConfig;
use crate::thumbnail::{
    default_cache_dir, AssetProtocolResolver, CacheConfig, MediaAssetResolver,
    PassthroughResolver, SizeTier, DEFAULT_ASSET_PREFIX,
};

/// Configuration file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Path of the user configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("thumbgrid")
        .join(CONFIG_FILE_NAME)
}

/// How thumbnail paths become URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Host exposes an asset protocol; plain paths otherwise.
    pub asset_protocol: bool,
    pub asset_prefix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            asset_protocol: true,
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub layout: GridOptions,
    pub scheduler: SchedulerConfig,
    pub loader: LoaderConfig,
    pub cache: CacheConfig,
    /// Disk thumbnail cache; platform default when unset.
    pub cache_dir: Option<PathBuf>,
    pub resolver: ResolverConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from [`config_file_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                debug!(path = %path.display(), "Loading config");
                Self::from_ini_str(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                continue;
            };
            for (key, value) in properties.iter() {
                match ConfigKey::lookup(section, key) {
                    Some(config_key) => config_key.set(&mut config, value)?,
                    None => warn!(section, key, "Ignoring unknown config key"),
                }
            }
        }

        Ok(config)
    }

    /// Render every set key as INI.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = ini.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ini_string())?;
        Ok(())
    }

    /// Disk cache directory, falling back to the platform default.
    pub fn disk_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir.clone().or_else(default_cache_dir)
    }

    pub fn resolver(&self) -> Arc<dyn MediaAssetResolver> {
        if self.resolver.asset_protocol {
            Arc::new(AssetProtocolResolver::new(self.resolver.asset_prefix.clone()))
        } else {
            Arc::new(PassthroughResolver)
        }
    }

    /// Loader settings consistent with the layout's tiers.
    pub fn loader_config(&self) -> LoaderConfig {
        self.loader
            .clone()
            .with_tiny_enabled(self.layout.tiny_enabled)
            .with_full_tier(self.layout.size_tier)
    }
}

/// A recognised `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    LayoutTileSize,
    LayoutGap,
    LayoutTallPolicy,
    LayoutWideRatio,
    LayoutTallRatio,
    LayoutGroupByDate,
    LayoutEmbedded,
    LayoutSizeTier,
    LayoutTinyEnabled,

    SchedulerDebounceMs,
    SchedulerInFlightTimeoutSecs,
    SchedulerBasePriority,
    SchedulerTinyBoost,
    SchedulerDistanceFalloff,

    LoaderMaxRetry,
    LoaderRetryBaseDelayMs,
    LoaderLoadDelayMs,
    LoaderAssetProtocol,
    LoaderAssetPrefix,

    VisibilityMarginPx,
    VisibilityLookAroundRows,
    VisibilityOverscanPx,

    CacheMaxEntries,
    CacheTimeToIdleSecs,
    CacheDirectory,

    LoggingFilter,
    LoggingDirectory,
    LoggingFilePrefix,
}

impl ConfigKey {
    /// All keys in section order.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            LayoutTileSize,
            LayoutGap,
            LayoutTallPolicy,
            LayoutWideRatio,
            LayoutTallRatio,
            LayoutGroupByDate,
            LayoutEmbedded,
            LayoutSizeTier,
            LayoutTinyEnabled,
            SchedulerDebounceMs,
            SchedulerInFlightTimeoutSecs,
            SchedulerBasePriority,
            SchedulerTinyBoost,
            SchedulerDistanceFalloff,
            LoaderMaxRetry,
            LoaderRetryBaseDelayMs,
            LoaderLoadDelayMs,
            LoaderAssetProtocol,
            LoaderAssetPrefix,
            VisibilityMarginPx,
            VisibilityLookAroundRows,
            VisibilityOverscanPx,
            CacheMaxEntries,
            CacheTimeToIdleSecs,
            CacheDirectory,
            LoggingFilter,
            LoggingDirectory,
            LoggingFilePrefix,
        ]
    }

    fn parts(&self) -> (&'static str, &'static str) {
        use ConfigKey::*;
        match self {
            LayoutTileSize => ("layout", "tile_size"),
            LayoutGap => ("layout", "gap"),
            LayoutTallPolicy => ("layout", "tall_policy"),
            LayoutWideRatio => ("layout", "wide_ratio"),
            LayoutTallRatio => ("layout", "tall_ratio"),
            LayoutGroupByDate => ("layout", "group_by_date"),
            LayoutEmbedded => ("layout", "embedded"),
            LayoutSizeTier => ("layout", "size_tier"),
            LayoutTinyEnabled => ("layout", "tiny_enabled"),
            SchedulerDebounceMs => ("scheduler", "debounce_ms"),
            SchedulerInFlightTimeoutSecs => ("scheduler", "in_flight_timeout_secs"),
            SchedulerBasePriority => ("scheduler", "base_priority"),
            SchedulerTinyBoost => ("scheduler", "tiny_boost"),
            SchedulerDistanceFalloff => ("scheduler", "distance_falloff"),
            LoaderMaxRetry => ("loader", "max_retry"),
            LoaderRetryBaseDelayMs => ("loader", "retry_base_delay_ms"),
            LoaderLoadDelayMs => ("loader", "load_delay_ms"),
            LoaderAssetProtocol => ("loader", "asset_protocol"),
            LoaderAssetPrefix => ("loader", "asset_prefix"),
            VisibilityMarginPx => ("visibility", "margin_px"),
            VisibilityLookAroundRows => ("visibility", "look_around_rows"),
            VisibilityOverscanPx => ("visibility", "overscan_px"),
            CacheMaxEntries => ("cache", "max_entries"),
            CacheTimeToIdleSecs => ("cache", "time_to_idle_secs"),
            CacheDirectory => ("cache", "directory"),
            LoggingFilter => ("logging", "filter"),
            LoggingDirectory => ("logging", "directory"),
            LoggingFilePrefix => ("logging", "file_prefix"),
        }
    }

    pub fn section(&self) -> &'static str {
        self.parts().0
    }

    pub fn key_name(&self) -> &'static str {
        self.parts().1
    }

    /// `section.key`
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    fn lookup(section: &str, key: &str) -> Option<ConfigKey> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.section() == section && k.key_name() == key)
    }

    /// Current value as written to the file; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let layout = &config.layout;
        match self {
            LayoutTileSize => layout.tile_size.to_string(),
            LayoutGap => layout.gap.to_string(),
            LayoutTallPolicy => layout.tall_policy.as_config_str().to_string(),
            LayoutWideRatio => layout.thresholds.wide_ratio.to_string(),
            LayoutTallRatio => layout.thresholds.tall_ratio.to_string(),
            LayoutGroupByDate => layout.group_by_date.to_string(),
            LayoutEmbedded => layout.embedded.to_string(),
            LayoutSizeTier => layout.size_tier.name().to_string(),
            LayoutTinyEnabled => layout.tiny_enabled.to_string(),
            SchedulerDebounceMs => config.scheduler.debounce.as_millis().to_string(),
            SchedulerInFlightTimeoutSecs => {
                config.scheduler.in_flight_timeout.as_secs().to_string()
            }
            SchedulerBasePriority => config.scheduler.priority.base.to_string(),
            SchedulerTinyBoost => config.scheduler.priority.tiny_boost.to_string(),
            SchedulerDistanceFalloff => config.scheduler.priority.distance_falloff.to_string(),
            LoaderMaxRetry => config.loader.max_retry.to_string(),
            LoaderRetryBaseDelayMs => config.loader.retry_base_delay.as_millis().to_string(),
            LoaderLoadDelayMs => config.loader.load_delay.as_millis().to_string(),
            LoaderAssetProtocol => config.resolver.asset_protocol.to_string(),
            LoaderAssetPrefix => config.resolver.asset_prefix.clone(),
            VisibilityMarginPx => layout.visibility.margin_px.to_string(),
            VisibilityLookAroundRows => layout.visibility.look_around_rows.to_string(),
            VisibilityOverscanPx => layout.visibility.overscan_px.to_string(),
            CacheMaxEntries => config.cache.max_entries.to_string(),
            CacheTimeToIdleSecs => config
                .cache
                .time_to_idle
                .map(|d| d.as_secs().to_string())
                .unwrap_or_default(),
            CacheDirectory => display_path(config.cache_dir.as_deref()),
            LoggingFilter => config.logging.filter.clone(),
            LoggingDirectory => display_path(config.logging.directory.as_deref()),
            LoggingFilePrefix => config.logging.file_prefix.clone(),
        }
    }

    /// Parse `value` into `config`. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            LayoutTileSize => config.layout.tile_size = self.parse_positive(value)?,
            LayoutGap => config.layout.gap = self.parse_non_negative(value)?,
            LayoutTallPolicy => {
                config.layout.tall_policy = TallPolicy::from_config_str(value)
                    .ok_or_else(|| self.invalid(value, "expected double-height or own-row"))?
            }
            LayoutWideRatio => {
                config.layout.thresholds.wide_ratio = self.parse_positive::<f64>(value)?
            }
            LayoutTallRatio => {
                config.layout.thresholds.tall_ratio = self.parse_positive::<f64>(value)?
            }
            LayoutGroupByDate => config.layout.group_by_date = self.parse_bool(value)?,
            LayoutEmbedded => config.layout.embedded = self.parse_bool(value)?,
            LayoutSizeTier => {
                config.layout.size_tier = SizeTier::parse(value)
                    .ok_or_else(|| self.invalid(value, "expected tiny, small, medium or large"))?
            }
            LayoutTinyEnabled => config.layout.tiny_enabled = self.parse_bool(value)?,
            SchedulerDebounceMs => {
                config.scheduler.debounce = Duration::from_millis(self.parse(value)?)
            }
            SchedulerInFlightTimeoutSecs => {
                config.scheduler.in_flight_timeout = Duration::from_secs(self.parse(value)?)
            }
            // Loader requests share the scheduler's priority policy.
            SchedulerBasePriority => {
                let base = self.parse(value)?;
                config.scheduler.priority.base = base;
                config.loader.priority.base = base;
            }
            SchedulerTinyBoost => {
                let boost = self.parse(value)?;
                config.scheduler.priority.tiny_boost = boost;
                config.loader.priority.tiny_boost = boost;
            }
            SchedulerDistanceFalloff => {
                let falloff = self.parse(value)?;
                config.scheduler.priority.distance_falloff = falloff;
                config.loader.priority.distance_falloff = falloff;
            }
            LoaderMaxRetry => config.loader.max_retry = self.parse(value)?,
            LoaderRetryBaseDelayMs => {
                config.loader.retry_base_delay = Duration::from_millis(self.parse(value)?)
            }
            LoaderLoadDelayMs => {
                config.loader.load_delay = Duration::from_millis(self.parse(value)?)
            }
            LoaderAssetProtocol => config.resolver.asset_protocol = self.parse_bool(value)?,
            LoaderAssetPrefix => config.resolver.asset_prefix = value.to_string(),
            VisibilityMarginPx => {
                config.layout.visibility.margin_px = self.parse_non_negative(value)?
            }
            VisibilityLookAroundRows => {
                config.layout.visibility.look_around_rows = self.parse(value)?
            }
            VisibilityOverscanPx => {
                config.layout.visibility.overscan_px = self.parse_non_negative(value)?
            }
            CacheMaxEntries => {
                let max: u64 = self.parse(value)?;
                if max == 0 {
                    return Err(self.invalid(value, "must be at least 1"));
                }
                config.cache.max_entries = max;
            }
            CacheTimeToIdleSecs => {
                config.cache.time_to_idle = if value.is_empty() {
                    None
                } else {
                    Some(Duration::from_secs(self.parse(value)?))
                }
            }
            CacheDirectory => config.cache_dir = optional_path(value),
            LoggingFilter => config.logging.filter = value.to_string(),
            LoggingDirectory => config.logging.directory = optional_path(value),
            LoggingFilePrefix => config.logging.file_prefix = value.to_string(),
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, e.to_string()))
    }

    fn parse_non_negative<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: fmt::Display,
    {
        let parsed: T = self.parse(value)?;
        if parsed < T::default() {
            return Err(self.invalid(value, "must not be negative"));
        }
        Ok(parsed)
    }

    fn parse_positive<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: fmt::Display,
    {
        let parsed: T = self.parse(value)?;
        if parsed <= T::default() {
            return Err(self.invalid(value, "must be positive"));
        }
        Ok(parsed)
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .split_once('.')
            .and_then(|(section, key)| Self::lookup(section, key))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_empty_file_is_default() {
        let config = ConfigFile::from_ini_str("").unwrap();
        assert_eq!(config.layout.tile_size, 200.0);
        assert_eq!(config.scheduler.debounce, Duration::from_millis(150));
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let config = ConfigFile::from_ini_str(
            "[layout]\n\
             tile_size = 160\n\
             tall_policy = own-row\n\
             size_tier = medium\n\
             embedded = yes\n\
             [scheduler]\n\
             debounce_ms = 250\n\
             base_priority = 40\n\
             [visibility]\n\
             look_around_rows = 4\n\
             [cache]\n\
             max_entries = 500\n\
             time_to_idle_secs = 60\n\
             directory = /tmp/thumbs\n",
        )
        .unwrap();

        assert_eq!(config.layout.tile_size, 160.0);
        assert_eq!(config.layout.tall_policy, TallPolicy::OwnRow);
        assert_eq!(config.layout.size_tier, SizeTier::Medium);
        assert!(config.layout.embedded);
        assert_eq!(config.scheduler.debounce, Duration::from_millis(250));
        assert_eq!(config.scheduler.priority.base, 40);
        assert_eq!(config.loader.priority.base, 40);
        assert_eq!(config.layout.visibility.look_around_rows, 4);
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.cache.time_to_idle, Some(Duration::from_secs(60)));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/thumbs")));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = ConfigFile::from_ini_str("[layout]\ncolour = blue\n[other]\nx = 1\n").unwrap();
        assert_eq!(config.layout.tile_size, 200.0);
    }

    #[test]
    fn test_invalid_value_names_the_key() {
        let err = ConfigFile::from_ini_str("[layout]\ntile_size = -5\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "layout.tile_size");
                assert_eq!(value, "-5");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(ConfigFile::from_ini_str("[layout]\ntall_policy = sideways\n").is_err());
        assert!(ConfigFile::from_ini_str("[cache]\nmax_entries = 0\n").is_err());
        assert!(ConfigFile::from_ini_str("[layout]\nembedded = maybe\n").is_err());
    }

    // =========================================================================
    // Keys
    // =========================================================================

    #[test]
    fn test_key_from_str() {
        let key: ConfigKey = "scheduler.debounce_ms".parse().unwrap();
        assert_eq!(key, ConfigKey::SchedulerDebounceMs);
        assert_eq!(key.to_string(), "scheduler.debounce_ms");
        assert!(matches!(
            "scheduler.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!("nodot".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_every_key_round_trips_its_default() {
        let defaults = ConfigFile::default();
        for key in ConfigKey::all() {
            let value = key.get(&defaults);
            let mut config = ConfigFile::default();
            key.set(&mut config, &value).unwrap();
            assert_eq!(key.get(&config), value, "{}", key);
        }
    }

    #[test]
    fn test_empty_value_clears_optional_keys() {
        let mut config = ConfigFile::default();
        ConfigKey::CacheDirectory.set(&mut config, "/a").unwrap();
        ConfigKey::CacheDirectory.set(&mut config, "").unwrap();
        assert!(config.cache_dir.is_none());
        assert_eq!(ConfigKey::CacheDirectory.get(&config), "");
    }

    // =========================================================================
    // Files
    // =========================================================================

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config.cache.max_entries, ConfigFile::default().cache.max_entries);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = ConfigFile::default();
        ConfigKey::LayoutGroupByDate.set(&mut config, "true").unwrap();
        ConfigKey::LoggingDirectory.set(&mut config, "/var/log/thumbgrid").unwrap();
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert!(loaded.layout.group_by_date);
        assert_eq!(
            loaded.logging.directory,
            Some(PathBuf::from("/var/log/thumbgrid"))
        );
        assert!(loaded.cache_dir.is_none());
    }

    #[test]
    fn test_resolver_selection() {
        let mut config = ConfigFile::default();
        let path = Path::new("/photos/a b.webp");
        assert!(config.resolver().resolve(path).starts_with("asset://localhost/"));

        config.resolver.asset_protocol = false;
        assert_eq!(config.resolver().resolve(path), "/photos/a b.webp");
    }

    #[test]
    fn test_loader_config_follows_layout() {
        let mut config = ConfigFile::default();
        config.layout.size_tier = SizeTier::Large;
        config.layout.tiny_enabled = false;
        let loader = config.loader_config();
        assert_eq!(loader.full_tier, SizeTier::Large);
        assert!(!loader.tiny_enabled);
    }
}
