//! Render options and the Fontera configuration file (fontera.toml)

use fontera_gpu::EvictionPolicy;
use fontera_text::{Alignment, Background};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Per-call render settings
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Font file override; `None` uses the default font
    pub font_path: Option<PathBuf>,
    /// Size in logical units before display and call scaling
    pub base_size: f32,
    pub scale: f32,
    pub shadow: bool,
    pub background: Background,
    pub align: Alignment,
    /// Re-roll animated text once per interval instead of baking it in
    pub animation_interval: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font_path: None,
            base_size: 10.0,
            scale: 1.0,
            shadow: true,
            background: Background::None,
            align: Alignment::Left,
            animation_interval: None,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    pub fn with_base_size(mut self, size: f32) -> Self {
        self.base_size = size;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_shadow(mut self, shadow: bool) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_align(mut self, align: Alignment) -> Self {
        self.align = align;
        self
    }

    pub fn with_animation_interval(mut self, interval: Duration) -> Self {
        self.animation_interval = Some(interval);
        self
    }
}

/// Top-level Fontera configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FonteraConfig {
    /// Font loaded for the default renderer
    #[serde(default = "default_font_path")]
    pub default_font_path: PathBuf,
    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_font_path() -> PathBuf {
    PathBuf::from("assets/fontera/default.ttf")
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for FonteraConfig {
    fn default() -> Self {
        Self {
            default_font_path: default_font_path(),
            log_filter: default_log_filter(),
            cache: CacheConfig::default(),
        }
    }
}

/// Texture cache and renderer pool limits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_retain_entries")]
    pub retain_entries: usize,
    /// Seconds a pooled renderer may sit unused before disposal
    #[serde(default = "default_renderer_idle")]
    pub renderer_idle_secs: u64,
}

fn default_eviction_interval() -> u64 {
    60
}

fn default_max_entries() -> usize {
    20
}

fn default_retain_entries() -> usize {
    15
}

fn default_renderer_idle() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction_interval_secs: default_eviction_interval(),
            max_entries: default_max_entries(),
            retain_entries: default_retain_entries(),
            renderer_idle_secs: default_renderer_idle(),
        }
    }
}

impl CacheConfig {
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            interval: Duration::from_secs(self.eviction_interval_secs),
            max_entries: self.max_entries,
            retain_entries: self.retain_entries,
        }
    }

    pub fn renderer_idle(&self) -> Duration {
        Duration::from_secs(self.renderer_idle_secs)
    }

    /// How often idle renderers are checked
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

impl FonteraConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_option_defaults() {
        let options = RenderOptions::default();
        assert_eq!(options.font_path, None);
        assert_eq!(options.base_size, 10.0);
        assert_eq!(options.scale, 1.0);
        assert!(options.shadow);
        assert_eq!(options.background, Background::None);
        assert_eq!(options.align, Alignment::Left);
        assert_eq!(options.animation_interval, None);
    }

    #[test]
    fn test_render_option_builders() {
        let options = RenderOptions::new()
            .with_font_path("fonts/a.ttf")
            .with_base_size(12.0)
            .with_scale(2.0)
            .with_shadow(false)
            .with_background(Background::PerLine)
            .with_align(Alignment::Center)
            .with_animation_interval(Duration::from_millis(250));

        assert_eq!(options.font_path, Some(PathBuf::from("fonts/a.ttf")));
        assert_eq!(options.base_size, 12.0);
        assert!(!options.shadow);
        assert_eq!(options.align, Alignment::Center);
        assert_eq!(options.animation_interval, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = FonteraConfig::from_toml_str("").unwrap();
        assert_eq!(config, FonteraConfig::default());
        assert_eq!(config.cache.eviction_policy(), EvictionPolicy::default());
        assert_eq!(config.cache.renderer_idle(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_cache_table() {
        let config = FonteraConfig::from_toml_str(
            r#"
            log_filter = "debug"

            [cache]
            max_entries = 40
            "#,
        )
        .unwrap();

        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.cache.max_entries, 40);
        assert_eq!(config.cache.retain_entries, 15);
        assert_eq!(config.default_font_path, PathBuf::from("assets/fontera/default.ttf"));
    }

    #[test]
    fn test_invalid_config_is_error() {
        let result = FonteraConfig::from_toml_str("[cache]\nmax_entries = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = FonteraConfig::load(Path::new("/nonexistent/fontera.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = FonteraConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(FonteraConfig::from_toml_str(&text).unwrap(), config);
    }
}
