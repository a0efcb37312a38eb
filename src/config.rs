use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Structural folding settings
    #[serde(default)]
    pub folding: FoldingConfig,

    /// Incremental loading (scroll-to-edge) settings
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Syntax highlighting cache settings
    #[serde(default)]
    pub highlight: HighlightConfig,

    /// Viewport geometry
    #[serde(default)]
    pub viewport: ViewportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            folding: FoldingConfig::default(),
            loader: LoaderConfig::default(),
            search: SearchConfig::default(),
            highlight: HighlightConfig::default(),
            viewport: ViewportConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Folding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoldingConfig {
    /// Enable structural folding
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Buffers with more lines than this only get a prefix parsed
    #[serde(default = "default_large_buffer_lines")]
    pub large_buffer_lines: usize,

    /// Number of leading lines parsed for large buffers
    #[serde(default = "default_large_buffer_prefix")]
    pub large_buffer_prefix: usize,
}

fn default_large_buffer_lines() -> usize {
    5_000
}

fn default_large_buffer_prefix() -> usize {
    2_000
}

impl Default for FoldingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            large_buffer_lines: default_large_buffer_lines(),
            large_buffer_prefix: default_large_buffer_prefix(),
        }
    }
}

/// Incremental loader configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Distance from the top edge (px) that arms a prepend
    #[serde(default = "default_top_threshold_px")]
    pub top_threshold_px: f64,

    /// Distance from the bottom edge (px) that arms an append
    #[serde(default = "default_bottom_threshold_px")]
    pub bottom_threshold_px: f64,

    /// Minimum scroll delta (px) classified as directional intent
    #[serde(default = "default_min_scroll_delta_px")]
    pub min_scroll_delta_px: f64,

    /// Consecutive upward scroll events required before a prepend fires
    #[serde(default = "default_top_consecutive_events")]
    pub top_consecutive_events: u32,

    /// Time after which a directional lock is released even without a reply
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_top_threshold_px() -> f64 {
    50.0
}

fn default_bottom_threshold_px() -> f64 {
    100.0
}

fn default_min_scroll_delta_px() -> f64 {
    5.0
}

fn default_top_consecutive_events() -> u32 {
    2
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            top_threshold_px: default_top_threshold_px(),
            bottom_threshold_px: default_bottom_threshold_px(),
            min_scroll_delta_px: default_min_scroll_delta_px(),
            top_consecutive_events: default_top_consecutive_events(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Maximum number of results kept (the rest is reported as limited)
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Lines longer than this (in chars) are truncated before scanning
    #[serde(default = "default_max_line_chars")]
    pub max_line_chars: usize,

    /// Visible-length change that forces a re-run for an unchanged term
    #[serde(default = "default_rerun_line_delta")]
    pub rerun_line_delta: usize,

    /// Maximum length (in chars) of the context text attached to a result
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

fn default_max_results() -> usize {
    1_000
}

fn default_max_line_chars() -> usize {
    10_000
}

fn default_rerun_line_delta() -> usize {
    100
}

fn default_context_chars() -> usize {
    200
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            max_line_chars: default_max_line_chars(),
            rerun_line_delta: default_rerun_line_delta(),
            context_chars: default_context_chars(),
        }
    }
}

/// Highlight cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighlightConfig {
    /// Enable syntax highlighting for this engine (the process-wide switch must also be on)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lines longer than this (in chars) are never highlighted
    #[serde(default = "default_max_line_chars")]
    pub max_line_chars: usize,

    /// Maximum number of cached line markups
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    10_000
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_line_chars: default_max_line_chars(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Viewport geometry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewportConfig {
    /// Default height of a single line in pixels
    #[serde(default = "default_line_height_px")]
    pub line_height_px: f64,

    /// Extra rows rendered above and below the viewport
    #[serde(default = "default_overscan")]
    pub overscan: usize,
}

fn default_line_height_px() -> f64 {
    20.0
}

fn default_overscan() -> usize {
    10
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            line_height_px: default_line_height_px(),
            overscan: default_overscan(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::debug!("Loaded engine config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.viewport.line_height_px <= 0.0 {
            return Err(ConfigError::ValidationError(
                "viewport.line_height_px must be positive".to_string(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_results must be at least 1".to_string(),
            ));
        }

        if self.highlight.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "highlight.cache_capacity must be at least 1".to_string(),
            ));
        }

        if self.folding.large_buffer_prefix > self.folding.large_buffer_lines {
            return Err(ConfigError::ValidationError(format!(
                "folding.large_buffer_prefix ({}) must not exceed folding.large_buffer_lines ({})",
                self.folding.large_buffer_prefix, self.folding.large_buffer_lines
            )));
        }

        if self.loader.top_threshold_px < 0.0 || self.loader.bottom_threshold_px < 0.0 {
            return Err(ConfigError::ValidationError(
                "loader edge thresholds must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.max_results, 1000);
        assert_eq!(config.loader.lock_timeout_ms, 2000);
        assert_eq!(config.folding.large_buffer_lines, 5000);
        assert_eq!(config.folding.large_buffer_prefix, 2000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "search": { "max_results": 50 } }"#).unwrap();
        assert_eq!(config.search.max_results, 50);
        assert_eq!(config.search.max_line_chars, 10_000);
        assert_eq!(config.loader, LoaderConfig::default());
    }

    #[test]
    fn test_validation_rejects_zero_line_height() {
        let mut config = EngineConfig::default();
        config.viewport.line_height_px = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_prefix_above_threshold() {
        let mut config = EngineConfig::default();
        config.folding.large_buffer_prefix = 6_000;
        assert!(config.validate().is_err());
    }
}
