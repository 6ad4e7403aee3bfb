use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::font::TextShapingMethod;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Knobs for the batcher and the font caches. Every field has a default so a
/// partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlateConfig {
    pub atlas_page_width: u32,
    pub atlas_page_height: u32,
    /// Empty texels kept around every glyph in an atlas page
    pub glyph_padding: u32,
    pub max_atlas_pages_before_flush_request: usize,
    /// Hard limit; placing a glyph fails once every page is full
    pub max_atlas_pages: usize,
    pub max_non_atlased_textures_before_flush_request: usize,
    pub default_shaping_method: TextShapingMethod,
    pub feathering: bool,
    pub pixel_center_offset: f32,
    pub vertex_color_in_linear_space: bool,
}

impl Default for SlateConfig {
    fn default() -> Self {
        Self {
            atlas_page_width: 1024,
            atlas_page_height: 1024,
            glyph_padding: 1,
            max_atlas_pages_before_flush_request: 1,
            max_atlas_pages: 4,
            max_non_atlased_textures_before_flush_request: 1,
            default_shaping_method: TextShapingMethod::Auto,
            feathering: false,
            pixel_center_offset: 0.0,
            vertex_color_in_linear_space: true,
        }
    }
}

impl SlateConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SlateConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atlas_page_width == 0 || self.atlas_page_height == 0 {
            return Err(ConfigError::Invalid {
                field: "atlas_page_size",
                reason: format!(
                    "{}x{} has no area",
                    self.atlas_page_width, self.atlas_page_height
                ),
            });
        }
        if self.max_atlas_pages_before_flush_request == 0 {
            return Err(ConfigError::Invalid {
                field: "max_atlas_pages_before_flush_request",
                reason: "must allow at least one page".to_string(),
            });
        }
        if self.max_atlas_pages < self.max_atlas_pages_before_flush_request {
            return Err(ConfigError::Invalid {
                field: "max_atlas_pages",
                reason: format!(
                    "{} is below the flush threshold of {}",
                    self.max_atlas_pages, self.max_atlas_pages_before_flush_request
                ),
            });
        }
        if 2 * self.glyph_padding >= self.atlas_page_width.min(self.atlas_page_height) {
            return Err(ConfigError::Invalid {
                field: "glyph_padding",
                reason: format!("{} leaves no room in a page", self.glyph_padding),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "atlas_page_width": 256, "feathering": true }"#;
        let config = SlateConfig::from_json_str(json).expect("parse");
        assert_eq!(config.atlas_page_width, 256);
        assert_eq!(config.atlas_page_height, 1024);
        assert!(config.feathering);
        assert_eq!(config.default_shaping_method, TextShapingMethod::Auto);
    }

    #[test]
    fn shaping_method_parses_by_name() {
        let json = r#"{ "default_shaping_method": "KerningOnly" }"#;
        let config = SlateConfig::from_json_str(json).expect("parse");
        assert_eq!(config.default_shaping_method, TextShapingMethod::KerningOnly);
    }

    #[test]
    fn zero_sized_pages_are_rejected() {
        let json = r#"{ "atlas_page_width": 0 }"#;
        assert!(matches!(
            SlateConfig::from_json_str(json),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
