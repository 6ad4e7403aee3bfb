mod atlas;
mod cache;
mod character_list;
mod composite;
mod face;
mod measure;
mod services;
mod shaping;

pub use atlas::{AtlasError, AtlasPlacement, FontAtlasManager, FontTexture, SlateTextureAtlas};
pub use cache::{
    FlushTarget, FontCache, FontCacheFlushHandle, FontCacheStats, ShapedGlyphFontAtlasData,
};
pub use character_list::{CharacterEntry, CharacterListView};
pub use composite::{CompositeFont, CompositeFontId, ResolvedFace, SubTypeface, Typeface, TypefaceEntry};
pub use face::{FaceId, FaceMetrics, FaceShapedGlyph, FontFace, GlyphBitmap, TrueTypeFace};
pub use measure::FontMeasure;
pub use services::SlateFontServices;
pub use shaping::{
    EnumerateGlyphsResult, GlyphOffsetResult, ShapedGlyphEntry, ShapedGlyphFaceData, ShapedGlyphSequence, TextShaper,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::resources::ResourceId;
use crate::utils::LinearColor;

/// Glyphs are rasterized as if the display had this many dots per inch.
pub const FONT_RENDER_DPI: f32 = 96.0;

/// Point size to pixel size at the render dpi.
pub fn font_size_to_pixels(size: f32, scale: f32) -> f32 {
    size * scale * FONT_RENDER_DPI / 72.0
}

#[derive(thiserror::Error, Debug)]
pub enum FontError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid font data for {0}")]
    InvalidFontData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextShapingMethod {
    /// Full shaping when the face supports it, kerning otherwise
    Auto,
    /// Per character advance plus pair kerning
    KerningOnly,
    FullShaping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextDirection {
    LeftToRight,
    RightToLeft,
}

/// How far along the composite font chain a character may be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FontFallback {
    /// Only the typeface assigned to the character's range
    NoFallback,
    /// Also the composite font's fallback typeface
    LocalizedFallback,
    /// Any face of the composite font, then its not-defined glyph
    LastResortFallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontOutlineSettings {
    /// pixels at scale 1
    pub outline_size: i32,
    pub outline_color: LinearColor,
    pub separate_fill_alpha: bool,
}

impl Default for FontOutlineSettings {
    fn default() -> Self {
        Self {
            outline_size: 0,
            outline_color: LinearColor::BLACK,
            separate_fill_alpha: false,
        }
    }
}

impl FontOutlineSettings {
    pub const NO_OUTLINE: FontOutlineSettings = FontOutlineSettings {
        outline_size: 0,
        outline_color: LinearColor::BLACK,
        separate_fill_alpha: false,
    };

    pub fn new(outline_size: i32, outline_color: LinearColor) -> Self {
        Self {
            outline_size,
            outline_color,
            separate_fill_alpha: false,
        }
    }
}

/// A font request: which composite font, at what point size, with which
/// outline.
#[derive(Debug, Clone)]
pub struct FontInfo {
    pub font: Arc<CompositeFont>,
    pub typeface_name: Option<String>,
    /// points
    pub size: f32,
    pub outline: FontOutlineSettings,
    pub fallback: FontFallback,
    pub font_material: Option<ResourceId>,
}

impl FontInfo {
    pub fn new(font: Arc<CompositeFont>, size: f32) -> Self {
        Self {
            font,
            typeface_name: None,
            size,
            outline: FontOutlineSettings::default(),
            fallback: FontFallback::LastResortFallback,
            font_material: None,
        }
    }

    pub fn with_outline(mut self, outline: FontOutlineSettings) -> Self {
        self.outline = outline;
        self
    }

    pub fn with_typeface(mut self, name: impl Into<String>) -> Self {
        self.typeface_name = Some(name.into());
        self
    }

    pub fn with_fallback(mut self, fallback: FontFallback) -> Self {
        self.fallback = fallback;
        self
    }
}
