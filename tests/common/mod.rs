#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use slate_core::config::SlateConfig;
use slate_core::element_batcher::{ElementBatcher, RenderingPolicy};
use slate_core::font::{CompositeFont, FaceId, FaceMetrics, FontCache, FontFace, FontInfo, GlyphBitmap, Typeface};
use slate_core::draw_elements::WindowElementList;

/// 12 points is 16 pixels at scale 1.
pub const FONT_SIZE: f32 = 12.0;
pub const SIZE_PX: f32 = 16.0;
/// advance of every glyph at [`SIZE_PX`]
pub const ADVANCE: i32 = 8;
/// left bearing of every inked glyph
pub const BEARING_X: i32 = 1;
/// kerning applied between 'A' and 'V'
pub const AV_KERNING: i32 = -2;

/// Face with a fixed box for every glyph. Each character maps to its code
/// point as glyph index and glyph 0 is the not-defined box.
pub struct BlockFace {
    id: FaceId,
    name: String,
    covers: fn(char) -> bool,
    rasterizations: AtomicUsize,
}

impl BlockFace {
    pub fn ascii(name: &str) -> Arc<Self> {
        Self::covering(name, |ch| ch.is_ascii() && !ch.is_ascii_control())
    }

    pub fn covering(name: &str, covers: fn(char) -> bool) -> Arc<Self> {
        Arc::new(Self {
            id: FaceId::new(),
            name: name.to_string(),
            covers,
            rasterizations: AtomicUsize::new(0),
        })
    }

    pub fn rasterizations(&self) -> usize {
        self.rasterizations.load(Ordering::SeqCst)
    }
}

impl FontFace for BlockFace {
    fn id(&self) -> FaceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn glyph_index(&self, ch: char) -> Option<u32> {
        (self.covers)(ch).then_some(ch as u32)
    }

    fn metrics(&self, size_px: f32) -> FaceMetrics {
        FaceMetrics {
            ascender: size_px * 0.75,
            descender: -size_px * 0.25,
            line_height: size_px,
        }
    }

    fn advance(&self, _glyph_index: u32, size_px: f32) -> f32 {
        size_px * 0.5
    }

    fn kerning(&self, left: u32, right: u32, size_px: f32) -> f32 {
        if left == 'A' as u32 && right == 'V' as u32 {
            AV_KERNING as f32 * size_px / SIZE_PX
        } else {
            0.0
        }
    }

    fn rasterize(&self, glyph_index: u32, size_px: f32) -> Option<GlyphBitmap> {
        self.rasterizations.fetch_add(1, Ordering::SeqCst);
        if glyph_index == ' ' as u32 {
            return Some(GlyphBitmap::default());
        }
        let width = (size_px * 0.375).round() as u32;
        let height = (size_px * 0.75).round() as u32;
        Some(GlyphBitmap {
            width,
            height,
            bearing_x: BEARING_X,
            bearing_y: height as i32,
            coverage: vec![255; (width * height) as usize],
        })
    }
}

pub fn composite(face: &Arc<BlockFace>) -> Arc<CompositeFont> {
    let face: Arc<dyn FontFace> = face.clone();
    Arc::new(CompositeFont::new(Typeface::single("Regular", face)))
}

pub fn font_info(face: &Arc<BlockFace>) -> FontInfo {
    FontInfo::new(composite(face), FONT_SIZE)
}

pub fn policy(config: SlateConfig) -> RenderingPolicy {
    let font_cache = FontCache::new(&config);
    RenderingPolicy::new(config, font_cache)
}

/// Runs one batching pass over `list` with a fresh batcher.
pub fn batch(policy: &mut RenderingPolicy, list: &mut WindowElementList) -> ElementBatcher {
    let mut batcher = ElementBatcher::new();
    batcher.add_elements(policy, list);
    batcher
}
