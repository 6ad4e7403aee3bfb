mod common;

use slate_core::config::SlateConfig;
use slate_core::font::{
    AtlasError, CompositeFont, FaceId, FaceMetrics, FontAtlasManager, FontCache, FontFallback, FontFace, FontInfo,
    FontMeasure, FontOutlineSettings, GlyphBitmap, SlateFontServices, Typeface,
};
use slate_core::utils::LinearColor;
use std::sync::Arc;

use common::{BlockFace, ADVANCE, AV_KERNING, FONT_SIZE, SIZE_PX};

#[test]
fn repeated_lookups_hit_the_cache() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&SlateConfig::default());

    let first = cache
        .character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE)
        .get_character('A', FontFallback::LastResortFallback);
    let second = cache
        .character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE)
        .get_character('A', FontFallback::LastResortFallback);

    assert!(first.valid);
    assert_eq!(first, second);
    assert_eq!(face.rasterizations(), 1);
    assert_eq!(cache.stats().rasterizations, 1);
    assert_eq!(first.x_advance, ADVANCE);
    assert_eq!(first.size_px, SIZE_PX);
}

#[test]
fn history_revision_bump_rasterizes_once() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&SlateConfig::default());
    let outline = FontOutlineSettings::NO_OUTLINE;

    cache.character_list(&info, 1.0, &outline).get_character('A', FontFallback::NoFallback);
    assert_eq!(face.rasterizations(), 1);

    info.font.bump_history_revision();
    let mut list = cache.character_list(&info, 1.0, &outline);
    assert!(!list.is_stale());
    let entry = list.get_character('A', FontFallback::NoFallback);
    assert!(entry.valid);
    assert_eq!(face.rasterizations(), 2);

    cache.character_list(&info, 1.0, &outline).get_character('A', FontFallback::NoFallback);
    assert_eq!(face.rasterizations(), 2);
}

#[test]
fn outlined_glyphs_are_cached_separately() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&SlateConfig::default());

    let plain = cache
        .character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE)
        .get_character('H', FontFallback::NoFallback);
    let outlined = cache
        .character_list(&info, 1.0, &FontOutlineSettings::new(2, LinearColor::BLACK))
        .get_character('H', FontFallback::NoFallback);

    assert_eq!(face.rasterizations(), 2);
    assert_eq!(outlined.u_size, plain.u_size + 4);
    assert_eq!(outlined.v_size, plain.v_size + 4);
    assert_eq!(outlined.horizontal_offset, plain.horizontal_offset);
}

#[test]
fn space_is_valid_without_area() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&SlateConfig::default());
    let entry = cache
        .character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE)
        .get_character(' ', FontFallback::NoFallback);
    assert!(entry.valid);
    assert!(!entry.has_area());
    assert_eq!(entry.x_advance, ADVANCE);
    assert_eq!(cache.atlas_manager().num_atlas_pages(), 0);
}

#[test]
fn fallback_level_bounds_the_search() {
    let latin = BlockFace::covering("Latin", |ch| ch.is_ascii_alphabetic());
    let cyrillic = BlockFace::covering("Cyrillic", |ch| ('\u{400}'..='\u{4ff}').contains(&ch));
    let latin_face: Arc<dyn FontFace> = latin.clone();
    let cyrillic_face: Arc<dyn FontFace> = cyrillic.clone();
    let font = Arc::new(
        CompositeFont::new(Typeface::single("Regular", latin_face))
            .with_fallback_typeface(Typeface::single("Regular", cyrillic_face)),
    );
    let info = FontInfo::new(font, FONT_SIZE);
    let mut cache = FontCache::new(&SlateConfig::default());
    let mut list = cache.character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE);

    assert!(!list.get_character('ж', FontFallback::NoFallback).valid);

    let localized = list.get_character('ж', FontFallback::LocalizedFallback);
    assert!(localized.valid);
    assert_eq!(localized.fallback_level, FontFallback::LocalizedFallback);
    assert_eq!(localized.font_face, Some(cyrillic.id()));

    // nobody has it, so the primary face's not-defined glyph stands in
    let last_resort = list.get_character('€', FontFallback::LastResortFallback);
    assert!(last_resort.valid);
    assert_eq!(last_resort.glyph_index, 0);
    assert_eq!(last_resort.font_face, Some(latin.id()));
}

#[test]
fn kerning_applies_between_pairs() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&SlateConfig::default());
    assert_eq!(cache.kerning(&info, 1.0, 'A', 'V'), AV_KERNING);
    assert_eq!(cache.kerning(&info, 1.0, 'V', 'A'), 0);
    assert_eq!(cache.max_character_height(&info, 1.0), SIZE_PX as i32);
    assert_eq!(cache.baseline(&info, 1.0), -4);
}

#[test]
fn atlas_manager_reports_exhaustion() {
    let mut manager = FontAtlasManager::new(64, 64, 1, 1);
    let square = GlyphBitmap {
        width: 20,
        height: 20,
        bearing_x: 0,
        bearing_y: 20,
        coverage: vec![255; 400],
    };

    let mut placements = Vec::new();
    let error = loop {
        match manager.add_new_entry(&square) {
            Ok(placement) => placements.push(placement),
            Err(error) => break error,
        }
        assert!(placements.len() <= 16, "a 64x64 page cannot hold this many glyphs");
    };

    assert_eq!(error, AtlasError::Full { pages: 1 });
    // 22 texel slots: two per shelf, two shelves
    assert_eq!(placements.len(), 4);
    for (i, a) in placements.iter().enumerate() {
        assert!(a.x + a.width <= 64 && a.y + a.height <= 64);
        for b in &placements[i + 1..] {
            let overlap = a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height;
            assert!(!overlap, "{:?} overlaps {:?}", a, b);
        }
    }
}

#[test]
fn full_atlas_degrades_to_invalid_glyphs_and_flushes() {
    let config = SlateConfig {
        atlas_page_width: 64,
        atlas_page_height: 64,
        max_atlas_pages: 1,
        ..SlateConfig::default()
    };
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&config);

    let entries: Vec<_> = {
        let mut list = cache.character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE);
        ('!'..='~')
            .map(|ch| list.get_character(ch, FontFallback::NoFallback))
            .collect()
    };

    // 6x12 glyphs in 8x14 slots: 8 per shelf, 4 shelves
    let valid = entries.iter().filter(|e| e.valid).count();
    assert_eq!(valid, 32);
    assert!(!entries[32].valid);
    assert!(cache.is_flush_requested());
    assert_eq!(cache.atlas_manager().num_atlas_pages(), 1);

    assert!(cache.conditional_flush_cache());
    assert_eq!(cache.stats().flushes, 1);
    assert_eq!(cache.atlas_manager().num_atlas_pages(), 0);
    assert!(!cache.is_flush_requested());

    let retry = cache
        .character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE)
        .get_character(entries[32].character, FontFallback::NoFallback);
    assert!(retry.valid);
}

#[test]
fn threshold_flush_right_after_a_flush_raises_the_limit() {
    let config = SlateConfig {
        atlas_page_width: 64,
        atlas_page_height: 64,
        max_atlas_pages: 4,
        max_atlas_pages_before_flush_request: 1,
        ..SlateConfig::default()
    };
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&config);

    let fill = |cache: &mut FontCache| {
        let mut list = cache.character_list(&info, 1.0, &FontOutlineSettings::NO_OUTLINE);
        for ch in '!'..='~' {
            list.get_character(ch, FontFallback::NoFallback);
        }
    };

    fill(&mut cache);
    assert_eq!(cache.atlas_manager().num_atlas_pages(), 3);
    assert!(cache.conditional_flush_cache());

    fill(&mut cache);
    assert!(!cache.conditional_flush_cache());
    assert_eq!(cache.atlas_manager().num_atlas_pages(), 3);
    assert_eq!(cache.stats().flushes, 1);
}

#[test]
fn flush_requests_reach_both_thread_caches() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut services = SlateFontServices::new(&SlateConfig::default());
    let mut render_cache = services.take_render_thread_font_cache().expect("render cache");
    assert!(services.take_render_thread_font_cache().is_none());

    services.game_thread_font_cache().max_character_height(&info, 1.0);
    render_cache.max_character_height(&info, 1.0);

    services.flush_composite_font(&info.font);
    assert!(services.game_thread_font_cache().conditional_flush_cache());
    assert!(render_cache.conditional_flush_cache());

    // nothing references the font any more
    services.flush_composite_font(&info.font);
    assert!(!render_cache.conditional_flush_cache());
}

#[test]
fn measure_follows_advances_lines_and_kerning() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&SlateConfig::default());
    let mut measure = FontMeasure::new(&mut cache);

    let size = measure.measure("AB", &info, 1.0);
    assert_eq!((size.width, size.height), (16.0, 16.0));

    let size = measure.measure("A\nBCD", &info, 1.0);
    assert_eq!((size.width, size.height), (24.0, 32.0));

    let size = measure.measure("AV", &info, 1.0);
    assert_eq!(size.width, 14.0);

    let size = measure.measure_range("ABCD", 1, 3, &info, 1.0);
    assert_eq!(size.width, 16.0);

    // scale 2 rasterizes twice as large but reports layout units
    let size = measure.measure("AB", &info, 2.0);
    assert_eq!((size.width, size.height), (16.0, 16.0));

    assert_eq!(measure.find_character_index_at_offset("ABC", &info, 3.0, 1.0), 0);
    assert_eq!(measure.find_character_index_at_offset("ABC", &info, 9.0, 1.0), 1);
    assert_eq!(measure.find_character_index_at_offset("ABC", &info, 100.0, 1.0), 3);
    assert_eq!(measure.find_character_index_at_offset("AB\nC", &info, 100.0, 1.0), 2);

    assert_eq!(measure.max_character_height(&info, 1.0), 16.0);
    assert_eq!(measure.kerning(&info, 1.0, 'A', 'V'), -2.0);
}

/// Reports bitmaps one coverage byte short of their size.
struct TruncatingFace(Arc<BlockFace>);

impl FontFace for TruncatingFace {
    fn id(&self) -> FaceId {
        self.0.id()
    }

    fn name(&self) -> &str {
        "Truncating"
    }

    fn glyph_index(&self, ch: char) -> Option<u32> {
        self.0.glyph_index(ch)
    }

    fn metrics(&self, size_px: f32) -> FaceMetrics {
        self.0.metrics(size_px)
    }

    fn advance(&self, glyph_index: u32, size_px: f32) -> f32 {
        self.0.advance(glyph_index, size_px)
    }

    fn rasterize(&self, glyph_index: u32, size_px: f32) -> Option<GlyphBitmap> {
        let mut bitmap = self.0.rasterize(glyph_index, size_px)?;
        bitmap.coverage.pop();
        Some(bitmap)
    }
}

#[test]
fn short_coverage_gives_an_invalid_glyph() {
    let face: Arc<dyn FontFace> = Arc::new(TruncatingFace(BlockFace::ascii("Block")));
    let font = Arc::new(CompositeFont::new(Typeface::single("Regular", face)));
    let info = FontInfo::new(font, FONT_SIZE);
    let mut cache = FontCache::new(&SlateConfig::default());

    for outline in [FontOutlineSettings::NO_OUTLINE, FontOutlineSettings::new(1, LinearColor::BLACK)] {
        let entry = cache
            .character_list(&info, 1.0, &outline)
            .get_character('A', FontFallback::NoFallback);
        assert!(!entry.valid);
    }
    assert_eq!(cache.atlas_manager().num_atlas_pages(), 0);
    assert!(!cache.is_flush_requested());

    let short = GlyphBitmap {
        width: 4,
        height: 4,
        bearing_x: 0,
        bearing_y: 4,
        coverage: vec![255; 10],
    };
    let mut manager = FontAtlasManager::new(64, 64, 1, 1);
    assert_eq!(
        manager.add_new_entry(&short),
        Err(AtlasError::MalformedBitmap {
            width: 4,
            height: 4,
            len: 10
        })
    );
    assert_eq!(short.dilated(1).coverage.len(), 36);
}
