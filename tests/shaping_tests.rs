mod common;

use slate_core::config::SlateConfig;
use slate_core::font::{
    EnumerateGlyphsResult, FontCache, FontOutlineSettings, ShapedGlyphSequence, TextDirection, TextShapingMethod,
};
use slate_core::utils::LinearColor;

use common::{BlockFace, ADVANCE, AV_KERNING};

fn shape(cache: &mut FontCache, text: &str, direction: TextDirection) -> ShapedGlyphSequence {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let count = text.chars().count();
    cache.shape_unidirectional_text(text, 0..count, &info, 1.0, direction, Some(TextShapingMethod::KerningOnly))
}

#[test]
fn kerning_is_folded_into_the_previous_advance() {
    let mut cache = FontCache::new(&SlateConfig::default());
    let sequence = shape(&mut cache, "AV B", TextDirection::LeftToRight);

    let glyphs = sequence.glyphs_to_render();
    assert_eq!(glyphs.len(), 4);
    assert_eq!(glyphs[0].x_advance, ADVANCE + AV_KERNING);
    assert_eq!(glyphs[0].kerning, AV_KERNING);
    assert_eq!(glyphs[1].x_advance, ADVANCE);
    assert!(!glyphs[2].is_visible);
    assert!(glyphs[3].is_visible);
    assert_eq!(sequence.measured_width(), 4 * ADVANCE + AV_KERNING);
    assert_eq!(sequence.max_text_height(), 16);
    assert_eq!(sequence.text_baseline(), -4);
}

#[test]
fn range_widths_and_sub_sequences() {
    let mut cache = FontCache::new(&SlateConfig::default());
    let sequence = shape(&mut cache, "AV B", TextDirection::LeftToRight);

    assert_eq!(sequence.measured_width_range(1, 3, false), Some(2 * ADVANCE));
    assert_eq!(sequence.measured_width_range(1, 3, true), Some(2 * ADVANCE + AV_KERNING));
    assert_eq!(sequence.measured_width_range(2, 9, false), None);
    assert_eq!(sequence.kerning(0), Some(AV_KERNING));

    let mut visited = Vec::new();
    let result = sequence.enumerate_logical_glyphs_in_source_range(1, 4, |glyph, _| {
        visited.push(glyph.source_index);
        glyph.source_index < 2
    });
    assert_eq!(result, EnumerateGlyphsResult::Aborted);
    assert_eq!(visited, vec![1, 2]);
    assert_eq!(
        sequence.enumerate_visual_glyphs_in_source_range(3, 5, |_, _| true),
        EnumerateGlyphsResult::Failed
    );

    let tail = sequence.sub_sequence(2, 4).expect("tail");
    assert_eq!(tail.glyphs_to_render().len(), 2);
    assert_eq!(tail.measured_width(), 2 * ADVANCE);
    assert_eq!(tail.source_range(), 2..4);
    assert!(sequence.sub_sequence(3, 8).is_none());
}

#[test]
fn hit_testing_picks_the_nearest_caret() {
    let mut cache = FontCache::new(&SlateConfig::default());
    let sequence = shape(&mut cache, "AV B", TextDirection::LeftToRight);

    // 'A' spans [0, 6) once kerned, 'V' spans [6, 14)
    let hit = sequence.glyph_at_offset(7, 0).expect("hit");
    assert_eq!((hit.glyph_index, hit.character_index), (1, 1));
    let hit = sequence.glyph_at_offset(12, 0).expect("hit");
    assert_eq!((hit.glyph_index, hit.character_index), (1, 2));
    let hit = sequence.glyph_at_offset(500, 0).expect("past the end");
    assert_eq!((hit.glyph_index, hit.character_index), (3, 4));
    let hit = sequence.glyph_at_offset(7, 10).expect("shifted start");
    assert_eq!(hit.character_index, 0);
}

#[test]
fn right_to_left_runs_are_reversed() {
    let mut cache = FontCache::new(&SlateConfig::default());
    let sequence = shape(&mut cache, "ABC", TextDirection::RightToLeft);

    let order: Vec<_> = sequence.glyphs_to_render().iter().map(|g| g.source_index).collect();
    assert_eq!(order, vec![2, 1, 0]);

    // the left half of the leftmost glyph is the trailing side of 'C'
    let hit = sequence.glyph_at_offset(1, 0).expect("hit");
    assert_eq!(hit.glyph_index, 0);
    assert_eq!(hit.character_index, 3);
    assert_eq!(hit.text_direction, TextDirection::RightToLeft);
}

#[test]
fn bidirectional_text_is_split_into_visual_runs() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut cache = FontCache::new(&SlateConfig::default());
    let text = "ab \u{5d0}\u{5d1}";
    let sequence = cache.shape_bidirectional_text(text, 0..5, &info, 1.0, TextDirection::LeftToRight, None);

    let glyphs = sequence.glyphs_to_render();
    let order: Vec<_> = glyphs.iter().map(|g| g.source_index).collect();
    assert_eq!(order, vec![0, 1, 2, 4, 3]);
    assert_eq!(glyphs[0].text_direction, TextDirection::LeftToRight);
    assert_eq!(glyphs[4].text_direction, TextDirection::RightToLeft);
    // no face covers Hebrew, so the not-defined glyph stands in
    assert_eq!(glyphs[3].glyph_index, 0);
}

#[test]
fn shaped_glyphs_are_rasterized_once() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face).with_outline(FontOutlineSettings::new(1, LinearColor::BLACK));
    let mut cache = FontCache::new(&SlateConfig::default());
    let sequence = cache.shape_unidirectional_text("AA ", 0..3, &info, 1.0, TextDirection::LeftToRight, None);
    assert_eq!(sequence.outline_settings().outline_size, 1);

    let glyphs = sequence.glyphs_to_render();
    let first = cache.get_shaped_glyph_font_atlas_data(&glyphs[0], &FontOutlineSettings::NO_OUTLINE);
    let second = cache.get_shaped_glyph_font_atlas_data(&glyphs[1], &FontOutlineSettings::NO_OUTLINE);
    assert!(first.has_area());
    assert_eq!(first, second);
    assert_eq!(face.rasterizations(), 1);

    let outlined = cache.get_shaped_glyph_font_atlas_data(&glyphs[0], sequence.outline_settings());
    assert_eq!(outlined.u_size, first.u_size + 2);
    assert_eq!(face.rasterizations(), 2);

    let space = cache.get_shaped_glyph_font_atlas_data(&glyphs[2], &FontOutlineSettings::NO_OUTLINE);
    assert!(space.valid);
    assert!(!space.has_area());

    assert!(cache.get_slate_texture_resource(first.texture_index).is_some());
}

#[test]
fn glyphs_of_an_unloaded_face_are_invalid() {
    let mut cache = FontCache::new(&SlateConfig::default());
    // the face is released once shaping returns
    let sequence = shape(&mut cache, "A", TextDirection::LeftToRight);

    let glyph = &sequence.glyphs_to_render()[0];
    assert!(glyph.face_data.face().is_none());
    let data = cache.get_shaped_glyph_font_atlas_data(glyph, &FontOutlineSettings::NO_OUTLINE);
    assert!(!data.valid);
    assert_eq!(cache.atlas_manager().num_atlas_pages(), 0);
}
