use std::collections::HashMap;

use crate::resources::ShaderResource;

use super::cache::GlyphStore;
use super::{font_size_to_pixels, FaceId, FontFallback, FontInfo, FontOutlineSettings};

/// A character as the legacy text path sees it: atlas placement plus
/// horizontal metrics, all in pixels at the list's scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterEntry {
    pub character: char,
    pub glyph_index: u32,
    pub font_face: Option<FaceId>,
    pub size_px: f32,
    pub fallback_level: FontFallback,
    pub texture_index: usize,
    pub start_u: u32,
    pub start_v: u32,
    pub u_size: u32,
    pub v_size: u32,
    pub vertical_offset: i32,
    pub horizontal_offset: i32,
    pub global_descender: i32,
    pub x_advance: i32,
    pub valid: bool,
}

impl CharacterEntry {
    fn invalid(character: char) -> Self {
        Self {
            character,
            glyph_index: 0,
            font_face: None,
            size_px: 0.0,
            fallback_level: FontFallback::NoFallback,
            texture_index: 0,
            start_u: 0,
            start_v: 0,
            u_size: 0,
            v_size: 0,
            vertical_offset: 0,
            horizontal_offset: 0,
            global_descender: 0,
            x_advance: 0,
            valid: false,
        }
    }

    /// Whether the entry has pixels in a texture.
    pub fn has_area(&self) -> bool {
        self.valid && self.u_size > 0 && self.v_size > 0
    }
}

/// Per (font, scale, outline) cache of character entries and kerning pairs.
#[derive(Debug)]
pub(crate) struct CharacterList {
    font_info: FontInfo,
    font_scale: f32,
    outline: FontOutlineSettings,
    revision: u32,
    entries: HashMap<(char, FontFallback), CharacterEntry>,
    kerning: HashMap<(char, char), i32>,
    max_height: Option<i32>,
    baseline: Option<i32>,
}

impl CharacterList {
    pub(crate) fn new(font_info: &FontInfo, font_scale: f32, outline: FontOutlineSettings) -> Self {
        Self {
            font_info: font_info.clone(),
            font_scale,
            outline,
            revision: font_info.font.history_revision(),
            entries: HashMap::new(),
            kerning: HashMap::new(),
            max_height: None,
            baseline: None,
        }
    }

    pub(crate) fn is_stale(&self) -> bool {
        self.revision != self.font_info.font.history_revision()
    }

    pub(crate) fn font_info(&self) -> &FontInfo {
        &self.font_info
    }

    fn size_px(&self) -> f32 {
        font_size_to_pixels(self.font_info.size, self.font_scale)
    }
}

/// Borrow of one character list together with the glyph storage it
/// rasterizes into.
pub struct CharacterListView<'a> {
    pub(crate) list: &'a mut CharacterList,
    pub(crate) store: &'a mut GlyphStore,
}

impl CharacterListView<'_> {
    pub fn is_stale(&self) -> bool {
        self.list.is_stale()
    }

    /// Entry for `ch`, rasterizing it on first use. Characters no face can
    /// render come back invalid.
    pub fn get_character(&mut self, ch: char, max_fallback: FontFallback) -> CharacterEntry {
        if let Some(entry) = self.list.entries.get(&(ch, max_fallback)) {
            return *entry;
        }

        let font_info = &self.list.font_info;
        let Some(resolved) =
            font_info
                .font
                .resolve_face(font_info.typeface_name.as_deref(), ch, max_fallback)
        else {
            let entry = CharacterEntry::invalid(ch);
            self.list.entries.insert((ch, max_fallback), entry);
            return entry;
        };

        let size_px = self.list.size_px();
        let outline_px = (self.list.outline.outline_size as f32 * self.list.font_scale)
            .round()
            .max(0.0) as u32;
        let atlas_data =
            self.store
                .add_new_entry(resolved.face.as_ref(), resolved.glyph_index, size_px, outline_px);
        let metrics = resolved.face.metrics(size_px);

        let entry = CharacterEntry {
            character: ch,
            glyph_index: resolved.glyph_index,
            font_face: Some(resolved.face.id()),
            size_px,
            fallback_level: resolved.fallback_level,
            texture_index: atlas_data.texture_index,
            start_u: atlas_data.start_u,
            start_v: atlas_data.start_v,
            u_size: atlas_data.u_size,
            v_size: atlas_data.v_size,
            vertical_offset: atlas_data.vertical_offset,
            horizontal_offset: atlas_data.horizontal_offset,
            global_descender: metrics.descender.floor() as i32,
            x_advance: resolved.face.advance(resolved.glyph_index, size_px).round() as i32,
            valid: atlas_data.valid,
        };
        // a failed placement is retried once the cache has been flushed
        if entry.valid {
            self.list.entries.insert((ch, max_fallback), entry);
        }
        entry
    }

    /// Kerning between two entries, zero unless both come from the same face.
    pub fn get_kerning(&mut self, first: &CharacterEntry, second: &CharacterEntry) -> i32 {
        let (Some(first_face), Some(second_face)) = (first.font_face, second.font_face) else {
            return 0;
        };
        if !first.valid || !second.valid || first_face != second_face {
            return 0;
        }
        let pair = (first.character, second.character);
        if let Some(kerning) = self.list.kerning.get(&pair) {
            return *kerning;
        }
        let kerning = self
            .list
            .font_info
            .font
            .face_by_id(first_face)
            .map(|face| {
                face.kerning(first.glyph_index, second.glyph_index, first.size_px)
                    .round() as i32
            })
            .unwrap_or(0);
        self.list.kerning.insert(pair, kerning);
        kerning
    }

    pub fn get_kerning_chars(&mut self, first: char, second: char, max_fallback: FontFallback) -> i32 {
        let a = self.get_character(first, max_fallback);
        let b = self.get_character(second, max_fallback);
        self.get_kerning(&a, &b)
    }

    /// Line height of the primary face, in whole pixels.
    pub fn max_height(&mut self) -> i32 {
        if let Some(height) = self.list.max_height {
            return height;
        }
        let size_px = self.list.size_px();
        let height = self
            .list
            .font_info
            .font
            .primary_face(self.list.font_info.typeface_name.as_deref())
            .map(|face| face.metrics(size_px).line_height.ceil() as i32)
            .unwrap_or(0);
        self.list.max_height = Some(height);
        height
    }

    /// Descender of the primary face, negative.
    pub fn baseline(&mut self) -> i32 {
        if let Some(baseline) = self.list.baseline {
            return baseline;
        }
        let size_px = self.list.size_px();
        let baseline = self
            .list
            .font_info
            .font
            .primary_face(self.list.font_info.typeface_name.as_deref())
            .map(|face| face.metrics(size_px).descender.floor() as i32)
            .unwrap_or(0);
        self.list.baseline = Some(baseline);
        baseline
    }

    pub fn texture_resource(&self, texture_index: usize) -> Option<ShaderResource> {
        self.store.texture_resource(texture_index)
    }
}
