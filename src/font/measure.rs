use crate::utils::Size;

use super::{FontCache, FontInfo};

/// Text measurement through the character lists of a [`FontCache`].
pub struct FontMeasure<'a> {
    cache: &'a mut FontCache,
}

impl<'a> FontMeasure<'a> {
    pub fn new(cache: &'a mut FontCache) -> Self {
        Self { cache }
    }

    /// Size of `text` laid out the way the legacy text path draws it: lines
    /// split on `\n`, each line `max_character_height` tall.
    pub fn measure(&mut self, text: &str, font_info: &FontInfo, font_scale: f32) -> Size {
        let char_count = text.chars().count();
        self.measure_range(text, 0, char_count, font_info, font_scale)
    }

    /// Same as [`FontMeasure::measure`] for the characters `[start, end)`.
    pub fn measure_range(
        &mut self,
        text: &str,
        start: usize,
        end: usize,
        font_info: &FontInfo,
        font_scale: f32,
    ) -> Size {
        let fallback = font_info.fallback;
        let mut list = self.cache
            .character_list(font_info, font_scale, &font_info.outline);
        let max_height = list.max_height();

        let mut widest = 0;
        let mut line_width = 0;
        let mut lines = 1;
        let mut previous = None;
        for ch in text.chars().skip(start).take(end.saturating_sub(start)) {
            if ch == '\n' {
                widest = widest.max(line_width);
                line_width = 0;
                lines += 1;
                previous = None;
                continue;
            }
            let entry = list.get_character(ch, fallback);
            if let Some(previous) = previous {
                line_width += list.get_kerning(&previous, &entry);
            }
            line_width += entry.x_advance;
            previous = Some(entry);
        }
        widest = widest.max(line_width);

        let inv_scale = if font_scale != 0.0 { 1.0 / font_scale } else { 1.0 };
        Size::new(
            widest as f32 * inv_scale,
            (lines * max_height) as f32 * inv_scale,
        )
    }

    /// Character index whose left half contains `horizontal_offset`, or the
    /// text length when the offset is past the end of the first line.
    pub fn find_character_index_at_offset(
        &mut self,
        text: &str,
        font_info: &FontInfo,
        horizontal_offset: f32,
        font_scale: f32,
    ) -> usize {
        let fallback = font_info.fallback;
        let mut list = self.cache
            .character_list(font_info, font_scale, &font_info.outline);
        let offset = horizontal_offset * font_scale;
        let mut current = 0;
        let mut previous = None;
        for (index, ch) in text.chars().enumerate() {
            if ch == '\n' {
                return index;
            }
            let entry = list.get_character(ch, fallback);
            let kerning = previous.map(|p| list.get_kerning(&p, &entry)).unwrap_or(0);
            let advance = kerning + entry.x_advance;
            if offset < (current + advance / 2) as f32 {
                return index;
            }
            current += advance;
            previous = Some(entry);
        }
        text.chars().count()
    }

    pub fn max_character_height(&mut self, font_info: &FontInfo, font_scale: f32) -> f32 {
        let height = self.cache.max_character_height(font_info, font_scale);
        height as f32 / font_scale.max(f32::EPSILON)
    }

    pub fn baseline(&mut self, font_info: &FontInfo, font_scale: f32) -> f32 {
        let baseline = self.cache.baseline(font_info, font_scale);
        baseline as f32 / font_scale.max(f32::EPSILON)
    }

    pub fn kerning(&mut self, font_info: &FontInfo, font_scale: f32, first: char, second: char) -> f32 {
        let kerning = self.cache.kerning(font_info, font_scale, first, second);
        kerning as f32 / font_scale.max(f32::EPSILON)
    }
}
