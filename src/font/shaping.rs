use std::ops::Range;
use std::sync::{Arc, Weak};
use unicode_bidi::{BidiInfo, Level};

use crate::resources::ResourceId;

use super::{
    font_size_to_pixels, FaceId, FontFace, FontInfo, FontOutlineSettings, ResolvedFace,
    TextDirection, TextShapingMethod,
};

/// Which face and size a shaped glyph was produced with. Shared by every
/// glyph of a font run; the face is held weakly so any cache can rasterize
/// the glyph for as long as the font is loaded.
#[derive(Debug, Clone)]
pub struct ShapedGlyphFaceData {
    pub face: Weak<dyn FontFace>,
    pub face_id: FaceId,
    /// points
    pub font_size: f32,
    pub font_scale: f32,
}

impl ShapedGlyphFaceData {
    pub fn new(face: &Arc<dyn FontFace>, font_size: f32, font_scale: f32) -> Self {
        Self {
            face: Arc::downgrade(face),
            face_id: face.id(),
            font_size,
            font_scale,
        }
    }

    pub fn size_px(&self) -> f32 {
        font_size_to_pixels(self.font_size, self.font_scale)
    }

    /// `None` once the face has been unloaded.
    pub fn face(&self) -> Option<Arc<dyn FontFace>> {
        self.face.upgrade()
    }
}

impl PartialEq for ShapedGlyphFaceData {
    fn eq(&self, other: &Self) -> bool {
        self.face_id == other.face_id && self.font_size == other.font_size && self.font_scale == other.font_scale
    }
}

/// One positioned glyph, in whole pixels at the shaping scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedGlyphEntry {
    pub face_data: Arc<ShapedGlyphFaceData>,
    pub glyph_index: u32,
    /// character index into the source string
    pub source_index: usize,
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
    /// kerning with the following glyph, already folded into `x_advance`
    pub kerning: i32,
    /// zero for the extra glyphs of a cluster
    pub num_characters_in_glyph: u8,
    pub text_direction: TextDirection,
    pub is_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphOffsetResult {
    /// index into [`ShapedGlyphSequence::glyphs_to_render`]
    pub glyph_index: usize,
    /// caret position in the source string closest to the offset
    pub character_index: usize,
    pub text_direction: TextDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerateGlyphsResult {
    /// the range was not covered by this sequence
    Failed,
    Aborted,
    Complete,
}

/// A run of shaped glyphs in visual order, plus the lookups needed to map
/// between glyphs and source characters.
#[derive(Debug, Clone)]
pub struct ShapedGlyphSequence {
    glyphs: Vec<ShapedGlyphEntry>,
    text_baseline: i32,
    max_text_height: i32,
    font_material: Option<ResourceId>,
    outline_settings: FontOutlineSettings,
    sequence_width: i32,
    source_range: Range<usize>,
    source_to_glyphs: Vec<Vec<usize>>,
}

impl ShapedGlyphSequence {
    pub fn new(
        glyphs: Vec<ShapedGlyphEntry>,
        text_baseline: i32,
        max_text_height: i32,
        font_material: Option<ResourceId>,
        outline_settings: FontOutlineSettings,
        source_range: Range<usize>,
    ) -> Self {
        let sequence_width = glyphs.iter().map(|g| g.x_advance).sum();
        let mut source_to_glyphs = vec![Vec::new(); source_range.len()];
        for (glyph_index, glyph) in glyphs.iter().enumerate() {
            if let Some(slot) = glyph
                .source_index
                .checked_sub(source_range.start)
                .and_then(|i| source_to_glyphs.get_mut(i))
            {
                slot.push(glyph_index);
            }
        }
        Self {
            glyphs,
            text_baseline,
            max_text_height,
            font_material,
            outline_settings,
            sequence_width,
            source_range,
            source_to_glyphs,
        }
    }

    pub fn glyphs_to_render(&self) -> &[ShapedGlyphEntry] {
        &self.glyphs
    }

    /// Descender of the tallest face, negative.
    pub fn text_baseline(&self) -> i32 {
        self.text_baseline
    }

    pub fn max_text_height(&self) -> i32 {
        self.max_text_height
    }

    pub fn font_material(&self) -> Option<ResourceId> {
        self.font_material
    }

    pub fn outline_settings(&self) -> &FontOutlineSettings {
        &self.outline_settings
    }

    pub fn source_range(&self) -> Range<usize> {
        self.source_range.clone()
    }

    pub fn measured_width(&self) -> i32 {
        self.sequence_width
    }

    fn covers(&self, start: usize, end: usize) -> bool {
        start <= end && start >= self.source_range.start && end <= self.source_range.end
    }

    /// First glyph produced for the character at `source_index`.
    pub fn glyph_for_source_index(&self, source_index: usize) -> Option<&ShapedGlyphEntry> {
        let slot = source_index.checked_sub(self.source_range.start)?;
        let glyph_index = *self.source_to_glyphs.get(slot)?.first()?;
        self.glyphs.get(glyph_index)
    }

    /// Width of the characters `[start, end)`. With
    /// `include_kerning_with_preceding_glyph` the kerning between the glyph
    /// before `start` and the first glyph is counted too.
    pub fn measured_width_range(
        &self,
        start: usize,
        end: usize,
        include_kerning_with_preceding_glyph: bool,
    ) -> Option<i32> {
        let mut width = 0;
        let result = self.enumerate_logical_glyphs_in_source_range(start, end, |glyph, _| {
            width += glyph.x_advance;
            true
        });
        if result != EnumerateGlyphsResult::Complete {
            return None;
        }
        if include_kerning_with_preceding_glyph && start > self.source_range.start {
            width += self.kerning(start - 1).unwrap_or(0);
        }
        Some(width)
    }

    pub fn kerning(&self, source_index: usize) -> Option<i32> {
        self.glyph_for_source_index(source_index).map(|g| g.kerning)
    }

    /// Glyphs of `[start, end)` in source order.
    pub fn enumerate_logical_glyphs_in_source_range(
        &self,
        start: usize,
        end: usize,
        mut callback: impl FnMut(&ShapedGlyphEntry, usize) -> bool,
    ) -> EnumerateGlyphsResult {
        if !self.covers(start, end) {
            return EnumerateGlyphsResult::Failed;
        }
        for source_index in start..end {
            let slot = source_index - self.source_range.start;
            for &glyph_index in &self.source_to_glyphs[slot] {
                if !callback(&self.glyphs[glyph_index], glyph_index) {
                    return EnumerateGlyphsResult::Aborted;
                }
            }
        }
        EnumerateGlyphsResult::Complete
    }

    /// Glyphs of `[start, end)` in visual order.
    pub fn enumerate_visual_glyphs_in_source_range(
        &self,
        start: usize,
        end: usize,
        mut callback: impl FnMut(&ShapedGlyphEntry, usize) -> bool,
    ) -> EnumerateGlyphsResult {
        if !self.covers(start, end) {
            return EnumerateGlyphsResult::Failed;
        }
        for (glyph_index, glyph) in self.glyphs.iter().enumerate() {
            if (start..end).contains(&glyph.source_index) && !callback(glyph, glyph_index) {
                return EnumerateGlyphsResult::Aborted;
            }
        }
        EnumerateGlyphsResult::Complete
    }

    /// Hit test along the baseline. `start_offset` is where the first glyph
    /// begins.
    pub fn glyph_at_offset(&self, horizontal_offset: i32, start_offset: i32) -> Option<GlyphOffsetResult> {
        let last = self.glyphs.len().checked_sub(1)?;
        let mut current = start_offset;
        let hit = self
            .glyphs
            .iter()
            .enumerate()
            .find_map(|(glyph_index, glyph)| {
                let end = current + glyph.x_advance;
                let found = (horizontal_offset < end).then(|| {
                    let left_half = horizontal_offset < current + glyph.x_advance / 2;
                    (glyph_index, left_half)
                });
                current = end;
                found
            })
            .unwrap_or((last, false));

        let (glyph_index, left_half) = hit;
        let glyph = &self.glyphs[glyph_index];
        let num_chars = glyph.num_characters_in_glyph.max(1) as usize;
        let leading = match glyph.text_direction {
            TextDirection::LeftToRight => left_half,
            TextDirection::RightToLeft => !left_half,
        };
        let character_index = if leading {
            glyph.source_index
        } else {
            glyph.source_index + num_chars
        };
        Some(GlyphOffsetResult {
            glyph_index,
            character_index,
            text_direction: glyph.text_direction,
        })
    }

    /// Copy holding only the glyphs of `[start, end)`. `None` when the range
    /// is outside this sequence or would split a cluster.
    pub fn sub_sequence(&self, start: usize, end: usize) -> Option<ShapedGlyphSequence> {
        if !self.covers(start, end) {
            return None;
        }
        let mut glyphs = Vec::new();
        for glyph in &self.glyphs {
            if !(start..end).contains(&glyph.source_index) {
                continue;
            }
            if glyph.source_index + glyph.num_characters_in_glyph as usize > end {
                return None;
            }
            glyphs.push(glyph.clone());
        }
        Some(ShapedGlyphSequence::new(
            glyphs,
            self.text_baseline,
            self.max_text_height,
            self.font_material,
            self.outline_settings,
            start..end,
        ))
    }
}

/// Splits text into directional runs, then font runs, and shapes each with
/// either the face's shaper or per-glyph advances plus kerning.
#[derive(Debug, Clone, Copy)]
pub struct TextShaper {
    pub method: TextShapingMethod,
}

struct FontRun {
    range: Range<usize>,
    resolved: Vec<Option<ResolvedFace>>,
}

impl TextShaper {
    pub fn new(method: TextShapingMethod) -> Self {
        Self { method }
    }

    /// Shapes characters `range` of `text`.
    pub fn shape_bidirectional(
        &self,
        text: &str,
        range: Range<usize>,
        font_info: &FontInfo,
        font_scale: f32,
        base_direction: TextDirection,
    ) -> ShapedGlyphSequence {
        let chars: Vec<char> = text.chars().collect();
        let range = range.start.min(chars.len())..range.end.min(chars.len());
        let sub: String = chars[range.clone()].iter().collect();
        let byte_to_char = byte_to_char_map(&sub);

        let level = match base_direction {
            TextDirection::LeftToRight => Level::ltr(),
            TextDirection::RightToLeft => Level::rtl(),
        };
        let bidi = BidiInfo::new(&sub, Some(level));
        let mut directional_runs = Vec::new();
        for paragraph in &bidi.paragraphs {
            let (levels, runs) = bidi.visual_runs(paragraph, paragraph.range.clone());
            for run in runs {
                let direction = if levels[run.start].is_rtl() {
                    TextDirection::RightToLeft
                } else {
                    TextDirection::LeftToRight
                };
                let start = range.start + byte_to_char[run.start];
                let end = range.start + byte_to_char[run.end];
                directional_runs.push((start..end, direction));
            }
        }

        self.shape_runs(&chars, range, directional_runs, font_info, font_scale)
    }

    pub fn shape_unidirectional(
        &self,
        text: &str,
        range: Range<usize>,
        font_info: &FontInfo,
        font_scale: f32,
        direction: TextDirection,
    ) -> ShapedGlyphSequence {
        let chars: Vec<char> = text.chars().collect();
        let range = range.start.min(chars.len())..range.end.min(chars.len());
        let runs = vec![(range.clone(), direction)];
        self.shape_runs(&chars, range, runs, font_info, font_scale)
    }

    fn shape_runs(
        &self,
        chars: &[char],
        range: Range<usize>,
        directional_runs: Vec<(Range<usize>, TextDirection)>,
        font_info: &FontInfo,
        font_scale: f32,
    ) -> ShapedGlyphSequence {
        let size_px = font_size_to_pixels(font_info.size, font_scale);
        let mut faces: Vec<Arc<dyn FontFace>> = Vec::new();
        let mut glyphs = Vec::new();

        for (run_range, direction) in directional_runs {
            let mut font_runs = self.split_font_runs(chars, run_range, font_info);
            if direction == TextDirection::RightToLeft {
                font_runs.reverse();
            }
            for run in font_runs {
                let Some(face) = run.resolved.iter().flatten().next().map(|r| r.face.clone()) else {
                    continue;
                };
                if !faces.iter().any(|f| f.id() == face.id()) {
                    faces.push(face.clone());
                }
                let face_data = Arc::new(ShapedGlyphFaceData::new(&face, font_info.size, font_scale));
                let full_shaping = match self.method {
                    TextShapingMethod::KerningOnly => false,
                    TextShapingMethod::FullShaping => true,
                    TextShapingMethod::Auto => face.supports_full_shaping(),
                };
                let shaped = if full_shaping {
                    shape_with_face(chars, &run, face.as_ref(), &face_data, size_px, direction)
                } else {
                    None
                };
                let shaped = shaped.unwrap_or_else(|| {
                    shape_with_kerning(chars, &run, face.as_ref(), &face_data, size_px, direction)
                });
                glyphs.extend(shaped);
            }
        }

        let mut max_text_height = 0;
        let mut text_baseline = 0;
        let primary = font_info.font.primary_face(font_info.typeface_name.as_deref()).cloned();
        for face in primary.iter().chain(faces.iter()) {
            let metrics = face.metrics(size_px);
            max_text_height = max_text_height.max(metrics.line_height.ceil() as i32);
            text_baseline = text_baseline.min(metrics.descender.floor() as i32);
        }

        ShapedGlyphSequence::new(
            glyphs,
            text_baseline,
            max_text_height,
            font_info.font_material,
            font_info.outline,
            range,
        )
    }

    /// Consecutive characters resolving to the same face. Whitespace sticks
    /// to the run it is in.
    fn split_font_runs(&self, chars: &[char], range: Range<usize>, font_info: &FontInfo) -> Vec<FontRun> {
        let mut runs: Vec<FontRun> = Vec::new();
        let mut current_face: Option<FaceId> = None;

        for index in range {
            let ch = chars[index];
            let resolved = font_info
                .font
                .resolve_face(font_info.typeface_name.as_deref(), ch, font_info.fallback);
            let face_id = resolved.as_ref().map(|r| r.face.id());
            let joins_current = match (runs.last(), current_face) {
                (Some(_), Some(current)) => ch.is_whitespace() || face_id == Some(current),
                (Some(_), None) => face_id.is_none(),
                (None, _) => false,
            };
            if joins_current {
                if let Some(run) = runs.last_mut() {
                    run.range.end = index + 1;
                    run.resolved.push(resolved);
                }
            } else {
                current_face = face_id;
                runs.push(FontRun {
                    range: index..index + 1,
                    resolved: vec![resolved],
                });
            }
        }
        runs
    }
}

fn byte_to_char_map(text: &str) -> Vec<usize> {
    let mut map = vec![0; text.len() + 1];
    let mut char_index = 0;
    for (byte_index, ch) in text.char_indices() {
        for slot in &mut map[byte_index..byte_index + ch.len_utf8()] {
            *slot = char_index;
        }
        char_index += 1;
    }
    map[text.len()] = char_index;
    map
}

fn shape_with_kerning(
    chars: &[char],
    run: &FontRun,
    face: &dyn FontFace,
    face_data: &Arc<ShapedGlyphFaceData>,
    size_px: f32,
    direction: TextDirection,
) -> Vec<ShapedGlyphEntry> {
    let mut glyphs: Vec<ShapedGlyphEntry> = Vec::with_capacity(run.range.len());
    for (offset, source_index) in run.range.clone().enumerate() {
        let ch = chars[source_index];
        let glyph_index = match &run.resolved[offset] {
            Some(resolved) if resolved.face.id() == face.id() => resolved.glyph_index,
            _ => face.glyph_index(ch).unwrap_or(0),
        };

        if let Some(previous) = glyphs.last_mut() {
            let kerning = face.kerning(previous.glyph_index, glyph_index, size_px).round() as i32;
            previous.x_advance += kerning;
            previous.kerning = kerning;
        }

        glyphs.push(ShapedGlyphEntry {
            face_data: face_data.clone(),
            glyph_index,
            source_index,
            x_advance: face.advance(glyph_index, size_px).round() as i32,
            y_advance: 0,
            x_offset: 0,
            y_offset: 0,
            kerning: 0,
            num_characters_in_glyph: 1,
            text_direction: direction,
            is_visible: !ch.is_whitespace(),
        });
    }
    if direction == TextDirection::RightToLeft {
        glyphs.reverse();
    }
    glyphs
}

fn shape_with_face(
    chars: &[char],
    run: &FontRun,
    face: &dyn FontFace,
    face_data: &Arc<ShapedGlyphFaceData>,
    size_px: f32,
    direction: TextDirection,
) -> Option<Vec<ShapedGlyphEntry>> {
    let run_text: String = chars[run.range.clone()].iter().collect();
    let shaped = face.shape(&run_text, size_px, direction)?;
    let byte_to_char = byte_to_char_map(&run_text);
    let run_len = run.range.len();

    let mut cluster_starts: Vec<usize> = shaped
        .iter()
        .map(|g| byte_to_char[g.cluster.min(run_text.len())])
        .collect();
    cluster_starts.sort_unstable();
    cluster_starts.dedup();

    let mut seen = vec![false; run_len];
    let glyphs = shaped
        .iter()
        .map(|g| {
            let local = byte_to_char[g.cluster.min(run_text.len())].min(run_len.saturating_sub(1));
            let next = cluster_starts
                .iter()
                .copied()
                .find(|&s| s > local)
                .unwrap_or(run_len);
            let num_characters = if seen[local] {
                0
            } else {
                seen[local] = true;
                (next - local).min(u8::MAX as usize) as u8
            };
            let source_index = run.range.start + local;
            ShapedGlyphEntry {
                face_data: face_data.clone(),
                glyph_index: g.glyph_index,
                source_index,
                x_advance: g.x_advance.round() as i32,
                // shaper offsets are y up
                y_advance: -(g.y_advance.round() as i32),
                x_offset: g.x_offset.round() as i32,
                y_offset: -(g.y_offset.round() as i32),
                kerning: 0,
                num_characters_in_glyph: num_characters,
                text_direction: direction,
                is_visible: !chars[source_index].is_whitespace(),
            }
        })
        .collect();
    Some(glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_map_handles_multibyte_characters() {
        let map = byte_to_char_map("aé b");
        assert_eq!(map, vec![0, 1, 1, 2, 3, 4]);
    }
}
