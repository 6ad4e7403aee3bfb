use rusttype::{point, Font, GlyphId, Scale};
use std::path::Path;
use uuid::Uuid;

use super::{FontError, TextDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub Uuid);

impl FaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FaceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Vertical metrics in pixels, y up. `descender` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceMetrics {
    pub ascender: f32,
    pub descender: f32,
    pub line_height: f32,
}

/// Single channel coverage of one glyph plus where it sits relative to the
/// pen position on the baseline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// pixels right of the pen position to the bitmap's left edge
    pub bearing_x: i32,
    /// pixels above the baseline to the bitmap's top edge
    pub bearing_y: i32,
    pub coverage: Vec<u8>,
}

impl GlyphBitmap {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn num_texels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `coverage` holds a byte for every texel.
    pub fn is_well_formed(&self) -> bool {
        self.coverage.len() >= self.num_texels()
    }

    /// Grows the coverage by `radius` pixels on every side, keeping the
    /// horizontal bearing so the fill can be centered by shifting it
    /// right by `radius`.
    pub fn dilated(&self, radius: u32) -> GlyphBitmap {
        if radius == 0 || self.is_empty() {
            return self.clone();
        }
        let r = radius as i32;
        let width = self.width + 2 * radius;
        let height = self.height + 2 * radius;
        let mut coverage = vec![0u8; (width * height) as usize];
        let r_sq = r * r;

        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let mut best = 0u8;
                for dy in -r..=r {
                    for dx in -r..=r {
                        if dx * dx + dy * dy > r_sq {
                            continue;
                        }
                        let sx = x - r + dx;
                        let sy = y - r + dy;
                        if sx < 0 || sy < 0 || sx >= self.width as i32 || sy >= self.height as i32 {
                            continue;
                        }
                        let texel = self.coverage.get((sy as u32 * self.width + sx as u32) as usize);
                        best = best.max(texel.copied().unwrap_or(0));
                    }
                }
                coverage[(y as u32 * width + x as u32) as usize] = best;
            }
        }

        GlyphBitmap {
            width,
            height,
            bearing_x: self.bearing_x,
            bearing_y: self.bearing_y + r,
            coverage,
        }
    }
}

/// A glyph as produced by a full shaper, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceShapedGlyph {
    pub glyph_index: u32,
    /// byte offset into the shaped string of the first character this
    /// glyph covers
    pub cluster: usize,
    pub x_advance: f32,
    pub y_advance: f32,
    pub x_offset: f32,
    pub y_offset: f32,
}

/// One loaded font face. Everything is measured in pixels for a given
/// pixel size.
pub trait FontFace: Send + Sync {
    fn id(&self) -> FaceId;

    fn name(&self) -> &str;

    /// `None` when the face has no glyph for `ch`.
    fn glyph_index(&self, ch: char) -> Option<u32>;

    fn metrics(&self, size_px: f32) -> FaceMetrics;

    fn advance(&self, glyph_index: u32, size_px: f32) -> f32;

    fn kerning(&self, _left: u32, _right: u32, _size_px: f32) -> f32 {
        0.0
    }

    /// `None` when the glyph cannot be rendered at all.
    fn rasterize(&self, glyph_index: u32, size_px: f32) -> Option<GlyphBitmap>;

    fn supports_full_shaping(&self) -> bool {
        false
    }

    /// Glyphs in visual order. Faces without a shaper return `None`.
    fn shape(&self, _text: &str, _size_px: f32, _direction: TextDirection) -> Option<Vec<FaceShapedGlyph>> {
        None
    }
}

/// TrueType/OpenType face: rusttype rasterizes, rustybuzz shapes.
pub struct TrueTypeFace {
    id: FaceId,
    name: String,
    data: Vec<u8>,
    font: Font<'static>,
}

impl TrueTypeFace {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, FontError> {
        let name = name.into();
        let font = Font::try_from_vec(data.clone())
            .ok_or_else(|| FontError::InvalidFontData(name.clone()))?;
        if rustybuzz::Face::from_slice(&data, 0).is_none() {
            return Err(FontError::InvalidFontData(name));
        }
        log::debug!("loaded face {} ({} glyphs)", name, font.glyph_count());
        Ok(Self {
            id: FaceId::new(),
            name,
            data,
            font,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FontError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(name, data)
    }

    /// rusttype scales by ascent minus descent; this maps `size_px` to the em
    /// square instead.
    fn em_scale(&self, size_px: f32) -> Scale {
        let units_per_em = self.font.units_per_em().max(1) as f32;
        let unscaled = self.font.v_metrics_unscaled();
        let height_units = unscaled.ascent - unscaled.descent;
        Scale::uniform(size_px * height_units / units_per_em)
    }
}

impl FontFace for TrueTypeFace {
    fn id(&self) -> FaceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn glyph_index(&self, ch: char) -> Option<u32> {
        let id = self.font.glyph(ch).id().0;
        (id != 0).then_some(id as u32)
    }

    fn metrics(&self, size_px: f32) -> FaceMetrics {
        let v = self.font.v_metrics(self.em_scale(size_px));
        FaceMetrics {
            ascender: v.ascent,
            descender: v.descent,
            line_height: v.ascent - v.descent + v.line_gap,
        }
    }

    fn advance(&self, glyph_index: u32, size_px: f32) -> f32 {
        self.font
            .glyph(GlyphId(glyph_index as u16))
            .scaled(self.em_scale(size_px))
            .h_metrics()
            .advance_width
    }

    fn kerning(&self, left: u32, right: u32, size_px: f32) -> f32 {
        self.font.pair_kerning(
            self.em_scale(size_px),
            GlyphId(left as u16),
            GlyphId(right as u16),
        )
    }

    fn rasterize(&self, glyph_index: u32, size_px: f32) -> Option<GlyphBitmap> {
        let glyph = self
            .font
            .glyph(GlyphId(glyph_index as u16))
            .scaled(self.em_scale(size_px))
            .positioned(point(0.0, 0.0));
        let Some(bb) = glyph.pixel_bounding_box() else {
            // whitespace and other empty outlines
            return Some(GlyphBitmap::default());
        };
        let width = (bb.max.x - bb.min.x) as u32;
        let height = (bb.max.y - bb.min.y) as u32;
        let mut coverage = vec![0u8; (width * height) as usize];
        glyph.draw(|x, y, v| {
            if x < width && y < height {
                coverage[(y * width + x) as usize] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        });
        Some(GlyphBitmap {
            width,
            height,
            bearing_x: bb.min.x,
            bearing_y: -bb.min.y,
            coverage,
        })
    }

    fn supports_full_shaping(&self) -> bool {
        true
    }

    fn shape(&self, text: &str, size_px: f32, direction: TextDirection) -> Option<Vec<FaceShapedGlyph>> {
        let face = rustybuzz::Face::from_slice(&self.data, 0)?;
        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        buffer.set_direction(match direction {
            TextDirection::LeftToRight => rustybuzz::Direction::LeftToRight,
            TextDirection::RightToLeft => rustybuzz::Direction::RightToLeft,
        });

        let glyph_buffer = rustybuzz::shape(&face, &[], buffer);
        // positions come back in font units
        let units_per_em = face.units_per_em().max(1) as f32;
        let to_px = size_px / units_per_em;

        let glyphs = glyph_buffer
            .glyph_infos()
            .iter()
            .zip(glyph_buffer.glyph_positions())
            .map(|(info, pos)| FaceShapedGlyph {
                glyph_index: info.glyph_id,
                cluster: info.cluster as usize,
                x_advance: pos.x_advance as f32 * to_px,
                y_advance: pos.y_advance as f32 * to_px,
                x_offset: pos.x_offset as f32 * to_px,
                y_offset: pos.y_offset as f32 * to_px,
            })
            .collect();
        Some(glyphs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilation_grows_bitmap_and_keeps_left_bearing() {
        let bitmap = GlyphBitmap {
            width: 1,
            height: 1,
            bearing_x: 2,
            bearing_y: 5,
            coverage: vec![255],
        };
        let outlined = bitmap.dilated(1);
        assert_eq!((outlined.width, outlined.height), (3, 3));
        assert_eq!(outlined.bearing_x, 2);
        assert_eq!(outlined.bearing_y, 6);
        // plus shape, corners stay empty
        assert_eq!(outlined.coverage, vec![0, 255, 0, 255, 255, 255, 0, 255, 0]);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            TrueTypeFace::from_bytes("junk", vec![1, 2, 3, 4]),
            Err(FontError::InvalidFontData(_))
        ));
    }
}
