use crate::resources::{ResourceId, ResourceKind, ShaderResource};

use super::GlyphBitmap;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    #[error("All {pages} atlas pages are full")]
    Full { pages: usize },

    #[error("Glyph bitmap of {width}x{height} has only {len} coverage bytes")]
    MalformedBitmap { width: u32, height: u32, len: usize },
}

/// Where a glyph landed: the texture index plus its texel rectangle,
/// padding excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasPlacement {
    pub texture_index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy)]
struct Shelf {
    y: u32,
    height: u32,
    cursor_x: u32,
}

/// Alpha-only page packed with shelves: rows of fixed height filled left to
/// right.
#[derive(Debug)]
pub struct SlateTextureAtlas {
    resource: ShaderResource,
    padding: u32,
    shelves: Vec<Shelf>,
    next_shelf_y: u32,
    pixels: Vec<u8>,
    dirty: bool,
}

impl SlateTextureAtlas {
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            resource: ShaderResource {
                id: ResourceId::new(),
                width,
                height,
                kind: ResourceKind::AlphaOnly,
            },
            padding,
            shelves: Vec::new(),
            next_shelf_y: 0,
            pixels: vec![0; (width * height) as usize],
            dirty: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.resource.width
    }

    pub fn height(&self) -> u32 {
        self.resource.height
    }

    /// Whether a `width` x `height` glyph could ever fit in an empty page.
    pub fn can_hold(&self, width: u32, height: u32) -> bool {
        width + 2 * self.padding <= self.width() && height + 2 * self.padding <= self.height()
    }

    /// Copies `coverage` into a free slot, returning the top left texel of
    /// the glyph itself.
    pub fn add_entry(&mut self, width: u32, height: u32, coverage: &[u8]) -> Option<(u32, u32)> {
        let slot_w = width + 2 * self.padding;
        let slot_h = height + 2 * self.padding;
        let page_w = self.width();
        let page_h = self.height();

        let best = self
            .shelves
            .iter()
            .enumerate()
            .filter(|(_, s)| s.height >= slot_h && s.cursor_x + slot_w <= page_w)
            .min_by_key(|(_, s)| s.height - slot_h)
            .map(|(i, _)| i);

        let shelf_index = match best {
            Some(i) => i,
            None => {
                if self.next_shelf_y + slot_h > page_h || slot_w > page_w {
                    return None;
                }
                self.shelves.push(Shelf {
                    y: self.next_shelf_y,
                    height: slot_h,
                    cursor_x: 0,
                });
                self.next_shelf_y += slot_h;
                self.shelves.len() - 1
            }
        };

        let shelf = &mut self.shelves[shelf_index];
        let x = shelf.cursor_x + self.padding;
        let y = shelf.y + self.padding;
        shelf.cursor_x += slot_w;

        for row in 0..height {
            let src = (row * width) as usize;
            let dst = ((y + row) * page_w + x) as usize;
            self.pixels[dst..dst + width as usize]
                .copy_from_slice(&coverage[src..src + width as usize]);
        }
        self.dirty = true;
        Some((x, y))
    }
}

/// Glyph too large for a page, kept in its own texture.
#[derive(Debug)]
pub struct NonAtlasedTexture {
    resource: ShaderResource,
    pixels: Vec<u8>,
    dirty: bool,
}

#[derive(Debug)]
pub enum FontTexture {
    Atlas(SlateTextureAtlas),
    NonAtlased(NonAtlasedTexture),
}

impl FontTexture {
    pub fn resource(&self) -> ShaderResource {
        match self {
            FontTexture::Atlas(atlas) => atlas.resource,
            FontTexture::NonAtlased(texture) => texture.resource,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        match self {
            FontTexture::Atlas(atlas) => &atlas.pixels,
            FontTexture::NonAtlased(texture) => &texture.pixels,
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            FontTexture::Atlas(atlas) => atlas.dirty,
            FontTexture::NonAtlased(texture) => texture.dirty,
        }
    }

    pub fn mark_clean(&mut self) {
        match self {
            FontTexture::Atlas(atlas) => atlas.dirty = false,
            FontTexture::NonAtlased(texture) => texture.dirty = false,
        }
    }

    pub fn is_atlased(&self) -> bool {
        matches!(self, FontTexture::Atlas(_))
    }
}

/// Every texture the font cache has placed glyphs in, indexed the way
/// character entries refer to them.
#[derive(Debug)]
pub struct FontAtlasManager {
    page_width: u32,
    page_height: u32,
    padding: u32,
    max_pages: usize,
    textures: Vec<FontTexture>,
}

impl FontAtlasManager {
    pub fn new(page_width: u32, page_height: u32, padding: u32, max_pages: usize) -> Self {
        Self {
            page_width,
            page_height,
            padding,
            max_pages,
            textures: Vec::new(),
        }
    }

    pub fn num_atlas_pages(&self) -> usize {
        self.textures.iter().filter(|t| t.is_atlased()).count()
    }

    pub fn num_non_atlased_textures(&self) -> usize {
        self.textures.iter().filter(|t| !t.is_atlased()).count()
    }

    pub fn textures(&self) -> &[FontTexture] {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut [FontTexture] {
        &mut self.textures
    }

    pub fn texture_resource(&self, index: usize) -> Option<ShaderResource> {
        self.textures.get(index).map(FontTexture::resource)
    }

    pub fn add_new_entry(&mut self, bitmap: &GlyphBitmap) -> Result<AtlasPlacement, AtlasError> {
        let (width, height) = (bitmap.width, bitmap.height);
        if !bitmap.is_well_formed() {
            return Err(AtlasError::MalformedBitmap {
                width,
                height,
                len: bitmap.coverage.len(),
            });
        }

        let fits_a_page =
            width + 2 * self.padding <= self.page_width && height + 2 * self.padding <= self.page_height;
        if !fits_a_page {
            log::debug!("glyph {}x{} exceeds the atlas page, using its own texture", width, height);
            self.textures.push(FontTexture::NonAtlased(NonAtlasedTexture {
                resource: ShaderResource {
                    id: ResourceId::new(),
                    width,
                    height,
                    kind: ResourceKind::AlphaOnly,
                },
                pixels: bitmap.coverage[..bitmap.num_texels()].to_vec(),
                dirty: true,
            }));
            return Ok(AtlasPlacement {
                texture_index: self.textures.len() - 1,
                x: 0,
                y: 0,
                width,
                height,
            });
        }

        for (texture_index, texture) in self.textures.iter_mut().enumerate() {
            if let FontTexture::Atlas(atlas) = texture {
                if let Some((x, y)) = atlas.add_entry(width, height, &bitmap.coverage) {
                    return Ok(AtlasPlacement {
                        texture_index,
                        x,
                        y,
                        width,
                        height,
                    });
                }
            }
        }

        let pages = self.num_atlas_pages();
        if pages >= self.max_pages {
            return Err(AtlasError::Full { pages });
        }

        let mut atlas = SlateTextureAtlas::new(self.page_width, self.page_height, self.padding);
        let (x, y) = atlas
            .add_entry(width, height, &bitmap.coverage)
            .ok_or(AtlasError::Full { pages })?;
        log::debug!("allocated font atlas page {}", pages + 1);
        self.textures.push(FontTexture::Atlas(atlas));
        Ok(AtlasPlacement {
            texture_index: self.textures.len() - 1,
            x,
            y,
            width,
            height,
        })
    }

    /// Drops every texture, returning the ids the backend should release.
    pub fn clear(&mut self) -> Vec<ResourceId> {
        self.textures.drain(..).map(|t| t.resource().id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: u32) -> GlyphBitmap {
        GlyphBitmap {
            width: size,
            height: size,
            bearing_x: 0,
            bearing_y: size as i32,
            coverage: vec![200; (size * size) as usize],
        }
    }

    #[test]
    fn glyphs_pack_on_one_shelf() {
        let mut manager = FontAtlasManager::new(64, 64, 1, 1);
        let a = manager.add_new_entry(&square(10)).expect("first");
        let b = manager.add_new_entry(&square(10)).expect("second");
        assert_eq!(a.texture_index, b.texture_index);
        assert_eq!((a.x, a.y), (1, 1));
        assert_eq!((b.x, b.y), (13, 1));
        assert_eq!(manager.num_atlas_pages(), 1);
    }

    #[test]
    fn oversized_glyph_gets_its_own_texture() {
        let mut manager = FontAtlasManager::new(16, 16, 1, 1);
        let placement = manager.add_new_entry(&square(20)).expect("non atlased");
        assert_eq!(manager.num_non_atlased_textures(), 1);
        assert_eq!(manager.texture_resource(placement.texture_index).map(|r| r.width), Some(20));
    }
}
