use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, Mutex};

use crate::config::SlateConfig;
use crate::renderer::{BackendError, RenderBackend};
use crate::resources::{ResourceId, ShaderResource};

use super::character_list::{CharacterList, CharacterListView};
use super::{
    AtlasError, CompositeFontId, FaceId, FontAtlasManager, FontFace, FontInfo,
    FontOutlineSettings, ShapedGlyphEntry, ShapedGlyphSequence, TextDirection, TextShaper,
    TextShapingMethod,
};

/// Atlas placement of a shaped glyph, in texels of its texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapedGlyphFontAtlasData {
    /// texels from the baseline up to the top of the bitmap
    pub vertical_offset: i32,
    /// texels from the pen position to the left of the bitmap
    pub horizontal_offset: i32,
    pub start_u: u32,
    pub start_v: u32,
    pub u_size: u32,
    pub v_size: u32,
    pub texture_index: usize,
    pub valid: bool,
}

impl ShapedGlyphFontAtlasData {
    pub fn has_area(&self) -> bool {
        self.valid && self.u_size > 0 && self.v_size > 0
    }
}

/// Something whose glyphs must leave the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTarget {
    CompositeFont(CompositeFontId),
    FontFace(FaceId),
    Everything,
}

/// Cloneable, thread safe way to ask a [`FontCache`] to drop glyphs. The
/// request is honored at the cache's next frame boundary.
#[derive(Debug, Clone, Default)]
pub struct FontCacheFlushHandle(Arc<Mutex<Vec<FlushTarget>>>);

impl FontCacheFlushHandle {
    pub fn request(&self, target: FlushTarget) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(target);
    }

    fn drain(&self) -> Vec<FlushTarget> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FontCacheStats {
    pub rasterizations: u64,
    pub flushes: u64,
    pub atlas_pages: usize,
    pub non_atlased_textures: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum FlushRequest {
    /// a soft texture count threshold was crossed
    Threshold(String),
    Required(String),
}

/// Rasterizer front: the atlas pages, the faces with glyphs in them and
/// counters.
#[derive(Debug)]
pub(crate) struct GlyphStore {
    atlas: FontAtlasManager,
    faces: HashSet<FaceId>,
    stats: FontCacheStats,
    flush_request: Option<FlushRequest>,
    max_atlas_pages_before_flush: usize,
    max_non_atlased_before_flush: usize,
}

impl GlyphStore {
    pub(crate) fn texture_resource(&self, index: usize) -> Option<ShaderResource> {
        self.atlas.texture_resource(index)
    }

    fn request_flush(&mut self, request: FlushRequest) {
        // a required flush wins over a threshold one
        if !matches!(self.flush_request, Some(FlushRequest::Required(_))) {
            self.flush_request = Some(request);
        }
    }

    /// Rasterizes `glyph_index` and places it in a texture.
    pub(crate) fn add_new_entry(
        &mut self,
        face: &dyn FontFace,
        glyph_index: u32,
        size_px: f32,
        outline_px: u32,
    ) -> ShapedGlyphFontAtlasData {
        self.stats.rasterizations += 1;
        self.faces.insert(face.id());
        let Some(bitmap) = face.rasterize(glyph_index, size_px) else {
            log::debug!("{} cannot render glyph {}", face.name(), glyph_index);
            return ShapedGlyphFontAtlasData::default();
        };
        if !bitmap.is_well_formed() {
            log::warn!(
                "{} rendered glyph {} as {}x{} with {} coverage bytes, skipping it",
                face.name(),
                glyph_index,
                bitmap.width,
                bitmap.height,
                bitmap.coverage.len()
            );
            return ShapedGlyphFontAtlasData::default();
        }
        let bitmap = bitmap.dilated(outline_px);
        if bitmap.is_empty() {
            return ShapedGlyphFontAtlasData {
                vertical_offset: bitmap.bearing_y,
                horizontal_offset: bitmap.bearing_x,
                valid: true,
                ..ShapedGlyphFontAtlasData::default()
            };
        }

        match self.atlas.add_new_entry(&bitmap) {
            Ok(placement) => {
                self.stats.atlas_pages = self.atlas.num_atlas_pages();
                self.stats.non_atlased_textures = self.atlas.num_non_atlased_textures();
                if self.stats.atlas_pages > self.max_atlas_pages_before_flush {
                    self.request_flush(FlushRequest::Threshold(format!(
                        "{} atlas pages in use",
                        self.stats.atlas_pages
                    )));
                }
                if self.stats.non_atlased_textures > self.max_non_atlased_before_flush {
                    self.request_flush(FlushRequest::Threshold(format!(
                        "{} non-atlased textures in use",
                        self.stats.non_atlased_textures
                    )));
                }
                ShapedGlyphFontAtlasData {
                    vertical_offset: bitmap.bearing_y,
                    horizontal_offset: bitmap.bearing_x,
                    start_u: placement.x,
                    start_v: placement.y,
                    u_size: placement.width,
                    v_size: placement.height,
                    texture_index: placement.texture_index,
                    valid: true,
                }
            }
            Err(AtlasError::Full { pages }) => {
                log::warn!("font atlas full with {} pages, requesting a flush", pages);
                self.request_flush(FlushRequest::Required("atlas full".to_string()));
                ShapedGlyphFontAtlasData::default()
            }
            Err(err @ AtlasError::MalformedBitmap { .. }) => {
                log::warn!("{}: {}", face.name(), err);
                ShapedGlyphFontAtlasData::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FontKey {
    font: CompositeFontId,
    typeface: Option<String>,
    size_bits: u32,
    scale_bits: u32,
    outline_size: i32,
}

impl FontKey {
    fn new(font_info: &FontInfo, font_scale: f32, outline: &FontOutlineSettings) -> Self {
        Self {
            font: font_info.font.id(),
            typeface: font_info.typeface_name.clone(),
            size_bits: font_info.size.to_bits(),
            scale_bits: font_scale.to_bits(),
            outline_size: outline.outline_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GlyphAtlasKey {
    face: FaceId,
    glyph_index: u32,
    size_px_bits: u32,
    outline_px: u32,
}

/// Glyph cache for one thread: character lists for the legacy text path,
/// atlas data for shaped glyphs, and the textures both are placed in.
#[derive(Debug)]
pub struct FontCache {
    shaper: TextShaper,
    character_lists: HashMap<FontKey, CharacterList>,
    shaped_glyphs: HashMap<GlyphAtlasKey, ShapedGlyphFontAtlasData>,
    store: GlyphStore,
    flush_handle: FontCacheFlushHandle,
    frame_counter: u64,
    last_flush_frame: Option<u64>,
    released_textures: Vec<ResourceId>,
    uploaded_textures: HashSet<ResourceId>,
}

impl FontCache {
    pub fn new(config: &SlateConfig) -> Self {
        Self {
            shaper: TextShaper::new(config.default_shaping_method),
            character_lists: HashMap::new(),
            shaped_glyphs: HashMap::new(),
            store: GlyphStore {
                atlas: FontAtlasManager::new(
                    config.atlas_page_width,
                    config.atlas_page_height,
                    config.glyph_padding,
                    config.max_atlas_pages,
                ),
                faces: HashSet::new(),
                stats: FontCacheStats::default(),
                flush_request: None,
                max_atlas_pages_before_flush: config.max_atlas_pages_before_flush_request,
                max_non_atlased_before_flush: config.max_non_atlased_textures_before_flush_request,
            },
            flush_handle: FontCacheFlushHandle::default(),
            frame_counter: 0,
            last_flush_frame: None,
            released_textures: Vec::new(),
            uploaded_textures: HashSet::new(),
        }
    }

    pub fn stats(&self) -> FontCacheStats {
        self.store.stats
    }

    pub fn atlas_manager(&self) -> &FontAtlasManager {
        &self.store.atlas
    }

    pub fn flush_handle(&self) -> FontCacheFlushHandle {
        self.flush_handle.clone()
    }

    pub fn is_flush_requested(&self) -> bool {
        self.store.flush_request.is_some()
    }

    /// Character list for `font_info` at `font_scale` rasterized with
    /// `outline`, rebuilt when its composite font changed since it was
    /// created.
    pub fn character_list(
        &mut self,
        font_info: &FontInfo,
        font_scale: f32,
        outline: &FontOutlineSettings,
    ) -> CharacterListView<'_> {
        let key = FontKey::new(font_info, font_scale, outline);
        let list = self
            .character_lists
            .entry(key)
            .or_insert_with(|| CharacterList::new(font_info, font_scale, *outline));
        if list.is_stale() {
            log::debug!(
                "composite font {:?} changed, rebuilding its character list",
                list.font_info().font.id()
            );
            *list = CharacterList::new(font_info, font_scale, *outline);
        }
        CharacterListView {
            list,
            store: &mut self.store,
        }
    }

    pub fn max_character_height(&mut self, font_info: &FontInfo, font_scale: f32) -> i32 {
        self.character_list(font_info, font_scale, &font_info.outline)
            .max_height()
    }

    pub fn baseline(&mut self, font_info: &FontInfo, font_scale: f32) -> i32 {
        self.character_list(font_info, font_scale, &font_info.outline)
            .baseline()
    }

    pub fn kerning(&mut self, font_info: &FontInfo, font_scale: f32, first: char, second: char) -> i32 {
        let fallback = font_info.fallback;
        self.character_list(font_info, font_scale, &font_info.outline)
            .get_kerning_chars(first, second, fallback)
    }

    fn shaper_for(&self, method: Option<TextShapingMethod>) -> TextShaper {
        method.map(TextShaper::new).unwrap_or(self.shaper)
    }

    pub fn shape_bidirectional_text(
        &mut self,
        text: &str,
        range: Range<usize>,
        font_info: &FontInfo,
        font_scale: f32,
        base_direction: TextDirection,
        method: Option<TextShapingMethod>,
    ) -> ShapedGlyphSequence {
        self.shaper_for(method)
            .shape_bidirectional(text, range, font_info, font_scale, base_direction)
    }

    pub fn shape_unidirectional_text(
        &mut self,
        text: &str,
        range: Range<usize>,
        font_info: &FontInfo,
        font_scale: f32,
        direction: TextDirection,
        method: Option<TextShapingMethod>,
    ) -> ShapedGlyphSequence {
        self.shaper_for(method)
            .shape_unidirectional(text, range, font_info, font_scale, direction)
    }

    /// Atlas placement for a shaped glyph, rasterizing it on a miss. The
    /// glyph may have been shaped by another cache. Glyphs whose face has
    /// been unloaded come back invalid.
    pub fn get_shaped_glyph_font_atlas_data(
        &mut self,
        glyph: &ShapedGlyphEntry,
        outline: &FontOutlineSettings,
    ) -> ShapedGlyphFontAtlasData {
        let size_px = glyph.face_data.size_px();
        let outline_px = (outline.outline_size as f32 * glyph.face_data.font_scale)
            .round()
            .max(0.0) as u32;
        let key = GlyphAtlasKey {
            face: glyph.face_data.face_id,
            glyph_index: glyph.glyph_index,
            size_px_bits: size_px.to_bits(),
            outline_px,
        };
        if let Some(data) = self.shaped_glyphs.get(&key) {
            return *data;
        }
        let Some(face) = glyph.face_data.face() else {
            return ShapedGlyphFontAtlasData::default();
        };
        let data = self
            .store
            .add_new_entry(face.as_ref(), glyph.glyph_index, size_px, outline_px);
        if data.valid {
            self.shaped_glyphs.insert(key, data);
        }
        data
    }

    pub fn get_slate_texture_resource(&self, texture_index: usize) -> Option<ShaderResource> {
        self.store.texture_resource(texture_index)
    }

    pub fn request_flush_cache(&mut self, reason: &str) {
        self.store
            .request_flush(FlushRequest::Required(reason.to_string()));
    }

    /// Drops every cached glyph and texture immediately.
    pub fn flush_cache(&mut self) {
        log::debug!(
            "flushing font cache ({} atlas pages, {} non-atlased textures)",
            self.store.atlas.num_atlas_pages(),
            self.store.atlas.num_non_atlased_textures()
        );
        self.character_lists.clear();
        self.shaped_glyphs.clear();
        self.store.faces.clear();
        let released = self.store.atlas.clear();
        for id in &released {
            self.uploaded_textures.remove(id);
        }
        self.released_textures.extend(released);
        self.store.stats.flushes += 1;
        self.store.stats.atlas_pages = 0;
        self.store.stats.non_atlased_textures = 0;
        self.store.flush_request = None;
        self.last_flush_frame = Some(self.frame_counter);
    }

    fn references(&self, target: FlushTarget) -> bool {
        match target {
            FlushTarget::Everything => true,
            FlushTarget::CompositeFont(id) => self
                .character_lists
                .values()
                .any(|list| list.font_info().font.id() == id),
            FlushTarget::FontFace(id) => self.store.faces.contains(&id),
        }
    }

    /// Queues a flush if anything cached refers to `target`.
    pub fn flush_object(&mut self, target: FlushTarget) {
        if self.references(target) {
            self.request_flush_cache(&format!("{:?} released", target));
        }
    }

    /// Frame boundary: honors queued flush requests. A threshold request made
    /// right after a flush raises the thresholds instead of thrashing.
    /// Returns whether the cache was flushed.
    pub fn conditional_flush_cache(&mut self) -> bool {
        self.frame_counter += 1;
        for target in self.flush_handle.drain() {
            self.flush_object(target);
        }

        match self.store.flush_request.take() {
            None => false,
            Some(FlushRequest::Threshold(reason))
                if self.last_flush_frame == Some(self.frame_counter - 1) =>
            {
                let store = &mut self.store;
                store.max_atlas_pages_before_flush =
                    store.max_atlas_pages_before_flush.max(store.atlas.num_atlas_pages());
                store.max_non_atlased_before_flush = store
                    .max_non_atlased_before_flush
                    .max(store.atlas.num_non_atlased_textures());
                log::debug!(
                    "skipping flush ({}) right after another, raising thresholds to {} pages",
                    reason,
                    store.max_atlas_pages_before_flush
                );
                false
            }
            Some(FlushRequest::Threshold(reason)) | Some(FlushRequest::Required(reason)) => {
                log::debug!("font cache flush: {}", reason);
                self.flush_cache();
                true
            }
        }
    }

    /// Sends new and changed textures to the backend and releases flushed
    /// ones.
    pub fn update_textures(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        for id in self.released_textures.drain(..) {
            backend.release_texture(id);
        }
        for texture in self.store.atlas.textures_mut() {
            if !texture.is_dirty() {
                continue;
            }
            let resource = texture.resource();
            if self.uploaded_textures.contains(&resource.id) {
                backend.update_texture_page(&resource, texture.pixels())?;
            } else {
                backend.create_texture_page(&resource, texture.pixels())?;
                self.uploaded_textures.insert(resource.id);
            }
            texture.mark_clean();
        }
        Ok(())
    }
}
