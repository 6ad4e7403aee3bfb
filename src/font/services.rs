use std::sync::Arc;

use crate::config::SlateConfig;

use super::{CompositeFont, FlushTarget, FontCache, FontCacheFlushHandle, FontFace, FontMeasure};

/// Owner of the game thread and render thread font caches. The two never
/// share glyphs; flush requests are broadcast to both.
pub struct SlateFontServices {
    game_thread_font_cache: FontCache,
    render_thread_font_cache: Option<FontCache>,
    flush_handles: Vec<FontCacheFlushHandle>,
}

impl SlateFontServices {
    pub fn new(config: &SlateConfig) -> Self {
        let game_thread_font_cache = FontCache::new(config);
        let render_thread_font_cache = FontCache::new(config);
        let flush_handles = vec![
            game_thread_font_cache.flush_handle(),
            render_thread_font_cache.flush_handle(),
        ];
        Self {
            game_thread_font_cache,
            render_thread_font_cache: Some(render_thread_font_cache),
            flush_handles,
        }
    }

    pub fn game_thread_font_cache(&mut self) -> &mut FontCache {
        &mut self.game_thread_font_cache
    }

    /// Hands the render thread cache over to the renderer. Only the first
    /// call returns it.
    pub fn take_render_thread_font_cache(&mut self) -> Option<FontCache> {
        self.render_thread_font_cache.take()
    }

    /// Measurement always runs against the game thread cache.
    pub fn font_measure(&mut self) -> FontMeasure<'_> {
        FontMeasure::new(&mut self.game_thread_font_cache)
    }

    pub fn flush_object(&self, target: FlushTarget) {
        for handle in &self.flush_handles {
            handle.request(target);
        }
    }

    pub fn flush_composite_font(&self, font: &Arc<CompositeFont>) {
        self.flush_object(FlushTarget::CompositeFont(font.id()));
    }

    pub fn flush_font_face(&self, face: &Arc<dyn FontFace>) {
        self.flush_object(FlushTarget::FontFace(face.id()));
    }

    pub fn flush_all(&self) {
        self.flush_object(FlushTarget::Everything);
    }
}
