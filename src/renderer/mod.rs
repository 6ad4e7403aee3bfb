pub mod recording;
#[cfg(feature = "backend-wgpu")]
pub mod wgpu_backend;

use serde::Serialize;

use crate::batch::RenderBatch;
use crate::config::SlateConfig;
use crate::draw_elements::{ClippingState, WindowElementList};
use crate::element_batcher::{BatcherStats, ElementBatcher, RenderingPolicy};
use crate::font::FontCache;
use crate::resources::{ResourceId, ShaderResource};
use crate::utils::{Size, SlateIndex, SlateVertex};

pub use recording::{BackendCall, RecordingBackend};
#[cfg(feature = "backend-wgpu")]
pub use wgpu_backend::WgpuBackend;

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("Graphics device lost")]
    DeviceLost,

    #[error("Texture {0:?} is not known to the backend")]
    UnknownTexture(ResourceId),

    #[error("Texture {id:?} expects {expected} bytes of pixel data, got {actual}")]
    TextureDataSize {
        id: ResourceId,
        expected: usize,
        actual: usize,
    },

    #[error("Backend failure: {0}")]
    Other(String),
}

/// What the frame driver needs from a graphics API. Alpha-only pages hold
/// one byte per texel, everything else four.
pub trait RenderBackend {
    fn is_device_lost(&self) -> bool {
        false
    }

    fn create_texture_page(&mut self, resource: &ShaderResource, pixels: &[u8]) -> Result<(), BackendError>;

    fn update_texture_page(&mut self, resource: &ShaderResource, pixels: &[u8]) -> Result<(), BackendError>;

    fn release_texture(&mut self, _id: ResourceId) {}

    fn begin_frame(&mut self, viewport_size: Size) -> Result<(), BackendError>;

    /// Indices are relative to their batch's `vertex_offset`.
    fn upload_buffers(&mut self, vertices: &[SlateVertex], indices: &[SlateIndex]) -> Result<(), BackendError>;

    fn draw_batch(&mut self, batch: &RenderBatch, clip: Option<&ClippingState>) -> Result<(), BackendError>;

    fn end_frame(&mut self) -> Result<(), BackendError>;
}

/// Totals for one call to [`SlateRenderer::draw_windows`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameStats {
    pub windows_drawn: u32,
    pub windows_skipped: u32,
    pub device_lost: bool,
    pub font_cache_flushed: bool,
    pub num_render_batches: u32,
    pub num_draw_calls: u32,
    pub num_custom_draws: u32,
    pub num_vertices: u32,
    pub num_indices: u32,
    pub batcher: BatcherStats,
}

/// Drives batching and drawing of whole windows against one backend.
pub struct SlateRenderer<B: RenderBackend> {
    backend: B,
    policy: RenderingPolicy,
    batcher: ElementBatcher,
    vertices: Vec<SlateVertex>,
    indices: Vec<SlateIndex>,
}

impl<B: RenderBackend> SlateRenderer<B> {
    /// `font_cache` should be the render thread cache of the font services.
    pub fn new(backend: B, config: SlateConfig, font_cache: FontCache) -> Self {
        Self {
            backend,
            policy: RenderingPolicy::new(config, font_cache),
            batcher: ElementBatcher::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn policy(&self) -> &RenderingPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut RenderingPolicy {
        &mut self.policy
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Batches and draws every window. A lost device skips the whole frame
    /// before anything is batched; a backend failure skips only the window
    /// it happened in.
    pub fn draw_windows(&mut self, windows: &mut [WindowElementList]) -> FrameStats {
        let mut stats = FrameStats::default();
        if self.backend.is_device_lost() {
            log::warn!("graphics device lost, skipping frame");
            stats.device_lost = true;
            stats.windows_skipped = windows.len() as u32;
            return stats;
        }

        stats.font_cache_flushed = self.policy.font_cache_mut().conditional_flush_cache();

        for window in windows.iter_mut() {
            match self.draw_window(window, &mut stats) {
                Ok(()) => stats.windows_drawn += 1,
                Err(err) => {
                    log::warn!("window draw skipped: {}", err);
                    stats.windows_skipped += 1;
                }
            }
        }
        log::trace!("frame stats: {:?}", stats);
        stats
    }

    fn draw_window(&mut self, window: &mut WindowElementList, stats: &mut FrameStats) -> Result<(), BackendError> {
        window.reset_batches();
        self.batcher.reset_batches();
        self.batcher.add_elements(&mut self.policy, window);
        window.create_render_batches();

        self.policy.font_cache_mut().update_textures(&mut self.backend)?;

        let batch_data = window.batch_data();
        batch_data.fill_vertex_and_index_buffer(&mut self.vertices, &mut self.indices, false);

        self.backend.begin_frame(window.viewport_size())?;
        self.backend.upload_buffers(&self.vertices, &self.indices)?;

        let clip_states = batch_data.render_clip_states();
        for batch in batch_data.render_batches() {
            if let Some(drawer) = &batch.custom_drawer {
                // the owner may have dropped it after painting
                if let Some(drawer) = drawer.upgrade() {
                    drawer.draw_render_thread(&mut self.backend);
                    stats.num_custom_draws += 1;
                }
                continue;
            }
            let clip = batch.clipping_index.and_then(|index| clip_states.get(index));
            self.backend.draw_batch(batch, clip)?;
            stats.num_draw_calls += 1;
        }
        self.backend.end_frame()?;

        stats.num_render_batches += batch_data.render_batches().len() as u32;
        stats.num_vertices += batch_data.num_batched_vertices();
        stats.num_indices += batch_data.num_batched_indices();
        merge_batcher_stats(&mut stats.batcher, self.batcher.stats());
        Ok(())
    }
}

fn merge_batcher_stats(total: &mut BatcherStats, window: &BatcherStats) {
    total.num_elements += window.num_elements;
    for (kind, count) in &window.elements_by_kind {
        *total.elements_by_kind.entry(*kind).or_default() += count;
    }
    total.num_batches_created += window.num_batches_created;
    total.num_glyph_quads += window.num_glyph_quads;
    total.num_post_process_passes += window.num_post_process_passes;
    total.requires_vsync |= window.requires_vsync;
}
