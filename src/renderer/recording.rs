use std::collections::HashMap;

use serde::Serialize;

use crate::batch::{BatchDrawFlags, DrawPrimitive, RenderBatch, ShaderType};
use crate::draw_elements::ClippingState;
use crate::resources::{ResourceId, ResourceKind, ShaderResource};
use crate::utils::{Size, SlateIndex, SlateVertex};

use super::{BackendError, RenderBackend};

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BackendCall {
    CreateTexture {
        id: ResourceId,
        width: u32,
        height: u32,
    },
    UpdateTexture {
        id: ResourceId,
    },
    ReleaseTexture {
        id: ResourceId,
    },
    BeginFrame {
        viewport: Size,
    },
    UploadBuffers {
        num_vertices: usize,
        num_indices: usize,
    },
    Draw {
        layer: u32,
        shader_type: ShaderType,
        primitive: DrawPrimitive,
        texture: Option<ResourceId>,
        #[serde(skip)]
        draw_flags: BatchDrawFlags,
        vertex_offset: u32,
        index_offset: u32,
        num_indices: u32,
        clipped: bool,
    },
    EndFrame,
}

/// Backend that draws nothing and remembers everything it was asked to
/// do. Texture pixels are kept so tools can dump the atlas.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    textures: HashMap<ResourceId, (ShaderResource, Vec<u8>)>,
    vertices: Vec<SlateVertex>,
    indices: Vec<SlateIndex>,
    device_lost: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = &BackendCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, BackendCall::Draw { .. }))
    }

    pub fn texture(&self, id: ResourceId) -> Option<(&ShaderResource, &[u8])> {
        self.textures
            .get(&id)
            .map(|(resource, pixels)| (resource, pixels.as_slice()))
    }

    pub fn num_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn uploaded_vertices(&self) -> &[SlateVertex] {
        &self.vertices
    }

    pub fn uploaded_indices(&self) -> &[SlateIndex] {
        &self.indices
    }

    /// Simulates losing the graphics device.
    pub fn set_device_lost(&mut self, lost: bool) {
        self.device_lost = lost;
    }

    fn check_pixels(resource: &ShaderResource, pixels: &[u8]) -> Result<(), BackendError> {
        let bytes_per_texel = match resource.kind {
            ResourceKind::AlphaOnly => 1,
            ResourceKind::Texture | ResourceKind::RenderTarget => 4,
        };
        let expected = resource.width as usize * resource.height as usize * bytes_per_texel;
        if pixels.len() != expected {
            return Err(BackendError::TextureDataSize {
                id: resource.id,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(())
    }
}

impl RenderBackend for RecordingBackend {
    fn is_device_lost(&self) -> bool {
        self.device_lost
    }

    fn create_texture_page(&mut self, resource: &ShaderResource, pixels: &[u8]) -> Result<(), BackendError> {
        Self::check_pixels(resource, pixels)?;
        self.textures.insert(resource.id, (*resource, pixels.to_vec()));
        self.calls.push(BackendCall::CreateTexture {
            id: resource.id,
            width: resource.width,
            height: resource.height,
        });
        Ok(())
    }

    fn update_texture_page(&mut self, resource: &ShaderResource, pixels: &[u8]) -> Result<(), BackendError> {
        Self::check_pixels(resource, pixels)?;
        let Some((_, stored)) = self.textures.get_mut(&resource.id) else {
            return Err(BackendError::UnknownTexture(resource.id));
        };
        stored.clear();
        stored.extend_from_slice(pixels);
        self.calls.push(BackendCall::UpdateTexture { id: resource.id });
        Ok(())
    }

    fn release_texture(&mut self, id: ResourceId) {
        self.textures.remove(&id);
        self.calls.push(BackendCall::ReleaseTexture { id });
    }

    fn begin_frame(&mut self, viewport_size: Size) -> Result<(), BackendError> {
        self.calls.push(BackendCall::BeginFrame {
            viewport: viewport_size,
        });
        Ok(())
    }

    fn upload_buffers(&mut self, vertices: &[SlateVertex], indices: &[SlateIndex]) -> Result<(), BackendError> {
        self.vertices.clear();
        self.vertices.extend_from_slice(vertices);
        self.indices.clear();
        self.indices.extend_from_slice(indices);
        self.calls.push(BackendCall::UploadBuffers {
            num_vertices: vertices.len(),
            num_indices: indices.len(),
        });
        Ok(())
    }

    fn draw_batch(&mut self, batch: &RenderBatch, clip: Option<&ClippingState>) -> Result<(), BackendError> {
        if let Some(texture) = &batch.texture {
            // viewport render targets are owned by the caller, not uploaded here
            if texture.kind == ResourceKind::AlphaOnly && !self.textures.contains_key(&texture.id) {
                return Err(BackendError::UnknownTexture(texture.id));
            }
        }
        self.calls.push(BackendCall::Draw {
            layer: batch.layer,
            shader_type: batch.shader_type,
            primitive: batch.primitive,
            texture: batch.texture.map(|t| t.id),
            draw_flags: batch.draw_flags,
            vertex_offset: batch.vertex_offset,
            index_offset: batch.index_offset,
            num_indices: batch.num_indices,
            clipped: clip.is_some(),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.calls.push(BackendCall::EndFrame);
        Ok(())
    }
}
