use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use pollster::block_on;
use wgpu::util::DeviceExt;

use crate::batch::{BatchDrawFlags, DrawPrimitive, RenderBatch, ShaderType};
use crate::draw_elements::ClippingState;
use crate::resources::{ResourceId, ResourceKind, ShaderResource};
use crate::utils::{Rectangle, Size, SlateIndex, SlateVertex};

use super::{BackendError, RenderBackend};

const COPY_BYTES_PER_ROW_ALIGNMENT: usize = 256;

/// Mirrors `BatchUniform` in slate.wgsl.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BatchUniform {
    viewport_size: [f32; 2],
    dynamic_offset: [f32; 2],
    params: [f32; 4],
    params2: [f32; 4],
    draw_effects: u32,
    draw_flags: u32,
    _pad: [u32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BlendMode {
    Alpha,
    PreMultiplied,
    Opaque,
}

impl BlendMode {
    fn from_flags(flags: BatchDrawFlags) -> Self {
        if flags.contains(BatchDrawFlags::NO_BLENDING) {
            BlendMode::Opaque
        } else if flags.contains(BatchDrawFlags::PRE_MULTIPLIED_ALPHA) {
            BlendMode::PreMultiplied
        } else {
            BlendMode::Alpha
        }
    }

    fn state(self) -> Option<wgpu::BlendState> {
        match self {
            BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendMode::PreMultiplied => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
            BlendMode::Opaque => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader_type: ShaderType,
    primitive: DrawPrimitive,
    blend: BlendMode,
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct PendingDraw {
    pipeline: PipelineKey,
    texture: Option<ResourceId>,
    uniform_bind_group: wgpu::BindGroup,
    scissor: Option<(u32, u32, u32, u32)>,
    indices: std::ops::Range<u32>,
    base_vertex: i32,
    instances: std::ops::Range<u32>,
}

/// Renders batches with wgpu into an offscreen target. Draws are queued by
/// [`RenderBackend::draw_batch`] and encoded in one pass at the end of the
/// frame.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    target_format: wgpu::TextureFormat,
    shader: wgpu::ShaderModule,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    sampler: wgpu::Sampler,
    textures: HashMap<ResourceId, GpuTexture>,
    white_texture: GpuTexture,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
    viewport_size: Size,
    pending: Vec<PendingDraw>,
    device_lost: Arc<AtomicBool>,
}

impl WgpuBackend {
    /// Creates a device on the default adapter with no surface and an
    /// offscreen target of `width` by `height` pixels.
    pub fn headless(width: u32, height: u32) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .context("Failed to find an appropriate adapter")?;

        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Slate Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .context("Failed to create device")?;

        Ok(Self::new(device, queue, width, height))
    }

    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let target_format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let target = Self::create_target(&device, target_format, width, height);

        let device_lost = Arc::new(AtomicBool::new(false));
        let lost_flag = device_lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::warn!("wgpu device lost ({:?}): {}", reason, message);
            lost_flag.store(true, Ordering::SeqCst);
        });

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("batch_uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<BatchUniform>() as _),
                },
                count: None,
            }],
        });

        let texture_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("slate shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("slate.wgsl"))),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Slate Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        // repeat so tiled boxes and borders can wrap
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white = ShaderResource::texture(1, 1);
        let white_texture = Self::upload_texture(
            &device,
            &queue,
            &texture_bind_group_layout,
            &sampler,
            &white,
            &[255, 255, 255, 255],
        );

        Self {
            device,
            queue,
            target,
            target_format,
            shader,
            uniform_bind_group_layout,
            texture_bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            sampler,
            textures: HashMap::new(),
            white_texture,
            vertex_buffer: None,
            index_buffer: None,
            viewport_size: Size::new(width as f32, height as f32),
            pending: Vec::new(),
            device_lost,
        }
    }

    fn create_target(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Slate Target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[format],
        })
    }

    fn texture_format(kind: ResourceKind) -> (wgpu::TextureFormat, usize) {
        match kind {
            ResourceKind::AlphaOnly => (wgpu::TextureFormat::R8Unorm, 1),
            ResourceKind::Texture | ResourceKind::RenderTarget => (wgpu::TextureFormat::Rgba8UnormSrgb, 4),
        }
    }

    /// Rows padded to the copy alignment wgpu requires.
    fn padded_rows(pixels: &[u8], width: u32, height: u32, bytes_per_pixel: usize) -> (Vec<u8>, usize) {
        let unpadded_bytes_per_row = width as usize * bytes_per_pixel;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT)
            * COPY_BYTES_PER_ROW_ALIGNMENT;
        let mut padded_buffer = vec![0u8; padded_bytes_per_row * height as usize];
        for y in 0..height as usize {
            let dst_start = y * padded_bytes_per_row;
            let src_start = y * unpadded_bytes_per_row;
            padded_buffer[dst_start..dst_start + unpadded_bytes_per_row]
                .copy_from_slice(&pixels[src_start..src_start + unpadded_bytes_per_row]);
        }
        (padded_buffer, padded_bytes_per_row)
    }

    fn write_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        resource: &ShaderResource,
        pixels: &[u8],
    ) {
        let (_, bytes_per_pixel) = Self::texture_format(resource.kind);
        let (padded_buffer, padded_bytes_per_row) =
            Self::padded_rows(pixels, resource.width, resource.height, bytes_per_pixel);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Texture Pixel Buffer"),
            contents: &padded_buffer,
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Texture Copy Encoder"),
        });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row as u32),
                    rows_per_image: Some(resource.height),
                },
            },
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: resource.width,
                height: resource.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));
    }

    fn upload_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        resource: &ShaderResource,
        pixels: &[u8],
    ) -> GpuTexture {
        let (format, _) = Self::texture_format(resource.kind);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Slate Texture"),
            size: wgpu::Extent3d {
                width: resource.width,
                height: resource.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[format],
        });
        Self::write_pixels(device, queue, &texture, resource, pixels);
        let bind_group = Self::texture_bind_group(device, layout, sampler, &texture);
        GpuTexture { texture, bind_group }
    }

    fn texture_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        texture: &wgpu::Texture,
    ) -> wgpu::BindGroup {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some("Texture Bind Group"),
        })
    }

    /// Makes a caller owned texture, such as a viewport's render target,
    /// available to batches referencing `resource`.
    pub fn register_texture(&mut self, resource: &ShaderResource, texture: wgpu::Texture) {
        let bind_group = Self::texture_bind_group(
            &self.device,
            &self.texture_bind_group_layout,
            &self.sampler,
            &texture,
        );
        self.textures.insert(resource.id, GpuTexture { texture, bind_group });
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn target(&self) -> &wgpu::Texture {
        &self.target
    }

    fn fragment_entry(shader_type: ShaderType) -> &'static str {
        match shader_type {
            ShaderType::Default | ShaderType::Custom | ShaderType::PostProcess => "fs_default",
            ShaderType::Border => "fs_border",
            ShaderType::Font => "fs_font",
            ShaderType::LineSegment => "fs_line",
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        log::debug!("creating pipeline for {:?}", key);
        let topology = match key.primitive {
            DrawPrimitive::LineList => wgpu::PrimitiveTopology::LineList,
            DrawPrimitive::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        };
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Slate Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<SlateVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x4,
                        1 => Float32x2,
                        2 => Float32x2,
                        3 => Unorm8x4,
                        4 => Uint16x2
                    ],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some(Self::fragment_entry(key.shader_type)),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend: key.blend.state(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        self.pipelines.insert(key, pipeline);
    }

    /// Scissor rectangle in target pixels. Stencil clips are approximated by
    /// the bounds of their innermost quad.
    fn scissor(&self, clip: Option<&ClippingState>) -> Option<(u32, u32, u32, u32)> {
        let clip = clip?;
        let zone = clip.stencil_quads.last().or(clip.scissor_rect.as_ref())?;
        let rect = zone.bounding_rect();
        let target = Rectangle::new(0.0, 0.0, self.viewport_size.width, self.viewport_size.height);
        let left = rect.x.max(target.x).floor();
        let top = rect.y.max(target.y).floor();
        let right = rect.right().min(target.right()).ceil();
        let bottom = rect.bottom().min(target.bottom()).ceil();
        let width = (right - left).max(0.0);
        let height = (bottom - top).max(0.0);
        Some((left as u32, top as u32, width as u32, height as u32))
    }

    /// Copies the target back to the cpu.
    pub fn read_target(&self) -> anyhow::Result<image::RgbaImage> {
        let width = self.target.width();
        let height = self.target.height();
        let unpadded_bytes_per_row = width as usize * 4;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT)
            * COPY_BYTES_PER_ROW_ALIGNMENT;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_bytes_per_row * height as usize) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .context("readback callback dropped")?
            .context("Failed to map readback buffer")?;

        let mut pixels = Vec::with_capacity(unpadded_bytes_per_row * height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_bytes_per_row) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row]);
            }
        }
        buffer.unmap();
        image::RgbaImage::from_raw(width, height, pixels).context("readback size mismatch")
    }
}

impl RenderBackend for WgpuBackend {
    fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::SeqCst)
    }

    fn create_texture_page(&mut self, resource: &ShaderResource, pixels: &[u8]) -> Result<(), BackendError> {
        let (_, bytes_per_pixel) = Self::texture_format(resource.kind);
        let expected = resource.width as usize * resource.height as usize * bytes_per_pixel;
        if pixels.len() != expected {
            return Err(BackendError::TextureDataSize {
                id: resource.id,
                expected,
                actual: pixels.len(),
            });
        }
        let texture = Self::upload_texture(
            &self.device,
            &self.queue,
            &self.texture_bind_group_layout,
            &self.sampler,
            resource,
            pixels,
        );
        self.textures.insert(resource.id, texture);
        Ok(())
    }

    fn update_texture_page(&mut self, resource: &ShaderResource, pixels: &[u8]) -> Result<(), BackendError> {
        let (_, bytes_per_pixel) = Self::texture_format(resource.kind);
        let expected = resource.width as usize * resource.height as usize * bytes_per_pixel;
        if pixels.len() != expected {
            return Err(BackendError::TextureDataSize {
                id: resource.id,
                expected,
                actual: pixels.len(),
            });
        }
        let texture = self
            .textures
            .get(&resource.id)
            .ok_or(BackendError::UnknownTexture(resource.id))?;
        Self::write_pixels(&self.device, &self.queue, &texture.texture, resource, pixels);
        Ok(())
    }

    fn release_texture(&mut self, id: ResourceId) {
        if let Some(texture) = self.textures.remove(&id) {
            texture.texture.destroy();
        }
    }

    fn begin_frame(&mut self, viewport_size: Size) -> Result<(), BackendError> {
        let width = viewport_size.width.round().max(1.0) as u32;
        let height = viewport_size.height.round().max(1.0) as u32;
        if self.target.width() != width || self.target.height() != height {
            self.target = Self::create_target(&self.device, self.target_format, width, height);
        }
        self.viewport_size = viewport_size;
        self.pending.clear();
        Ok(())
    }

    fn upload_buffers(&mut self, vertices: &[SlateVertex], indices: &[SlateIndex]) -> Result<(), BackendError> {
        if vertices.is_empty() || indices.is_empty() {
            self.vertex_buffer = None;
            self.index_buffer = None;
            return Ok(());
        }
        self.vertex_buffer = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Slate Vertex Buffer"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        self.index_buffer = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Slate Index Buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        }));
        Ok(())
    }

    fn draw_batch(&mut self, batch: &RenderBatch, clip: Option<&ClippingState>) -> Result<(), BackendError> {
        if !batch.has_geometry() {
            if batch.shader_type == ShaderType::PostProcess {
                log::debug!("post process passes are not supported by the wgpu backend");
            }
            return Ok(());
        }
        if let Some(texture) = &batch.texture {
            if !self.textures.contains_key(&texture.id) {
                return Err(BackendError::UnknownTexture(texture.id));
            }
        }

        let key = PipelineKey {
            shader_type: batch.shader_type,
            primitive: batch.primitive,
            blend: BlendMode::from_flags(batch.draw_flags),
        };
        self.ensure_pipeline(key);

        let params = batch.shader_params;
        let uniform = BatchUniform {
            viewport_size: [self.viewport_size.width.max(1.0), self.viewport_size.height.max(1.0)],
            dynamic_offset: [batch.dynamic_offset.x, batch.dynamic_offset.y],
            params: params.pixel_params,
            params2: params.pixel_params2,
            draw_effects: batch.draw_effects.bits() as u32,
            draw_flags: batch.draw_flags.bits() as u32,
            _pad: [0; 2],
        };
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Batch Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: None,
                }),
            }],
            label: Some("Batch Uniform Bind Group"),
        });

        let instance_count = batch.instance_count.max(1);
        let scissor = self.scissor(clip);
        self.pending.push(PendingDraw {
            pipeline: key,
            texture: batch.texture.map(|t| t.id),
            uniform_bind_group,
            scissor,
            indices: batch.index_offset..batch.index_offset + batch.num_indices,
            base_vertex: batch.vertex_offset as i32,
            instances: batch.instance_offset..batch.instance_offset + instance_count,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        let view = self.target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Slate Render Encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Slate Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (Some(vertex_buffer), Some(index_buffer)) = (&self.vertex_buffer, &self.index_buffer) {
                rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
                rpass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);

                let full = (0, 0, self.target.width(), self.target.height());
                for draw in &self.pending {
                    let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                        continue;
                    };
                    let texture = match draw.texture {
                        Some(id) => match self.textures.get(&id) {
                            Some(texture) => texture,
                            None => continue,
                        },
                        None => &self.white_texture,
                    };
                    let (x, y, w, h) = draw.scissor.unwrap_or(full);
                    if w == 0 || h == 0 {
                        continue;
                    }
                    rpass.set_pipeline(pipeline);
                    rpass.set_bind_group(0, &draw.uniform_bind_group, &[]);
                    rpass.set_bind_group(1, &texture.bind_group, &[]);
                    rpass.set_scissor_rect(x, y, w, h);
                    rpass.draw_indexed(draw.indices.clone(), draw.base_vertex, draw.instances.clone());
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        self.pending.clear();
        Ok(())
    }
}
