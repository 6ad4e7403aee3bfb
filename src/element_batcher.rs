use serde::Serialize;
use std::collections::BTreeMap;

use crate::batch::{
    BatchData, BatchDrawFlags, BatchKey, BatchSlot, DrawPrimitive, ElementBatch, ElementBatchMap,
    ShaderParams, ShaderType,
};
use crate::config::SlateConfig;
use crate::draw_elements::{
    BoxPayload, CustomVertsPayload, DrawEffects, DrawElement, DrawLayer, ElementKind,
    ElementPayload, GradientPayload, LinePayload, Orientation, PostProcessPayload,
    ShapedTextPayload, SplinePayload, TextPayload, ViewportPayload, WindowElementList,
};
use crate::font::{CharacterEntry, FontCache, FontOutlineSettings};
use crate::resources::{BrushDrawType, ResourceId, ShaderResource};
use crate::utils::{
    Color, LinearColor, Position, Size, SlateIndex, SlateRenderTransform, SlateVertex,
    VertexRounding,
};

/// Radius in pixels the line shader samples around the ideal line.
const LINE_AA_RADIUS: f32 = 1.5;

/// Spline tessellation: roughly one segment per this many pixels of length.
const SPLINE_PIXELS_PER_STEP: f32 = 15.0;
const SPLINE_MAX_STEPS: f32 = 256.0;

const FEATHER_COLOR: Color = Color {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
};

/// What the batcher needs from the renderer: the knobs that change vertex
/// output and the font cache owned by the thread doing the batching.
#[derive(Debug)]
pub struct RenderingPolicy {
    config: SlateConfig,
    font_cache: FontCache,
}

impl RenderingPolicy {
    pub fn new(config: SlateConfig, font_cache: FontCache) -> Self {
        Self { config, font_cache }
    }

    pub fn config(&self) -> &SlateConfig {
        &self.config
    }

    pub fn pixel_center_offset(&self) -> f32 {
        self.config.pixel_center_offset
    }

    pub fn font_cache(&self) -> &FontCache {
        &self.font_cache
    }

    pub fn font_cache_mut(&mut self) -> &mut FontCache {
        &mut self.font_cache
    }
}

/// Counters for one batching pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatcherStats {
    pub num_elements: u32,
    pub elements_by_kind: BTreeMap<ElementKind, u32>,
    pub num_batches_created: u32,
    pub num_glyph_quads: u32,
    pub num_post_process_passes: u32,
    pub requires_vsync: bool,
}

/// Turns the draw elements of a window into batches of vertices and
/// indices, grouping everything that can share a draw call.
#[derive(Debug, Default)]
pub struct ElementBatcher {
    stats: BatcherStats,
}

impl ElementBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches the root layer and every child draw layer of `list`. The
    /// list's clip states are copied into its batch data first.
    pub fn add_elements(&mut self, policy: &mut RenderingPolicy, list: &mut WindowElementList) {
        let viewport_size = list.viewport_size();
        let (root, child_layers, batch_data, clipping) = list.batching_parts();
        batch_data.copy_clipping_states(clipping.clipping_states());

        self.add_layer(policy, root, batch_data, viewport_size);
        for layer in child_layers.values_mut() {
            self.add_layer(policy, layer, batch_data, viewport_size);
        }

        batch_data.set_pending_requires_vsync(self.stats.requires_vsync);
        log::trace!(
            "batched {} elements into {} batches",
            self.stats.num_elements,
            self.stats.num_batches_created
        );
    }

    fn add_layer(
        &mut self,
        policy: &mut RenderingPolicy,
        layer: &mut DrawLayer,
        batch_data: &mut BatchData,
        viewport_size: Size,
    ) {
        let DrawLayer { elements, batch_map } = layer;
        let mut batcher = LayerBatcher {
            srgb: !policy.config.vertex_color_in_linear_space,
            feathering: policy.config.feathering,
            pixel_center_offset: policy.config.pixel_center_offset,
            font_cache: &mut policy.font_cache,
            target: BatchTarget {
                map: batch_map,
                data: batch_data,
            },
            stats: &mut self.stats,
            viewport_size,
        };
        for element in elements.iter() {
            batcher.add_element(element);
        }
    }

    /// Clears the per-frame flags. Batch storage belongs to the batch data
    /// and is reset there.
    pub fn reset_batches(&mut self) {
        self.stats = BatcherStats::default();
    }

    pub fn requires_vsync(&self) -> bool {
        self.stats.requires_vsync
    }

    pub fn num_post_process_passes(&self) -> u32 {
        self.stats.num_post_process_passes
    }

    pub fn stats(&self) -> &BatcherStats {
        &self.stats
    }
}

/// The batch map of the draw layer being filled plus the frame's geometry
/// storage.
struct BatchTarget<'a> {
    map: &'a mut ElementBatchMap,
    data: &'a mut BatchData,
}

impl BatchTarget<'_> {
    /// Returns the storage of the batch matching every argument, creating
    /// the batch on first use.
    #[allow(clippy::too_many_arguments)]
    fn find_batch(
        &mut self,
        stats: &mut BatcherStats,
        layer: u32,
        shader_params: ShaderParams,
        texture: Option<ShaderResource>,
        primitive: DrawPrimitive,
        shader_type: ShaderType,
        draw_effects: DrawEffects,
        draw_flags: BatchDrawFlags,
        element: &DrawElement,
    ) -> BatchSlot {
        let key = BatchKey::new(
            shader_params,
            shader_type,
            primitive,
            draw_effects,
            draw_flags | effect_draw_flags(draw_effects),
            element.clipping_index,
            element.scene_index,
        );
        let (batch, created) = self.map.find_or_add(layer, texture, key);
        if created {
            stats.num_batches_created += 1;
        }
        batch.num_elements += 1;
        BatchSlot {
            vertex_array: self.data.assign_vertex_array_to_batch(batch),
            index_array: self.data.assign_index_array_to_batch(batch),
        }
    }

    fn buffers(&mut self, slot: BatchSlot) -> (&mut Vec<SlateVertex>, &mut Vec<SlateIndex>) {
        self.data.batch_buffers(slot)
    }

    fn push_unmerged(&mut self, stats: &mut BatcherStats, layer: u32, mut batch: ElementBatch) {
        batch.num_elements = 1;
        stats.num_batches_created += 1;
        self.map.push_unmerged(layer, batch);
    }
}

/// Pipeline switches some draw effects imply.
fn effect_draw_flags(effects: DrawEffects) -> BatchDrawFlags {
    let mut flags = BatchDrawFlags::empty();
    if effects.contains(DrawEffects::NO_BLENDING) {
        flags |= BatchDrawFlags::NO_BLENDING;
    }
    if effects.contains(DrawEffects::PRE_MULTIPLIED_ALPHA) {
        flags |= BatchDrawFlags::PRE_MULTIPLIED_ALPHA;
    }
    if effects.contains(DrawEffects::NO_GAMMA) {
        flags |= BatchDrawFlags::NO_GAMMA;
    }
    flags
}

fn vertex_rounding(effects: DrawEffects) -> VertexRounding {
    if effects.contains(DrawEffects::NO_PIXEL_SNAPPING) {
        VertexRounding::Disabled
    } else {
        VertexRounding::Enabled
    }
}

/// Two triangles over a quad given clockwise from its top left corner.
fn index_quad(indices: &mut Vec<SlateIndex>, top_left: u32, top_right: u32, bottom_right: u32, bottom_left: u32) {
    indices.extend_from_slice(&[top_left, top_right, bottom_right, bottom_right, bottom_left, top_left]);
}

/// Hermite interpolation between two points with tangents.
fn cubic_interp(p0: Position, t0: Position, p1: Position, t1: Position, alpha: f32) -> Position {
    let a2 = alpha * alpha;
    let a3 = a2 * alpha;
    p0 * (2.0 * a3 - 3.0 * a2 + 1.0)
        + t0 * (a3 - 2.0 * a2 + alpha)
        + t1 * (a3 - a2)
        + p1 * (-2.0 * a3 + 3.0 * a2)
}

fn is_nearly_zero(v: f32) -> bool {
    v.abs() <= 1e-4
}

/// Where segment p1->p2 meets segment p3->p4, allowing the hit to fall a
/// little past either end so consecutive line segments can be mitred.
fn line_intersect(p1: Position, p2: Position, p3: Position, p4: Position) -> Option<Position> {
    const TOLERANCE: f32 = 0.1;
    let num_a = (p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x);
    let num_b = (p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x);
    let denom = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);

    if is_nearly_zero(num_a) && is_nearly_zero(num_b) {
        // coincident
        return Some((p1 + p2) / 2.0);
    }
    if is_nearly_zero(denom) {
        return None;
    }
    let a = num_a / denom;
    let b = num_b / denom;
    let range = -TOLERANCE..=1.0 + TOLERANCE;
    (range.contains(&a) && range.contains(&b)).then(|| p1 + (p2 - p1) * a)
}

/// Texture coordinates and batch inputs for one glyph quad.
struct GlyphQuad {
    upper_left: Position,
    size: Position,
    uv: Position,
    size_uv: Position,
    /// font material coordinates, zero without a material
    material_min: Position,
    material_max: Position,
}

fn push_glyph_quad(
    vertices: &mut Vec<SlateVertex>,
    indices: &mut Vec<SlateIndex>,
    rounding: VertexRounding,
    transform: &SlateRenderTransform,
    quad: &GlyphQuad,
    tint: Color,
) {
    let index_start = vertices.len() as u32;
    let ul = quad.upper_left;
    let lr = ul + quad.size;
    let uv = quad.uv;
    let uv_max = uv + quad.size_uv;
    let (m0, m1) = (quad.material_min, quad.material_max);

    vertices.push(SlateVertex::make_material(
        rounding,
        transform,
        ul,
        [uv.x, uv.y, m0.x, m0.y],
        Position::new(0.0, 0.0),
        tint,
    ));
    vertices.push(SlateVertex::make_material(
        rounding,
        transform,
        Position::new(lr.x, ul.y),
        [uv_max.x, uv.y, m1.x, m0.y],
        Position::new(1.0, 0.0),
        tint,
    ));
    vertices.push(SlateVertex::make_material(
        rounding,
        transform,
        Position::new(ul.x, lr.y),
        [uv.x, uv_max.y, m0.x, m1.y],
        Position::new(0.0, 1.0),
        tint,
    ));
    vertices.push(SlateVertex::make_material(
        rounding,
        transform,
        lr,
        [uv_max.x, uv_max.y, m1.x, m1.y],
        Position::new(1.0, 1.0),
        tint,
    ));

    indices.extend_from_slice(&[
        index_start,
        index_start + 1,
        index_start + 2,
        index_start + 1,
        index_start + 3,
        index_start + 2,
    ]);
}

/// Tessellates the elements of one draw layer into its batch map.
struct LayerBatcher<'a> {
    srgb: bool,
    feathering: bool,
    pixel_center_offset: f32,
    font_cache: &'a mut FontCache,
    target: BatchTarget<'a>,
    stats: &'a mut BatcherStats,
    viewport_size: Size,
}

impl LayerBatcher<'_> {
    fn pack(&self, color: LinearColor) -> Color {
        color.to_color(self.srgb)
    }

    fn add_element(&mut self, element: &DrawElement) {
        self.stats.num_elements += 1;
        *self.stats.elements_by_kind.entry(element.kind()).or_default() += 1;

        let rounding = vertex_rounding(element.draw_effects);
        match &element.payload {
            ElementPayload::Box(payload) => self.add_box(element, payload, rounding),
            ElementPayload::DebugQuad(color) => self.add_debug_quad(element, *color, rounding),
            ElementPayload::Text(payload) => self.add_text(element, payload, rounding),
            ElementPayload::ShapedText(payload) => self.add_shaped_text(element, payload, rounding),
            ElementPayload::Spline(payload) => self.add_spline(element, payload, rounding),
            ElementPayload::Line(payload) => self.add_lines(element, payload, rounding),
            ElementPayload::Gradient(payload) => self.add_gradient(element, payload, rounding),
            ElementPayload::Viewport(payload) => self.add_viewport(element, payload, rounding),
            ElementPayload::Border(payload) => self.add_border(element, payload, rounding),
            ElementPayload::Custom(drawer) => {
                if drawer.strong_count() > 0 {
                    self.target.push_unmerged(
                        self.stats,
                        element.layer,
                        ElementBatch::custom_drawer(drawer.clone(), element.clipping_index),
                    );
                }
            }
            ElementPayload::CustomVerts(payload) => self.add_custom_verts(element, payload),
            ElementPayload::CachedBuffer(payload) => {
                self.target.push_unmerged(
                    self.stats,
                    element.layer,
                    ElementBatch::cached_buffer(payload.data.clone(), payload.offset, element.clipping_index),
                );
            }
            ElementPayload::Layer(handle) => {
                self.target.push_unmerged(
                    self.stats,
                    element.layer,
                    ElementBatch::layer(*handle, element.clipping_index),
                );
            }
            ElementPayload::PostProcessPass(payload) => self.add_post_process_pass(element, payload),
        }
    }

    fn add_debug_quad(&mut self, element: &DrawElement, color: LinearColor, rounding: VertexRounding) {
        let slot = self.target.find_batch(
            self.stats,
            element.layer,
            ShaderParams::default(),
            None,
            DrawPrimitive::TriangleList,
            ShaderType::Default,
            DrawEffects::NONE,
            BatchDrawFlags::WIREFRAME | BatchDrawFlags::NO_BLENDING,
            element,
        );
        let tint = self.pack(color);
        let t = &element.render_transform;
        let size = element.local_size;
        let (vertices, indices) = self.target.buffers(slot);
        let start = vertices.len() as u32;

        vertices.push(SlateVertex::make_uv(rounding, t, Position::ZERO, Position::new(0.0, 0.0), tint));
        vertices.push(SlateVertex::make_uv(
            rounding,
            t,
            Position::new(size.width, 0.0),
            Position::new(1.0, 0.0),
            tint,
        ));
        vertices.push(SlateVertex::make_uv(
            rounding,
            t,
            Position::new(0.0, size.height),
            Position::new(0.0, 1.0),
            tint,
        ));
        vertices.push(SlateVertex::make_uv(
            rounding,
            t,
            size.as_position(),
            Position::new(1.0, 1.0),
            tint,
        ));
        indices.extend_from_slice(&[start, start + 1, start + 2, start + 2, start + 1, start + 3]);
    }

    fn box_render_transform(element: &DrawElement, payload: &BoxPayload) -> SlateRenderTransform {
        match payload.rotation {
            Some(rotation) if rotation.angle != 0.0 => {
                SlateRenderTransform::from_translation(-rotation.point)
                    .concatenate(&SlateRenderTransform::from_rotation(rotation.angle))
                    .concatenate(&SlateRenderTransform::from_translation(rotation.point))
                    .concatenate(&element.render_transform)
            }
            _ => element.render_transform,
        }
    }

    fn add_box(&mut self, element: &DrawElement, payload: &BoxPayload, rounding: VertexRounding) {
        let brush = &payload.brush;
        debug_assert!(brush.draw_as != BrushDrawType::NoDrawType, "no-draw brushes are culled on creation");

        let tint = self.pack(payload.tint);
        let t = Self::box_render_transform(element, payload);
        let local_size = element.local_size;
        let draw_scale = element.scale;
        let pco = self.pixel_center_offset;

        let mut tex_size = Position::splat(1.0);
        let mut start_uv = Position::ZERO;
        let mut end_uv = Position::splat(1.0);
        let size_uv;
        let half_texel;
        let texture = brush.resource.map(|proxy| proxy.resource);

        match &brush.resource {
            Some(proxy) => {
                let (w, h) = proxy.actual_size;
                tex_size = Position::new(w.max(1) as f32, h.max(1) as f32);
                half_texel = Position::new(pco / tex_size.x, pco / tex_size.y);
                match brush.uv_region {
                    Some(region) => {
                        size_uv = region.size().as_position();
                        start_uv = region.pos() + half_texel;
                    }
                    None => {
                        size_uv = proxy.size_uv;
                        start_uv = proxy.start_uv + half_texel;
                    }
                }
                end_uv = start_uv + size_uv;
            }
            None => {
                size_uv = Position::splat(1.0);
                half_texel = Position::splat(pco);
            }
        }

        let tile_u = brush.tiling.tiles_horizontally();
        let tile_v = brush.tiling.tiles_vertically();
        let mirror_u = brush.mirroring.mirrors_horizontally();
        let mirror_v = brush.mirroring.mirrors_vertically();

        let mut draw_flags = payload.batch_flags;
        if tile_u {
            draw_flags |= BatchDrawFlags::TILE_U;
        }
        if tile_v {
            draw_flags |= BatchDrawFlags::TILE_V;
        }

        let slot = self.target.find_batch(
            self.stats,
            element.layer,
            ShaderParams::default(),
            texture,
            DrawPrimitive::TriangleList,
            ShaderType::Default,
            element.draw_effects,
            draw_flags,
            element,
        );

        let tiling = Position::new(
            if tile_u { local_size.width / tex_size.x } else { 1.0 },
            if tile_v { local_size.height / tex_size.y } else { 1.0 },
        );
        let feather = self.feathering && rounding == VertexRounding::Disabled;
        let feather_step = 1.0 / if draw_scale != 0.0 { draw_scale } else { 1.0 };

        let (vertices, indices) = self.target.buffers(slot);
        let index_start = vertices.len() as u32;
        let vertex = |pos: Position, uv: Position, color: Color| {
            SlateVertex::make_sized(
                rounding,
                &t,
                pos,
                local_size,
                draw_scale,
                [uv.x, uv.y, tiling.x, tiling.y],
                color,
            )
        };

        let margin = brush.margin;
        let end_pos = local_size.as_position();

        if brush.draw_as != BrushDrawType::Image && !margin.is_zero() {
            let mut left_u = if margin.left > 0.0 {
                start_uv.x + margin.left * size_uv.x + half_texel.x
            } else {
                start_uv.x
            };
            let mut top_v = if margin.top > 0.0 {
                start_uv.y + margin.top * size_uv.y + half_texel.y
            } else {
                start_uv.y
            };
            let mut right_u = if margin.right > 0.0 {
                end_uv.x - margin.right * size_uv.x + half_texel.x
            } else {
                end_uv.x
            };
            let mut bottom_v = if margin.bottom > 0.0 {
                end_uv.y - margin.bottom * size_uv.y + half_texel.y
            } else {
                end_uv.y
            };

            let (uv_min, uv_max) = (start_uv, end_uv);
            if mirror_u {
                let flip = |u: f32| uv_max.x - (u - uv_min.x);
                start_uv.x = flip(start_uv.x);
                end_uv.x = flip(end_uv.x);
                left_u = flip(left_u);
                right_u = flip(right_u);
            }
            if mirror_v {
                let flip = |v: f32| uv_max.y - (v - uv_min.y);
                start_uv.y = flip(start_uv.y);
                end_uv.y = flip(end_uv.y);
                top_v = flip(top_v);
                bottom_v = flip(bottom_v);
            }

            let mut left_x = tex_size.x * margin.left;
            let mut top_y = tex_size.y * margin.top;
            let mut right_x = local_size.width - tex_size.x * margin.right;
            let mut bottom_y = local_size.height - tex_size.y * margin.bottom;

            // overlapping margins collapse to the middle of the box
            if right_x < left_x {
                left_x = local_size.width / 2.0;
                right_x = left_x;
            }
            if bottom_y < top_y {
                top_y = local_size.height / 2.0;
                bottom_y = top_y;
            }

            let p = Position::new;
            vertices.extend_from_slice(&[
                vertex(p(0.0, 0.0), start_uv, tint),
                vertex(p(0.0, top_y), p(start_uv.x, top_v), tint),
                vertex(p(left_x, 0.0), p(left_u, start_uv.y), tint),
                vertex(p(left_x, top_y), p(left_u, top_v), tint),
                vertex(p(right_x, 0.0), p(right_u, start_uv.y), tint),
                vertex(p(right_x, top_y), p(right_u, top_v), tint),
                vertex(p(end_pos.x, 0.0), p(end_uv.x, start_uv.y), tint),
                vertex(p(end_pos.x, top_y), p(end_uv.x, top_v), tint),
                vertex(p(0.0, bottom_y), p(start_uv.x, bottom_v), tint),
                vertex(p(left_x, bottom_y), p(left_u, bottom_v), tint),
                vertex(p(right_x, bottom_y), p(right_u, bottom_v), tint),
                vertex(p(end_pos.x, bottom_y), p(end_uv.x, bottom_v), tint),
                vertex(p(0.0, end_pos.y), p(start_uv.x, end_uv.y), tint),
                vertex(p(left_x, end_pos.y), p(left_u, end_uv.y), tint),
                vertex(p(right_x, end_pos.y), p(right_u, end_uv.y), tint),
                vertex(end_pos, end_uv, tint),
            ]);

            const NINE_SLICE: [u32; 54] = [
                // top
                0, 1, 2, 2, 1, 3, 2, 3, 4, 4, 3, 5, 4, 5, 6, 6, 5, 7,
                // middle
                1, 8, 3, 3, 8, 9, 3, 9, 5, 5, 9, 10, 5, 10, 7, 7, 10, 11,
                // bottom
                8, 12, 9, 9, 12, 13, 9, 13, 10, 10, 13, 14, 10, 14, 11, 11, 14, 15,
            ];
            indices.extend(NINE_SLICE.iter().map(|i| index_start + i));

            if feather {
                let f = feather_step;
                let feather_start = vertices.len() as u32;
                vertices.extend_from_slice(&[
                    vertex(p(-f, -f), start_uv, FEATHER_COLOR),
                    vertex(p(left_x, -f), p(left_u, start_uv.y), FEATHER_COLOR),
                    vertex(p(right_x, -f), p(right_u, start_uv.y), FEATHER_COLOR),
                    vertex(p(end_pos.x + f, -f), p(end_uv.x, start_uv.y), FEATHER_COLOR),
                    vertex(p(-f, top_y), p(start_uv.x, top_v), FEATHER_COLOR),
                    vertex(p(-f, bottom_y), p(start_uv.x, bottom_v), FEATHER_COLOR),
                    vertex(p(end_pos.x + f, top_y), p(end_uv.x, top_v), FEATHER_COLOR),
                    vertex(p(end_pos.x + f, bottom_y), p(end_uv.x, bottom_v), FEATHER_COLOR),
                    vertex(p(-f, end_pos.y + f), p(start_uv.x, end_uv.y), FEATHER_COLOR),
                    vertex(p(left_x, end_pos.y + f), p(left_u, end_uv.y), FEATHER_COLOR),
                    vertex(p(right_x, end_pos.y + f), p(right_u, end_uv.y), FEATHER_COLOR),
                    vertex(p(end_pos.x + f, end_pos.y + f), end_uv, FEATHER_COLOR),
                ]);
                let fs = |i: u32| feather_start + i;
                let is = |i: u32| index_start + i;
                // top edge
                index_quad(indices, fs(0), fs(1), is(2), is(0));
                index_quad(indices, fs(1), fs(2), is(4), is(2));
                index_quad(indices, fs(2), fs(3), is(6), is(4));
                // left edge
                index_quad(indices, fs(0), is(0), is(1), fs(4));
                index_quad(indices, fs(4), is(1), is(8), fs(5));
                index_quad(indices, fs(5), is(8), is(12), fs(8));
                // right edge
                index_quad(indices, is(6), fs(3), fs(6), is(7));
                index_quad(indices, is(7), fs(6), fs(7), is(11));
                index_quad(indices, is(11), fs(7), fs(11), is(15));
                // bottom edge
                index_quad(indices, is(12), is(13), fs(9), fs(8));
                index_quad(indices, is(13), is(14), fs(10), fs(9));
                index_quad(indices, is(14), is(15), fs(11), fs(10));
            }
        } else {
            if mirror_u || mirror_v {
                let (uv_min, uv_max) = (start_uv, end_uv);
                if mirror_u {
                    start_uv.x = uv_max.x - (start_uv.x - uv_min.x);
                    end_uv.x = uv_max.x - (end_uv.x - uv_min.x);
                }
                if mirror_v {
                    start_uv.y = uv_max.y - (start_uv.y - uv_min.y);
                    end_uv.y = uv_max.y - (end_uv.y - uv_min.y);
                }
            }

            let top_right = Position::new(end_pos.x, 0.0);
            let bot_left = Position::new(0.0, end_pos.y);
            vertices.extend_from_slice(&[
                vertex(Position::ZERO, start_uv, tint),
                vertex(top_right, Position::new(end_uv.x, start_uv.y), tint),
                vertex(bot_left, Position::new(start_uv.x, end_uv.y), tint),
                vertex(end_pos, end_uv, tint),
            ]);
            indices.extend_from_slice(&[
                index_start,
                index_start + 1,
                index_start + 2,
                index_start + 2,
                index_start + 1,
                index_start + 3,
            ]);

            if feather {
                let f = feather_step;
                let feather_start = vertices.len() as u32;
                vertices.extend_from_slice(&[
                    vertex(Position::new(-f, -f), start_uv, FEATHER_COLOR),
                    vertex(top_right + Position::new(f, -f), Position::new(end_uv.x, start_uv.y), FEATHER_COLOR),
                    vertex(bot_left + Position::new(-f, f), Position::new(start_uv.x, end_uv.y), FEATHER_COLOR),
                    vertex(end_pos + Position::new(f, f), end_uv, FEATHER_COLOR),
                ]);
                let (tl, tr, bl, br) = (index_start, index_start + 1, index_start + 2, index_start + 3);
                let (f0, f1, f2, f3) = (feather_start, feather_start + 1, feather_start + 2, feather_start + 3);
                indices.extend_from_slice(&[
                    f0, f1, tr, //
                    f0, tr, tl, //
                    f0, bl, f2, //
                    f0, tl, bl, //
                    tr, f1, f3, //
                    tr, f3, br, //
                    bl, br, f3, //
                    f3, f2, bl,
                ]);
            }
        }
    }

    /// Font scale and the transform text quads are built in: glyphs are
    /// rasterized at the layout scale, so the scale is taken back out of
    /// the render transform.
    fn text_space(element: &DrawElement) -> (f32, SlateRenderTransform) {
        let font_scale = if element.scale != 0.0 { element.scale } else { 1.0 };
        let transform =
            SlateRenderTransform::from_scale(1.0 / font_scale).concatenate(&element.render_transform);
        (font_scale, transform)
    }

    fn add_text(&mut self, element: &DrawElement, payload: &TextPayload, rounding: VertexRounding) {
        let outline = payload.font_info.outline;
        let base_tint = self.pack(payload.tint);
        let outline_tint = self.pack(outline.outline_color);
        if payload.text.is_empty()
            || (base_tint.a == 0 && outline.outline_size == 0)
            || (base_tint.a == 0 && outline_tint.a == 0)
        {
            return;
        }

        let (font_scale, transform) = Self::text_space(element);
        let base_material = payload.font_info.font_material;

        if outline.outline_size > 0 {
            self.build_text_geometry(
                element,
                payload,
                &outline,
                outline_tint,
                None,
                element.layer,
                0.0,
                font_scale,
                &transform,
                rounding,
            );
            // the fill was measured without an outline
            let offset = (outline.outline_size as f32 * font_scale).round();
            self.build_text_geometry(
                element,
                payload,
                &FontOutlineSettings::NO_OUTLINE,
                base_tint,
                base_material,
                element.layer + 1,
                offset,
                font_scale,
                &transform,
                rounding,
            );
        } else {
            self.build_text_geometry(
                element,
                payload,
                &FontOutlineSettings::NO_OUTLINE,
                base_tint,
                base_material,
                element.layer,
                0.0,
                font_scale,
                &transform,
                rounding,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_text_geometry(
        &mut self,
        element: &DrawElement,
        payload: &TextPayload,
        outline: &FontOutlineSettings,
        tint: Color,
        font_material: Option<ResourceId>,
        layer: u32,
        outline_offset: f32,
        font_scale: f32,
        transform: &SlateRenderTransform,
        rounding: VertexRounding,
    ) {
        let font_info = &payload.font_info;
        let fallback = font_info.fallback;
        let mut list = self.font_cache.character_list(font_info, font_scale, outline);
        let max_height = list.max_height() as f32;

        let num_chars = payload.text.chars().count();
        let mut texture_index = None;
        let mut slot = None;
        let mut inv_texture_size = Position::ZERO;
        let mut line_x = 0.0f32;
        let mut pos_y = 0.0f32;
        let mut num_lines = 1u32;
        let mut previous: Option<CharacterEntry> = None;

        for (char_index, ch) in payload.text.chars().enumerate() {
            if ch == '\n' {
                pos_y += max_height;
                line_x = 0.0;
                num_lines += 1;
                previous = None;
                continue;
            }

            let entry = list.get_character(ch, fallback);
            if entry.has_area() && texture_index != Some(entry.texture_index) {
                match list.texture_resource(entry.texture_index) {
                    Some(texture) => {
                        slot = Some(self.target.find_batch(
                            self.stats,
                            layer,
                            ShaderParams::default(),
                            Some(texture),
                            DrawPrimitive::TriangleList,
                            ShaderType::Font,
                            element.draw_effects,
                            BatchDrawFlags::empty(),
                            element,
                        ));
                        inv_texture_size = Position::new(
                            1.0 / texture.width.max(1) as f32,
                            1.0 / texture.height.max(1) as f32,
                        );
                        texture_index = Some(entry.texture_index);
                    }
                    None => {
                        log::warn!("glyph refers to missing font texture {}", entry.texture_index);
                        slot = None;
                        texture_index = None;
                    }
                }
            }

            let is_whitespace = !entry.valid || ch.is_whitespace();
            let kerning = match &previous {
                Some(prev) if !is_whitespace => list.get_kerning(prev, &entry),
                _ => 0,
            };
            line_x += kerning as f32;
            previous = Some(entry);

            if !is_whitespace && entry.has_area() {
                if let Some(slot) = slot {
                    let x = line_x + entry.horizontal_offset as f32 + outline_offset;
                    let y = pos_y - entry.vertical_offset as f32 + max_height + entry.global_descender as f32;
                    let size = Position::new(entry.u_size as f32, entry.v_size as f32);
                    let (material_min, material_max) = match font_material {
                        Some(_) if max_height > 0.0 => {
                            let text_height = max_height * num_lines as f32;
                            (
                                Position::new(char_index as f32 / num_chars as f32, y / text_height),
                                Position::new(
                                    (char_index + 1) as f32 / num_chars as f32,
                                    (y + size.y) / text_height,
                                ),
                            )
                        }
                        _ => (Position::ZERO, Position::ZERO),
                    };
                    let quad = GlyphQuad {
                        upper_left: Position::new(x, y),
                        size,
                        uv: Position::new(entry.start_u as f32, entry.start_v as f32)
                            .component_mul(inv_texture_size),
                        size_uv: size.component_mul(inv_texture_size),
                        material_min,
                        material_max,
                    };
                    let (vertices, indices) = self.target.buffers(slot);
                    push_glyph_quad(vertices, indices, rounding, transform, &quad, tint);
                    self.stats.num_glyph_quads += 1;
                }
            }

            line_x += entry.x_advance as f32;
        }
    }

    fn add_shaped_text(&mut self, element: &DrawElement, payload: &ShapedTextPayload, rounding: VertexRounding) {
        let sequence = &payload.sequence;
        if sequence.glyphs_to_render().is_empty() {
            return;
        }
        let outline = *sequence.outline_settings();
        let base_tint = self.pack(payload.tint);
        let outline_tint = self.pack(payload.outline_tint);
        if (base_tint.a == 0 && outline.outline_size == 0) || (base_tint.a == 0 && outline_tint.a == 0) {
            return;
        }

        let (font_scale, transform) = Self::text_space(element);
        let base_material = sequence.font_material();

        if outline.outline_size > 0 {
            self.build_shaped_text_geometry(
                element,
                payload,
                &outline,
                outline_tint,
                None,
                element.layer,
                0.0,
                &transform,
                rounding,
            );
            let offset = (outline.outline_size as f32 * font_scale).round();
            self.build_shaped_text_geometry(
                element,
                payload,
                &FontOutlineSettings::NO_OUTLINE,
                base_tint,
                base_material,
                element.layer + 1,
                offset,
                &transform,
                rounding,
            );
        } else {
            self.build_shaped_text_geometry(
                element,
                payload,
                &FontOutlineSettings::NO_OUTLINE,
                base_tint,
                base_material,
                element.layer,
                0.0,
                &transform,
                rounding,
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_shaped_text_geometry(
        &mut self,
        element: &DrawElement,
        payload: &ShapedTextPayload,
        outline: &FontOutlineSettings,
        tint: Color,
        font_material: Option<ResourceId>,
        layer: u32,
        horizontal_offset: f32,
        transform: &SlateRenderTransform,
        rounding: VertexRounding,
    ) {
        let sequence = &payload.sequence;
        let glyphs = sequence.glyphs_to_render();
        let max_height = sequence.max_text_height() as f32;
        let text_baseline = sequence.text_baseline() as f32;
        let num_glyphs = glyphs.len();

        let mut texture_index = None;
        let mut slot = None;
        let mut inv_texture_size = Position::ZERO;
        let mut line_x = horizontal_offset;
        let mut line_y = 0.0f32;

        for (glyph_index, glyph) in glyphs.iter().enumerate() {
            if glyph.is_visible {
                let atlas_data = self.font_cache.get_shaped_glyph_font_atlas_data(glyph, outline);
                if atlas_data.has_area() {
                    if texture_index != Some(atlas_data.texture_index) {
                        match self.font_cache.get_slate_texture_resource(atlas_data.texture_index) {
                            Some(texture) => {
                                slot = Some(self.target.find_batch(
                                    self.stats,
                                    layer,
                                    ShaderParams::default(),
                                    Some(texture),
                                    DrawPrimitive::TriangleList,
                                    ShaderType::Font,
                                    element.draw_effects,
                                    BatchDrawFlags::empty(),
                                    element,
                                ));
                                inv_texture_size = Position::new(
                                    1.0 / texture.width.max(1) as f32,
                                    1.0 / texture.height.max(1) as f32,
                                );
                                texture_index = Some(atlas_data.texture_index);
                            }
                            None => {
                                log::warn!("glyph refers to missing font texture {}", atlas_data.texture_index);
                                slot = None;
                                texture_index = None;
                            }
                        }
                    }

                    if let Some(slot) = slot {
                        let x = line_x + atlas_data.horizontal_offset as f32 + glyph.x_offset as f32;
                        let y = line_y - atlas_data.vertical_offset as f32
                            + glyph.y_offset as f32
                            + max_height
                            + text_baseline;
                        let size = Position::new(atlas_data.u_size as f32, atlas_data.v_size as f32);
                        let (material_min, material_max) = match font_material {
                            Some(_) if max_height > 0.0 => (
                                Position::new(glyph_index as f32 / num_glyphs as f32, y / max_height),
                                Position::new(
                                    (glyph_index + 1) as f32 / num_glyphs as f32,
                                    (y + size.y) / max_height,
                                ),
                            ),
                            _ => (Position::ZERO, Position::ZERO),
                        };
                        let quad = GlyphQuad {
                            upper_left: Position::new(x, y),
                            size,
                            uv: Position::new(atlas_data.start_u as f32, atlas_data.start_v as f32)
                                .component_mul(inv_texture_size),
                            size_uv: size.component_mul(inv_texture_size),
                            material_min,
                            material_max,
                        };
                        let (vertices, indices) = self.target.buffers(slot);
                        push_glyph_quad(vertices, indices, rounding, transform, &quad, tint);
                        self.stats.num_glyph_quads += 1;
                    }
                }
            }

            line_x += glyph.x_advance as f32;
            line_y += glyph.y_advance as f32;
        }
    }

    fn add_gradient(&mut self, element: &DrawElement, payload: &GradientPayload, rounding: VertexRounding) {
        if payload.stops.is_empty() {
            return;
        }
        let slot = self.target.find_batch(
            self.stats,
            element.layer,
            ShaderParams::default(),
            None,
            DrawPrimitive::TriangleList,
            ShaderType::Default,
            element.draw_effects,
            payload.batch_flags,
            element,
        );

        let t = &element.render_transform;
        let local_size = element.local_size.as_position();
        let stops = bounded_gradient_stops(payload, element.local_size);

        let (vertices, indices) = self.target.buffers(slot);
        for (stop_index, stop) in stops.iter().enumerate() {
            let index_start = vertices.len() as u32;
            let (start_pt, end_pt) = match payload.orientation {
                Orientation::Vertical => (
                    Position::new(stop.position.x, 0.0),
                    Position::new(stop.position.x, local_size.y),
                ),
                Orientation::Horizontal => (
                    Position::new(0.0, stop.position.y),
                    Position::new(local_size.x, stop.position.y),
                ),
            };
            // stop colors are packed without gamma conversion
            let color = stop.color.to_color(false);
            vertices.push(SlateVertex::make(rounding, t, start_pt, Position::ZERO, Position::ZERO, color));
            vertices.push(SlateVertex::make(rounding, t, end_pt, Position::ZERO, Position::ZERO, color));

            if stop_index > 0 {
                indices.extend_from_slice(&[
                    index_start - 2,
                    index_start - 1,
                    index_start,
                    index_start,
                    index_start - 1,
                    index_start + 1,
                ]);
            }
        }
    }

    fn add_spline(&mut self, element: &DrawElement, payload: &SplinePayload, rounding: VertexRounding) {
        let t = &element.render_transform;
        let (start_pt, start_dir) = (payload.start, payload.start_dir);
        let (end_pt, end_dir) = (payload.end, payload.end_dir);

        let mut num_steps = spline_step_count(payload);
        let stops = &payload.gradient_stops;
        let color_gradient = stops.len() >= 2;
        let mut gradient_sub_steps = 0.0;
        if color_gradient {
            let gradient_steps = (stops.len() - 1) as f32;
            gradient_sub_steps = (num_steps / gradient_steps).ceil();
            num_steps = gradient_steps * gradient_sub_steps;
        }

        let thickness = (element.inverse_layout_scale() * payload.thickness).max(1.0);
        let line_thickness = ((2.0 * LINE_AA_RADIUS + thickness) * std::f32::consts::SQRT_2).ceil();
        let half_thickness = line_thickness * 0.5 + LINE_AA_RADIUS;

        let slot = self.target.find_batch(
            self.stats,
            element.layer,
            ShaderParams::pixel([payload.thickness, LINE_AA_RADIUS, 0.0, 0.0]),
            None,
            DrawPrimitive::TriangleList,
            ShaderType::LineSegment,
            element.draw_effects,
            BatchDrawFlags::empty(),
            element,
        );

        let mut color = match stops.first() {
            Some(stop) if stops.len() == 1 || color_gradient => self.pack(stop.color),
            _ => self.pack(payload.tint),
        };
        let mut stop_colors = Vec::with_capacity(num_steps as usize);
        if color_gradient {
            for step in 0..num_steps as usize {
                let interp = ((stops.len() - 1) as f32).min((step as f32 + 1.0) / gradient_sub_steps);
                let color_index = (interp.ceil() as usize).clamp(1, stops.len() - 1);
                let alpha = interp - (color_index - 1) as f32;
                stop_colors.push(self.pack(LinearColor::lerp_using_hsv(
                    stops[color_index - 1].color,
                    stops[color_index].color,
                    alpha,
                )));
            }
        }

        let (vertices, indices) = self.target.buffers(slot);
        let normal = Position::new(start_pt.y - end_pt.y, end_pt.x - start_pt.x).safe_normal();
        let mut up = normal * half_thickness;

        let mut start_pos = start_pt;
        let mut end_pos = cubic_interp(start_pt, start_dir, end_pt, end_dir, 1.0 / num_steps);
        vertices.push(SlateVertex::make(
            rounding,
            t,
            start_pos + up,
            t.transform_point(start_pos),
            t.transform_point(end_pos),
            color,
        ));
        vertices.push(SlateVertex::make(
            rounding,
            t,
            start_pos - up,
            t.transform_point(start_pos),
            t.transform_point(end_pos),
            color,
        ));

        for step in 0..num_steps as usize {
            if step > 0 {
                let alpha = (step as f32 + 1.0) / num_steps;
                end_pos = cubic_interp(start_pt, start_dir, end_pt, end_dir, alpha);
            }
            if let Some(step_color) = stop_colors.get(step) {
                color = *step_color;
            }

            let index_start = vertices.len() as u32;
            let segment_normal =
                Position::new(start_pos.y - end_pos.y, end_pos.x - start_pos.x).safe_normal();
            up = segment_normal * half_thickness;

            let start_render = t.transform_point(start_pos);
            let end_render = t.transform_point(end_pos);
            vertices.push(SlateVertex::make(rounding, t, end_pos + up, start_render, end_render, color));
            vertices.push(SlateVertex::make(rounding, t, end_pos - up, start_render, end_render, color));

            indices.extend_from_slice(&[
                index_start - 2,
                index_start - 1,
                index_start,
                index_start,
                index_start + 1,
                index_start - 1,
            ]);
            start_pos = end_pos;
        }
    }

    fn point_color(&self, payload: &LinePayload, index: usize) -> Color {
        match payload.point_colors.as_ref().and_then(|colors| colors.get(index)) {
            Some(color) => self.pack(color.mul_color(payload.tint)),
            None => self.pack(payload.tint),
        }
    }

    fn add_lines(&mut self, element: &DrawElement, payload: &LinePayload, rounding: VertexRounding) {
        let points = &payload.points;
        if points.len() < 2 {
            return;
        }
        let t = &element.render_transform;

        if payload.antialias {
            let line_thickness = ((2.0 * LINE_AA_RADIUS + payload.thickness) * std::f32::consts::SQRT_2).ceil();
            let half_thickness = line_thickness * 0.5 + LINE_AA_RADIUS;
            let colors: Vec<Color> = (0..points.len()).map(|i| self.point_color(payload, i)).collect();

            let slot = self.target.find_batch(
                self.stats,
                element.layer,
                ShaderParams::pixel([payload.thickness, LINE_AA_RADIUS, 0.0, 0.0]),
                None,
                DrawPrimitive::TriangleList,
                ShaderType::LineSegment,
                element.draw_effects,
                BatchDrawFlags::empty(),
                element,
            );
            let (vertices, indices) = self.target.buffers(slot);

            let mut start_pos = points[0];
            let end_pos = points[1];
            let up = Position::new(start_pos.y - end_pos.y, end_pos.x - start_pos.x).safe_normal() * half_thickness;
            let start_render = t.transform_point(start_pos);
            let end_render = t.transform_point(end_pos);
            vertices.push(SlateVertex::make(rounding, t, start_pos + up, start_render, end_render, colors[0]));
            vertices.push(SlateVertex::make(rounding, t, start_pos - up, start_render, end_render, colors[0]));

            for point in 1..points.len() {
                let end_pos = points[point];
                let mut index_start = vertices.len() as u32;
                let up = Position::new(start_pos.y - end_pos.y, end_pos.x - start_pos.x).safe_normal()
                    * half_thickness;

                let mut intersect_upper = end_pos + up;
                let mut intersect_lower = end_pos - up;
                let mut intersect_center = end_pos;

                if let Some(&next_end_pos) = points.get(point + 1) {
                    let next_up = Position::new(end_pos.y - next_end_pos.y, next_end_pos.x - end_pos.x)
                        .safe_normal()
                        * half_thickness;
                    if let Some(hit) =
                        line_intersect(start_pos + up, end_pos + up, end_pos + next_up, next_end_pos + next_up)
                    {
                        intersect_upper = hit;
                    }
                    if let Some(hit) =
                        line_intersect(start_pos - up, end_pos - up, end_pos - next_up, next_end_pos - next_up)
                    {
                        intersect_lower = hit;
                    }
                    intersect_center = (intersect_upper + intersect_lower) * 0.5;
                }

                let start_render = t.transform_point(start_pos);
                let center_render = t.transform_point(intersect_center);

                if point > 1 {
                    // the joint vertices are shared, but each segment needs its own endpoints
                    let mut v1 = vertices[index_start as usize - 1];
                    let mut v2 = vertices[index_start as usize - 2];
                    let segment = [start_render.x, start_render.y, center_render.x, center_render.y];
                    v1.tex_coords = segment;
                    v2.tex_coords = segment;
                    vertices.push(v2);
                    vertices.push(v1);
                    index_start += 2;
                }

                let color = colors[point];
                vertices.push(SlateVertex::make(rounding, t, intersect_upper, start_render, center_render, color));
                vertices.push(SlateVertex::make(rounding, t, intersect_lower, start_render, center_render, color));

                indices.extend_from_slice(&[
                    index_start - 1,
                    index_start - 2,
                    index_start,
                    index_start,
                    index_start + 1,
                    index_start - 1,
                ]);
                start_pos = end_pos;
            }
        } else if payload.thickness == 1.0 {
            let colors: Vec<Color> = (0..points.len()).map(|i| self.point_color(payload, i)).collect();
            let slot = self.target.find_batch(
                self.stats,
                element.layer,
                ShaderParams::default(),
                None,
                DrawPrimitive::LineList,
                ShaderType::Default,
                element.draw_effects,
                BatchDrawFlags::empty(),
                element,
            );
            let (vertices, indices) = self.target.buffers(slot);
            for (point, pair) in points.windows(2).enumerate() {
                let index_start = vertices.len() as u32;
                vertices.push(SlateVertex::make_uv(rounding, t, pair[0], Position::ZERO, colors[point]));
                vertices.push(SlateVertex::make_uv(rounding, t, pair[1], Position::ZERO, colors[point + 1]));
                indices.extend_from_slice(&[index_start, index_start + 1]);
            }
        } else {
            let colors: Vec<Color> = (0..points.len()).map(|i| self.point_color(payload, i)).collect();
            let slot = self.target.find_batch(
                self.stats,
                element.layer,
                ShaderParams::default(),
                None,
                DrawPrimitive::TriangleList,
                ShaderType::Default,
                element.draw_effects,
                BatchDrawFlags::empty(),
                element,
            );
            let (vertices, indices) = self.target.buffers(slot);
            for (point, pair) in points.windows(2).enumerate() {
                let index_start = vertices.len() as u32;
                let (start_pos, end_pos) = (pair[0], pair[1]);
                let half = (end_pos - start_pos).safe_normal() * (payload.thickness * 0.5);
                let side_a = Position::new(half.y, -half.x);
                let side_b = Position::new(-half.y, half.x);
                let (start_color, end_color) = (colors[point], colors[point + 1]);

                vertices.push(SlateVertex::make(rounding, t, start_pos + side_a, Position::ZERO, Position::ZERO, start_color));
                vertices.push(SlateVertex::make(rounding, t, start_pos + side_b, Position::ZERO, Position::ZERO, start_color));
                vertices.push(SlateVertex::make(rounding, t, end_pos + side_a, Position::ZERO, Position::ZERO, end_color));
                vertices.push(SlateVertex::make(rounding, t, end_pos + side_b, Position::ZERO, Position::ZERO, end_color));
                indices.extend_from_slice(&[
                    index_start,
                    index_start + 1,
                    index_start + 2,
                    index_start + 2,
                    index_start + 1,
                    index_start + 3,
                ]);
            }
        }
    }

    fn add_viewport(&mut self, element: &DrawElement, payload: &ViewportPayload, rounding: VertexRounding) {
        let color = self.pack(payload.tint);
        // the font shader is the default shader reading an alpha-only texture
        let shader_type = if payload.alpha_only {
            ShaderType::Font
        } else {
            ShaderType::Default
        };
        let slot = self.target.find_batch(
            self.stats,
            element.layer,
            ShaderParams::default(),
            payload.render_target,
            DrawPrimitive::TriangleList,
            shader_type,
            element.draw_effects,
            payload.batch_flags,
            element,
        );

        let mut bot_right = element.local_size.as_position();
        if let Some(target) = payload.render_target {
            if !payload.allow_scaling {
                self.stats.requires_vsync |= payload.requires_vsync;
                bot_right = Position::new(target.width as f32, target.height as f32);
            }
        }

        let t = &element.render_transform;
        let (vertices, indices) = self.target.buffers(slot);
        let index_start = vertices.len() as u32;
        vertices.push(SlateVertex::make_uv(rounding, t, Position::ZERO, Position::new(0.0, 0.0), color));
        vertices.push(SlateVertex::make_uv(
            rounding,
            t,
            Position::new(bot_right.x, 0.0),
            Position::new(1.0, 0.0),
            color,
        ));
        vertices.push(SlateVertex::make_uv(
            rounding,
            t,
            Position::new(0.0, bot_right.y),
            Position::new(0.0, 1.0),
            color,
        ));
        vertices.push(SlateVertex::make_uv(rounding, t, bot_right, Position::new(1.0, 1.0), color));
        indices.extend_from_slice(&[
            index_start,
            index_start + 1,
            index_start + 2,
            index_start + 2,
            index_start + 1,
            index_start + 3,
        ]);
    }

    fn add_border(&mut self, element: &DrawElement, payload: &BoxPayload, rounding: VertexRounding) {
        let Some(proxy) = payload.brush.resource else {
            log::warn!("border brush without a texture, nothing drawn");
            return;
        };
        // borders tile, so they are never atlased and the proxy holds the whole texture
        let texture = proxy.resource;
        let texture_size = Position::new(texture.width.max(1) as f32, texture.height.max(1) as f32);
        let texture_size_local = texture_size * element.inverse_layout_scale();
        let local_size = element.local_size;
        let draw_scale = element.scale;

        let pco = self.pixel_center_offset;
        let half_texel = Position::new(pco / texture_size.x, pco / texture_size.y);
        let start_uv = half_texel;
        let end_uv = Position::splat(1.0) + half_texel;

        let margin = payload.brush.margin;
        let end_pos = local_size.as_position();
        let mut left_x = texture_size_local.x * margin.left;
        let mut top_y = texture_size_local.y * margin.top;
        let mut right_x = local_size.width - texture_size_local.x * margin.right;
        let mut bottom_y = local_size.height - texture_size_local.y * margin.bottom;

        if right_x < left_x {
            left_x = local_size.width / 2.0;
            right_x = left_x;
        }
        if bottom_y < top_y {
            top_y = local_size.height / 2.0;
            bottom_y = top_y;
        }

        let left_u = margin.left.max(0.0) + half_texel.x;
        let top_v = margin.top.max(0.0) + half_texel.y;
        let right_u = if margin.right > 0.0 { 1.0 - margin.right } else { 1.0 } + half_texel.x;
        let bottom_v = if margin.bottom > 0.0 { 1.0 - margin.bottom } else { 1.0 } + half_texel.y;

        // repeats of the tiled middle section along each edge
        let tiling = |span: f32, texels: f32, margins: f32| {
            let denominator = texels * (1.0 - margins);
            if denominator > 0.0 {
                (span / denominator).max(1.0)
            } else {
                1.0
            }
        };
        let top_tiling = tiling(right_x - left_x, texture_size_local.x, margin.left + margin.right);
        let left_tiling = tiling(bottom_y - top_y, texture_size_local.y, margin.top + margin.bottom);
        let right_tiling = left_tiling;
        let bottom_tiling = top_tiling;

        let slot = self.target.find_batch(
            self.stats,
            element.layer,
            ShaderParams::pixel([left_u, right_u, top_v, bottom_v]),
            Some(texture),
            DrawPrimitive::TriangleList,
            ShaderType::Border,
            element.draw_effects,
            BatchDrawFlags::TILE_U | BatchDrawFlags::TILE_V,
            element,
        );

        let tint = self.pack(payload.tint);
        let t = &element.render_transform;
        let (vertices, indices) = self.target.buffers(slot);
        let index_start = vertices.len() as u32;
        let v = |x: f32, y: f32, tex: [f32; 4]| {
            SlateVertex::make_sized(rounding, t, Position::new(x, y), local_size, draw_scale, tex, tint)
        };
        let (su, sv, eu, ev) = (start_uv.x, start_uv.y, end_uv.x, end_uv.y);
        let (ex, ey) = (end_pos.x, end_pos.y);

        // a zero tiling component passes the uv straight through for corners
        vertices.extend_from_slice(&[
            // top left corner
            v(0.0, 0.0, [su, sv, 0.0, 0.0]),
            v(0.0, top_y, [su, top_v, 0.0, 0.0]),
            v(left_x, 0.0, [left_u, sv, 0.0, 0.0]),
            v(left_x, top_y, [left_u, top_v, 0.0, 0.0]),
            // top edge
            v(left_x, 0.0, [su, sv, top_tiling, 0.0]),
            v(left_x, top_y, [su, top_v, top_tiling, 0.0]),
            v(right_x, 0.0, [eu, sv, top_tiling, 0.0]),
            v(right_x, top_y, [eu, top_v, top_tiling, 0.0]),
            // top right corner
            v(right_x, 0.0, [right_u, sv, 0.0, 0.0]),
            v(right_x, top_y, [right_u, top_v, 0.0, 0.0]),
            v(ex, 0.0, [eu, sv, 0.0, 0.0]),
            v(ex, top_y, [eu, top_v, 0.0, 0.0]),
            // left edge
            v(0.0, top_y, [su, sv, 0.0, left_tiling]),
            v(0.0, bottom_y, [su, ev, 0.0, left_tiling]),
            v(left_x, top_y, [left_u, sv, 0.0, left_tiling]),
            v(left_x, bottom_y, [left_u, ev, 0.0, left_tiling]),
            // right edge
            v(right_x, top_y, [right_u, sv, 0.0, right_tiling]),
            v(right_x, bottom_y, [right_u, ev, 0.0, right_tiling]),
            v(ex, top_y, [eu, sv, 0.0, right_tiling]),
            v(ex, bottom_y, [eu, ev, 0.0, right_tiling]),
            // bottom left corner
            v(0.0, bottom_y, [su, bottom_v, 0.0, 0.0]),
            v(0.0, ey, [su, ev, 0.0, 0.0]),
            v(left_x, bottom_y, [left_u, bottom_v, 0.0, 0.0]),
            v(left_x, ey, [left_u, ev, 0.0, 0.0]),
            // bottom edge
            v(left_x, bottom_y, [su, bottom_v, bottom_tiling, 0.0]),
            v(left_x, ey, [su, ev, bottom_tiling, 0.0]),
            v(right_x, bottom_y, [eu, bottom_v, bottom_tiling, 0.0]),
            v(right_x, ey, [eu, ev, bottom_tiling, 0.0]),
            // bottom right corner
            v(right_x, bottom_y, [right_u, bottom_v, 0.0, 0.0]),
            v(right_x, ey, [right_u, ev, 0.0, 0.0]),
            v(ex, bottom_y, [eu, bottom_v, 0.0, 0.0]),
            v(ex, ey, [eu, ev, 0.0, 0.0]),
        ]);

        for quad in 0..8u32 {
            let b = index_start + quad * 4;
            indices.extend_from_slice(&[b, b + 1, b + 2, b + 2, b + 1, b + 3]);
        }
    }

    fn add_custom_verts(&mut self, element: &DrawElement, payload: &CustomVertsPayload) {
        if payload.vertices.is_empty() {
            return;
        }
        let key = BatchKey {
            instance_count: payload.instance_count,
            instance_offset: payload.instance_offset,
            ..BatchKey::new(
                ShaderParams::default(),
                ShaderType::Custom,
                DrawPrimitive::TriangleList,
                element.draw_effects,
                payload.batch_flags,
                element.clipping_index,
                element.scene_index,
            )
        };
        let mut batch = ElementBatch::new(payload.resource, key);
        let slot = BatchSlot {
            vertex_array: self.target.data.assign_vertex_array_to_batch(&mut batch),
            index_array: self.target.data.assign_index_array_to_batch(&mut batch),
        };
        self.target.push_unmerged(self.stats, element.layer, batch);

        // already in vertex format, a straight copy
        let (vertices, indices) = self.target.buffers(slot);
        vertices.extend_from_slice(&payload.vertices);
        indices.extend_from_slice(&payload.indices);
    }

    fn add_post_process_pass(&mut self, element: &DrawElement, payload: &PostProcessPayload) {
        self.stats.num_post_process_passes += 1;

        let viewport = self.viewport_size;
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            log::debug!("post process pass skipped, window has no area");
            return;
        }
        // rotated or skewed regions are not supported
        let t = &element.render_transform;
        let top_left = t.transform_point(Position::ZERO).round();
        let bot_right = t.transform_point(element.local_size.as_position()).round();
        let size_uv = (bot_right - top_left).component_div(viewport.as_position());

        if size_uv.x > 0.0 && size_uv.y > 0.0 {
            let params = ShaderParams::pixel2(
                [top_left.x, top_left.y, bot_right.x, bot_right.y],
                [payload.data[0], payload.data[1], payload.downsample_amount as f32, 0.0],
            );
            let key = BatchKey::new(
                params,
                ShaderType::PostProcess,
                DrawPrimitive::TriangleList,
                DrawEffects::NONE,
                BatchDrawFlags::empty(),
                element.clipping_index,
                None,
            );
            self.target
                .push_unmerged(self.stats, element.layer, ElementBatch::new(None, key));
        }
    }
}

/// Gradient stops extended so the first sits at the element's leading edge
/// and the last at its trailing edge, each repeating its neighbour's color.
pub fn bounded_gradient_stops(
    payload: &GradientPayload,
    local_size: Size,
) -> Vec<crate::draw_elements::GradientStop> {
    use crate::draw_elements::GradientStop;

    let mut stops = payload.stops.clone();
    let (Some(first), Some(last)) = (stops.first().copied(), stops.last().copied()) else {
        return stops;
    };
    let (first_pos, last_pos, extent) = match payload.orientation {
        Orientation::Vertical => (first.position.x, last.position.x, local_size.width),
        Orientation::Horizontal => (first.position.y, last.position.y, local_size.height),
    };
    if 0.0 < first_pos {
        stops.insert(0, GradientStop::new(Position::ZERO, first.color));
    }
    if extent > last_pos {
        stops.push(GradientStop::new(local_size.as_position(), last.color));
    }
    stops
}

/// Segments a spline is cut into before any gradient alignment.
pub fn spline_step_count(payload: &SplinePayload) -> f32 {
    let direct_length = (payload.end - payload.start).length();
    let handle_length = ((payload.end - payload.end_dir) - (payload.start + payload.start_dir)).length();
    (direct_length.max(handle_length) / SPLINE_PIXELS_PER_STEP)
        .ceil()
        .clamp(1.0, SPLINE_MAX_STEPS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_segments_do_not_intersect() {
        let hit = line_intersect(
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            Position::new(0.0, 5.0),
            Position::new(10.0, 5.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn crossing_segments_meet() {
        let hit = line_intersect(
            Position::new(0.0, 0.0),
            Position::new(10.0, 10.0),
            Position::new(0.0, 10.0),
            Position::new(10.0, 0.0),
        );
        let hit = hit.map(|p| (p.x, p.y));
        assert_eq!(hit, Some((5.0, 5.0)));
    }

    #[test]
    fn hermite_hits_both_endpoints() {
        let p0 = Position::new(1.0, 2.0);
        let p1 = Position::new(9.0, -3.0);
        let t = Position::new(4.0, 4.0);
        assert_eq!(cubic_interp(p0, t, p1, t, 0.0), p0);
        assert_eq!(cubic_interp(p0, t, p1, t, 1.0), p1);
    }

    #[test]
    fn snapping_follows_draw_effects() {
        assert_eq!(vertex_rounding(DrawEffects::NONE), VertexRounding::Enabled);
        assert_eq!(vertex_rounding(DrawEffects::NO_PIXEL_SNAPPING), VertexRounding::Disabled);
        assert_eq!(
            effect_draw_flags(DrawEffects::NO_BLENDING | DrawEffects::DISABLED_EFFECT),
            BatchDrawFlags::NO_BLENDING
        );
    }
}
