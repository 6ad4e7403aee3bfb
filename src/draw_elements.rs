use bitflags::bitflags;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::batch::{BatchData, BatchDrawFlags, CachedRenderData, ElementBatchMap};
use crate::font::{FontInfo, ShapedGlyphSequence};
use crate::renderer::RenderBackend;
use crate::resources::{BrushDrawType, ShaderResource, SlateBrush};
use crate::utils::{LinearColor, Position, Rectangle, SlateIndex, SlateRenderTransform, SlateVertex, Size};

bitflags! {
    /// Per-element render effects. Part of the batch key.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawEffects: u8 {
        const NONE = 0;
        const DISABLED_EFFECT = 1 << 0;
        const IGNORE_TEXTURE_ALPHA = 1 << 1;
        const PRE_MULTIPLIED_ALPHA = 1 << 2;
        const NO_GAMMA = 1 << 3;
        const INVERT_ALPHA = 1 << 4;
        const NO_PIXEL_SNAPPING = 1 << 5;
        const NO_BLENDING = 1 << 6;
    }
}

/// Where and how big an element is, in both layout and render space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintGeometry {
    pub position: Position,
    pub local_size: Size,
    pub scale: f32,
    pub render_transform: SlateRenderTransform,
}

impl PaintGeometry {
    /// Layout-only geometry: local space is scaled by `scale` then moved to
    /// `position`.
    pub fn new(position: Position, local_size: Size, scale: f32) -> Self {
        Self {
            position,
            local_size,
            scale,
            render_transform: SlateRenderTransform::from_scale_translation(scale, position),
        }
    }

    pub fn with_render_transform(mut self, render_transform: SlateRenderTransform) -> Self {
        self.render_transform = render_transform;
        self
    }

    pub fn draw_size(&self) -> Size {
        self.local_size * self.scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRotation {
    /// radians
    pub angle: f32,
    /// local space pivot
    pub point: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxPayload {
    pub brush: SlateBrush,
    pub tint: LinearColor,
    pub batch_flags: BatchDrawFlags,
    pub rotation: Option<BoxRotation>,
}

#[derive(Debug, Clone)]
pub struct TextPayload {
    pub text: String,
    pub font_info: FontInfo,
    pub tint: LinearColor,
}

#[derive(Debug, Clone)]
pub struct ShapedTextPayload {
    pub sequence: Arc<ShapedGlyphSequence>,
    pub tint: LinearColor,
    pub outline_tint: LinearColor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    /// local space position along the gradient axis
    pub position: Position,
    pub color: LinearColor,
}

impl GradientStop {
    pub fn new(position: Position, color: LinearColor) -> Self {
        Self { position, color }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// stops run left to right
    Vertical,
    /// stops run top to bottom
    Horizontal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientPayload {
    pub stops: Vec<GradientStop>,
    pub orientation: Orientation,
    pub batch_flags: BatchDrawFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplinePayload {
    pub start: Position,
    pub start_dir: Position,
    pub end: Position,
    pub end_dir: Position,
    pub thickness: f32,
    pub tint: LinearColor,
    pub gradient_stops: Vec<GradientStop>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePayload {
    pub points: Vec<Position>,
    pub point_colors: Option<Vec<LinearColor>>,
    pub tint: LinearColor,
    pub antialias: bool,
    pub thickness: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportPayload {
    pub render_target: Option<ShaderResource>,
    pub allow_scaling: bool,
    pub alpha_only: bool,
    pub requires_vsync: bool,
    pub tint: LinearColor,
    pub batch_flags: BatchDrawFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomVertsPayload {
    pub resource: Option<ShaderResource>,
    pub vertices: Vec<SlateVertex>,
    pub indices: Vec<SlateIndex>,
    pub instance_count: u32,
    pub instance_offset: u32,
    pub batch_flags: BatchDrawFlags,
}

#[derive(Debug, Clone)]
pub struct CachedBufferPayload {
    pub data: Arc<CachedRenderData>,
    pub offset: Position,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessPayload {
    /// effect specific values, for blur the kernel size and strength
    pub data: [f32; 2],
    pub downsample_amount: i32,
}

/// Caller side drawing executed on the render thread in place of a batch.
pub trait CustomSlateElement: Send + Sync {
    fn draw_render_thread(&self, backend: &mut dyn RenderBackend);
}

#[derive(Debug, Clone)]
pub enum ElementPayload {
    Box(BoxPayload),
    DebugQuad(LinearColor),
    Text(TextPayload),
    ShapedText(ShapedTextPayload),
    Spline(SplinePayload),
    Line(LinePayload),
    Gradient(GradientPayload),
    Viewport(ViewportPayload),
    Border(BoxPayload),
    Custom(Weak<dyn CustomSlateElement>),
    CustomVerts(CustomVertsPayload),
    CachedBuffer(CachedBufferPayload),
    Layer(DrawLayerHandle),
    PostProcessPass(PostProcessPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ElementKind {
    Box,
    DebugQuad,
    Text,
    ShapedText,
    Spline,
    Line,
    Gradient,
    Viewport,
    Border,
    Custom,
    CustomVerts,
    CachedBuffer,
    Layer,
    PostProcessPass,
}

impl ElementPayload {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementPayload::Box(_) => ElementKind::Box,
            ElementPayload::DebugQuad(_) => ElementKind::DebugQuad,
            ElementPayload::Text(_) => ElementKind::Text,
            ElementPayload::ShapedText(_) => ElementKind::ShapedText,
            ElementPayload::Spline(_) => ElementKind::Spline,
            ElementPayload::Line(_) => ElementKind::Line,
            ElementPayload::Gradient(_) => ElementKind::Gradient,
            ElementPayload::Viewport(_) => ElementKind::Viewport,
            ElementPayload::Border(_) => ElementKind::Border,
            ElementPayload::Custom(_) => ElementKind::Custom,
            ElementPayload::CustomVerts(_) => ElementKind::CustomVerts,
            ElementPayload::CachedBuffer(_) => ElementKind::CachedBuffer,
            ElementPayload::Layer(_) => ElementKind::Layer,
            ElementPayload::PostProcessPass(_) => ElementKind::PostProcessPass,
        }
    }
}

/// One recorded drawing request.
#[derive(Debug, Clone)]
pub struct DrawElement {
    pub layer: u32,
    pub render_transform: SlateRenderTransform,
    pub position: Position,
    pub local_size: Size,
    pub scale: f32,
    pub draw_effects: DrawEffects,
    pub clipping_index: Option<usize>,
    pub scene_index: Option<u32>,
    pub payload: ElementPayload,
}

impl DrawElement {
    pub fn new(
        layer: u32,
        geometry: &PaintGeometry,
        draw_effects: DrawEffects,
        payload: ElementPayload,
    ) -> Self {
        Self {
            layer,
            render_transform: geometry.render_transform,
            position: geometry.position,
            local_size: geometry.local_size,
            scale: geometry.scale,
            draw_effects,
            clipping_index: None,
            scene_index: None,
            payload,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.payload.kind()
    }

    /// Transform back from layout space to local space.
    pub fn inverse_layout_scale(&self) -> f32 {
        if self.scale != 0.0 {
            1.0 / self.scale
        } else {
            1.0
        }
    }

    fn should_cull(geometry: &PaintGeometry) -> bool {
        geometry.local_size.width == 0.0 || geometry.local_size.height == 0.0
    }

    pub fn make_box(
        layer: u32,
        geometry: &PaintGeometry,
        brush: &SlateBrush,
        draw_effects: DrawEffects,
        tint: LinearColor,
    ) -> Option<Self> {
        if Self::should_cull(geometry) || brush.draw_as == BrushDrawType::NoDrawType || tint.a == 0.0 {
            return None;
        }
        let payload = BoxPayload {
            brush: brush.clone(),
            tint,
            batch_flags: BatchDrawFlags::empty(),
            rotation: None,
        };
        let payload = if brush.draw_as == BrushDrawType::Border {
            if brush.resource.is_none() {
                log::warn!("border brush without a texture, skipping element");
                return None;
            }
            ElementPayload::Border(payload)
        } else {
            ElementPayload::Box(payload)
        };
        Some(Self::new(layer, geometry, draw_effects, payload))
    }

    /// Box rotated by `angle` radians around `rotation_point` in local space.
    pub fn make_rotated_box(
        layer: u32,
        geometry: &PaintGeometry,
        brush: &SlateBrush,
        draw_effects: DrawEffects,
        angle: f32,
        rotation_point: Option<Position>,
        tint: LinearColor,
    ) -> Option<Self> {
        let mut element = Self::make_box(layer, geometry, brush, draw_effects, tint)?;
        let point = rotation_point.unwrap_or(Position::new(
            geometry.local_size.width * 0.5,
            geometry.local_size.height * 0.5,
        ));
        if let ElementPayload::Box(payload) | ElementPayload::Border(payload) = &mut element.payload {
            payload.rotation = Some(BoxRotation { angle, point });
        }
        Some(element)
    }

    pub fn make_debug_quad(layer: u32, geometry: &PaintGeometry, color: LinearColor) -> Self {
        Self::new(layer, geometry, DrawEffects::NONE, ElementPayload::DebugQuad(color))
    }

    /// Text element for the character range `[start, end)` of `text`.
    pub fn make_text(
        layer: u32,
        geometry: &PaintGeometry,
        text: &str,
        range: Option<std::ops::Range<usize>>,
        font_info: &FontInfo,
        draw_effects: DrawEffects,
        tint: LinearColor,
    ) -> Option<Self> {
        let text: String = match range {
            Some(range) => text
                .chars()
                .skip(range.start)
                .take(range.end.saturating_sub(range.start))
                .collect(),
            None => text.to_string(),
        };
        if text.is_empty() {
            return None;
        }
        Some(Self::new(
            layer,
            geometry,
            draw_effects,
            ElementPayload::Text(TextPayload {
                text,
                font_info: font_info.clone(),
                tint,
            }),
        ))
    }

    pub fn make_shaped_text(
        layer: u32,
        geometry: &PaintGeometry,
        sequence: Arc<ShapedGlyphSequence>,
        draw_effects: DrawEffects,
        tint: LinearColor,
        outline_tint: LinearColor,
    ) -> Option<Self> {
        if sequence.glyphs_to_render().is_empty() {
            return None;
        }
        Some(Self::new(
            layer,
            geometry,
            draw_effects,
            ElementPayload::ShapedText(ShapedTextPayload {
                sequence,
                tint,
                outline_tint,
            }),
        ))
    }

    pub fn make_gradient(
        layer: u32,
        geometry: &PaintGeometry,
        stops: Vec<GradientStop>,
        orientation: Orientation,
        draw_effects: DrawEffects,
    ) -> Option<Self> {
        if Self::should_cull(geometry) || stops.is_empty() {
            return None;
        }
        Some(Self::new(
            layer,
            geometry,
            draw_effects,
            ElementPayload::Gradient(GradientPayload {
                stops,
                orientation,
                batch_flags: BatchDrawFlags::empty(),
            }),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn make_spline(
        layer: u32,
        geometry: &PaintGeometry,
        start: Position,
        start_dir: Position,
        end: Position,
        end_dir: Position,
        thickness: f32,
        draw_effects: DrawEffects,
        tint: LinearColor,
    ) -> Self {
        Self::new(
            layer,
            geometry,
            draw_effects,
            ElementPayload::Spline(SplinePayload {
                start,
                start_dir,
                end,
                end_dir,
                thickness,
                tint,
                gradient_stops: Vec::new(),
            }),
        )
    }

    /// Cubic spline between `p0` and `p3` with bezier control points.
    #[allow(clippy::too_many_arguments)]
    pub fn make_cubic_bezier_spline(
        layer: u32,
        geometry: &PaintGeometry,
        p0: Position,
        p1: Position,
        p2: Position,
        p3: Position,
        thickness: f32,
        draw_effects: DrawEffects,
        tint: LinearColor,
    ) -> Self {
        Self::make_spline(
            layer,
            geometry,
            p0,
            (p1 - p0) * 3.0,
            p3,
            (p3 - p2) * 3.0,
            thickness,
            draw_effects,
            tint,
        )
    }

    pub fn make_lines(
        layer: u32,
        geometry: &PaintGeometry,
        points: Vec<Position>,
        draw_effects: DrawEffects,
        tint: LinearColor,
        antialias: bool,
        thickness: f32,
    ) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        Some(Self::new(
            layer,
            geometry,
            draw_effects,
            ElementPayload::Line(LinePayload {
                points,
                point_colors: None,
                tint,
                antialias,
                thickness,
            }),
        ))
    }

    pub fn make_viewport(
        layer: u32,
        geometry: &PaintGeometry,
        payload: ViewportPayload,
        draw_effects: DrawEffects,
    ) -> Option<Self> {
        if Self::should_cull(geometry) {
            return None;
        }
        Some(Self::new(layer, geometry, draw_effects, ElementPayload::Viewport(payload)))
    }

    pub fn make_custom(layer: u32, drawer: &Arc<dyn CustomSlateElement>) -> Self {
        let geometry = PaintGeometry::new(Position::ZERO, Size::new(1.0, 1.0), 1.0);
        Self::new(
            layer,
            &geometry,
            DrawEffects::NONE,
            ElementPayload::Custom(Arc::downgrade(drawer)),
        )
    }

    pub fn make_custom_verts(
        layer: u32,
        resource: Option<ShaderResource>,
        vertices: Vec<SlateVertex>,
        indices: Vec<SlateIndex>,
        instance_count: u32,
        instance_offset: u32,
    ) -> Option<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return None;
        }
        let geometry = PaintGeometry::new(Position::ZERO, Size::new(1.0, 1.0), 1.0);
        Some(Self::new(
            layer,
            &geometry,
            DrawEffects::NONE,
            ElementPayload::CustomVerts(CustomVertsPayload {
                resource,
                vertices,
                indices,
                instance_count,
                instance_offset,
                batch_flags: BatchDrawFlags::empty(),
            }),
        ))
    }

    pub fn make_cached_buffer(layer: u32, data: Arc<CachedRenderData>, offset: Position) -> Self {
        let geometry = PaintGeometry::new(Position::ZERO, Size::new(1.0, 1.0), 1.0);
        Self::new(
            layer,
            &geometry,
            DrawEffects::NONE,
            ElementPayload::CachedBuffer(CachedBufferPayload { data, offset }),
        )
    }

    pub fn make_post_process_pass(
        layer: u32,
        geometry: &PaintGeometry,
        data: [f32; 2],
        downsample_amount: i32,
    ) -> Option<Self> {
        if Self::should_cull(geometry) {
            return None;
        }
        Some(Self::new(
            layer,
            geometry,
            DrawEffects::NONE,
            ElementPayload::PostProcessPass(PostProcessPayload {
                data,
                downsample_amount,
            }),
        ))
    }
}

/// Four corners of a possibly rotated clip rectangle, in render space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippingZone {
    pub top_left: Position,
    pub top_right: Position,
    pub bottom_left: Position,
    pub bottom_right: Position,
}

impl ClippingZone {
    pub fn from_rect(rect: Rectangle) -> Self {
        Self {
            top_left: rect.pos(),
            top_right: Position::new(rect.right(), rect.y),
            bottom_left: Position::new(rect.x, rect.bottom()),
            bottom_right: Position::new(rect.right(), rect.bottom()),
        }
    }

    pub fn from_geometry(geometry: &PaintGeometry) -> Self {
        let t = &geometry.render_transform;
        let size = geometry.local_size;
        Self {
            top_left: t.transform_point(Position::ZERO),
            top_right: t.transform_point(Position::new(size.width, 0.0)),
            bottom_left: t.transform_point(Position::new(0.0, size.height)),
            bottom_right: t.transform_point(Position::new(size.width, size.height)),
        }
    }

    pub fn is_axis_aligned(&self) -> bool {
        let eps = 1e-3;
        (self.top_left.y - self.top_right.y).abs() <= eps
            && (self.top_left.x - self.bottom_left.x).abs() <= eps
            && (self.bottom_right.y - self.bottom_left.y).abs() <= eps
            && (self.bottom_right.x - self.top_right.x).abs() <= eps
    }

    pub fn bounding_rect(&self) -> Rectangle {
        let corners = [self.top_left, self.top_right, self.bottom_left, self.bottom_right];
        let min_x = corners.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let min_y = corners.iter().map(|p| p.y).fold(f32::MAX, f32::min);
        let max_x = corners.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let max_y = corners.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        Rectangle::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    fn intersect_axis_aligned(&self, other: &ClippingZone) -> ClippingZone {
        let a = self.bounding_rect();
        let b = other.bounding_rect();
        let left = a.x.max(b.x);
        let top = a.y.max(b.y);
        let right = a.right().min(b.right()).max(left);
        let bottom = a.bottom().min(b.bottom()).max(top);
        ClippingZone::from_rect(Rectangle::new(left, top, right - left, bottom - top))
    }

    pub fn offset(&self, delta: Position) -> ClippingZone {
        ClippingZone {
            top_left: self.top_left + delta,
            top_right: self.top_right + delta,
            bottom_left: self.bottom_left + delta,
            bottom_right: self.bottom_right + delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClippingMethod {
    Scissor,
    Stencil,
}

/// Resolved clip for a batch: a scissor rectangle when every zone on the
/// stack is axis aligned, otherwise stencil quads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClippingState {
    pub scissor_rect: Option<ClippingZone>,
    pub stencil_quads: Vec<ClippingZone>,
}

impl ClippingState {
    pub fn method(&self) -> ClippingMethod {
        if self.stencil_quads.is_empty() {
            ClippingMethod::Scissor
        } else {
            ClippingMethod::Stencil
        }
    }

    pub fn is_stencil_clipping_required(&self) -> bool {
        !self.stencil_quads.is_empty()
    }
}

/// Stack of clip zones pushed during painting. Every distinct stack state is
/// recorded once and referenced by index from elements and batches.
#[derive(Debug, Default)]
pub struct ClippingManager {
    states: Vec<ClippingState>,
    stack: Vec<usize>,
}

impl ClippingManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_clip(&mut self, zone: ClippingZone) -> usize {
        let parent = self.stack.last().and_then(|&i| self.states.get(i));
        let state = match parent {
            None if zone.is_axis_aligned() => ClippingState {
                scissor_rect: Some(zone),
                stencil_quads: Vec::new(),
            },
            None => ClippingState {
                scissor_rect: None,
                stencil_quads: vec![zone],
            },
            Some(parent) => match (parent.scissor_rect, zone.is_axis_aligned()) {
                (Some(scissor), true) if parent.stencil_quads.is_empty() => ClippingState {
                    scissor_rect: Some(scissor.intersect_axis_aligned(&zone)),
                    stencil_quads: Vec::new(),
                },
                _ => {
                    let mut stencil_quads = parent.stencil_quads.clone();
                    if let Some(scissor) = parent.scissor_rect {
                        stencil_quads.push(scissor);
                    }
                    stencil_quads.push(zone);
                    ClippingState {
                        scissor_rect: None,
                        stencil_quads,
                    }
                }
            },
        };
        self.states.push(state);
        let index = self.states.len() - 1;
        self.stack.push(index);
        index
    }

    pub fn pop_clip(&mut self) {
        if self.stack.pop().is_none() {
            log::warn!("pop_clip called with an empty clip stack");
        }
    }

    /// State index of the top of the stack, `None` when nothing clips.
    pub fn clipping_index(&self) -> Option<usize> {
        self.stack.last().copied()
    }

    pub fn clipping_states(&self) -> &[ClippingState] {
        &self.states
    }

    pub fn reset(&mut self) {
        self.states.clear();
        self.stack.clear();
    }
}

/// Identifies a logical draw layer within a [`WindowElementList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawLayerHandle(pub u64);

/// Elements of one logical layer and the batches built from them.
#[derive(Debug, Default)]
pub struct DrawLayer {
    pub elements: Vec<DrawElement>,
    pub batch_map: ElementBatchMap,
}

impl DrawLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one window painted this frame.
#[derive(Debug)]
pub struct WindowElementList {
    viewport_size: Size,
    root: DrawLayer,
    child_layers: BTreeMap<DrawLayerHandle, DrawLayer>,
    draw_stack: Vec<DrawLayerHandle>,
    next_layer_id: u64,
    clipping: ClippingManager,
    batch_data: BatchData,
}

impl WindowElementList {
    pub fn new(viewport_size: Size) -> Self {
        Self {
            viewport_size,
            root: DrawLayer::new(),
            child_layers: BTreeMap::new(),
            draw_stack: Vec::new(),
            next_layer_id: 1,
            clipping: ClippingManager::new(),
            batch_data: BatchData::new(),
        }
    }

    pub fn viewport_size(&self) -> Size {
        self.viewport_size
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport_size = size;
    }

    fn current_layer_mut(&mut self) -> &mut DrawLayer {
        match self.draw_stack.last() {
            Some(handle) => self.child_layers.entry(*handle).or_default(),
            None => &mut self.root,
        }
    }

    /// Records an element into the active draw layer, stamped with the
    /// current clip state.
    pub fn add_item(&mut self, mut element: DrawElement) {
        if element.clipping_index.is_none() {
            element.clipping_index = self.clipping.clipping_index();
        }
        self.current_layer_mut().elements.push(element);
    }

    pub fn add_optional(&mut self, element: Option<DrawElement>) {
        if let Some(element) = element {
            self.add_item(element);
        }
    }

    /// Opens a nested layer whose batches are spliced into the parent at
    /// `layer` when render batches are created.
    pub fn begin_logical_layer(&mut self, layer: u32) -> DrawLayerHandle {
        let handle = DrawLayerHandle(self.next_layer_id);
        self.next_layer_id += 1;
        let geometry = PaintGeometry::new(Position::ZERO, Size::new(1.0, 1.0), 1.0);
        self.add_item(DrawElement::new(
            layer,
            &geometry,
            DrawEffects::NONE,
            ElementPayload::Layer(handle),
        ));
        self.child_layers.insert(handle, DrawLayer::new());
        self.draw_stack.push(handle);
        handle
    }

    pub fn end_logical_layer(&mut self) {
        if self.draw_stack.pop().is_none() {
            log::warn!("end_logical_layer without a matching begin");
        }
    }

    pub fn push_clip(&mut self, zone: ClippingZone) -> usize {
        self.clipping.push_clip(zone)
    }

    pub fn pop_clip(&mut self) {
        self.clipping.pop_clip();
    }

    pub fn clipping_manager(&self) -> &ClippingManager {
        &self.clipping
    }

    pub fn root_elements(&self) -> &[DrawElement] {
        &self.root.elements
    }

    pub fn child_layer(&self, handle: DrawLayerHandle) -> Option<&DrawLayer> {
        self.child_layers.get(&handle)
    }

    pub fn root_batch_map(&self) -> &ElementBatchMap {
        &self.root.batch_map
    }

    pub fn batch_data(&self) -> &BatchData {
        &self.batch_data
    }

    pub fn batch_data_mut(&mut self) -> &mut BatchData {
        &mut self.batch_data
    }

    /// Split borrow used by the batcher: every draw layer plus the shared
    /// geometry storage and clip states.
    pub(crate) fn batching_parts(
        &mut self,
    ) -> (
        &mut DrawLayer,
        &mut BTreeMap<DrawLayerHandle, DrawLayer>,
        &mut BatchData,
        &ClippingManager,
    ) {
        (
            &mut self.root,
            &mut self.child_layers,
            &mut self.batch_data,
            &self.clipping,
        )
    }

    pub fn create_render_batches(&mut self) {
        self.batch_data
            .create_render_batches(&mut self.root.batch_map, &mut self.child_layers);
    }

    /// Drops last frame's batches and geometry but keeps the elements.
    pub fn reset_batches(&mut self) {
        self.root.batch_map.reset();
        for layer in self.child_layers.values_mut() {
            layer.batch_map.reset();
        }
        self.batch_data.reset();
    }

    /// Clears everything for the next frame of painting.
    pub fn reset_buffers(&mut self) {
        self.reset_batches();
        self.root.elements.clear();
        self.child_layers.clear();
        self.draw_stack.clear();
        self.clipping.reset();
    }

    /// Snapshot of the flattened render batches, replayable into later
    /// frames with [`DrawElement::make_cached_buffer`].
    pub fn cache_render_data(&self) -> Arc<CachedRenderData> {
        Arc::new(CachedRenderData::from_batch_data(&self.batch_data))
    }
}
