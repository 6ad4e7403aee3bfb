use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::draw_elements::{
    ClippingState, CustomSlateElement, DrawEffects, DrawLayer, DrawLayerHandle,
};
use crate::resources::{ResourceId, ShaderResource};
use crate::utils::{Position, SlateIndex, SlateVertex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderType {
    /// Textured or vertex colored geometry
    Default,
    /// 9-slice border with tiled edges
    Border,
    /// Alpha-only glyph atlas sampling
    Font,
    /// Anti-aliased line and spline segments
    LineSegment,
    /// Caller supplied vertices
    Custom,
    /// Full screen effect over a window region
    PostProcess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawPrimitive {
    LineList,
    TriangleList,
}

bitflags! {
    /// Pipeline state switches carried per batch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BatchDrawFlags: u8 {
        const NO_BLENDING = 1 << 0;
        const PRE_MULTIPLIED_ALPHA = 1 << 1;
        const NO_GAMMA = 1 << 2;
        const WIREFRAME = 1 << 3;
        const TILE_U = 1 << 4;
        const TILE_V = 1 << 5;
    }
}

/// Per-batch pixel shader constants. Compared bitwise so batches with
/// different line thickness or border margins never merge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShaderParams {
    pub pixel_params: [f32; 4],
    pub pixel_params2: [f32; 4],
}

impl ShaderParams {
    pub fn pixel(params: [f32; 4]) -> Self {
        Self {
            pixel_params: params,
            pixel_params2: [0.0; 4],
        }
    }

    pub fn pixel2(params: [f32; 4], params2: [f32; 4]) -> Self {
        Self {
            pixel_params: params,
            pixel_params2: params2,
        }
    }

    fn bits(&self) -> [u32; 8] {
        let mut out = [0u32; 8];
        for (i, v) in self.pixel_params.iter().chain(self.pixel_params2.iter()).enumerate() {
            out[i] = v.to_bits();
        }
        out
    }
}

impl Eq for ShaderParams {}

impl Hash for ShaderParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Everything except the texture that decides whether two elements may share
/// a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub shader_params: ShaderParams,
    pub draw_flags: BatchDrawFlags,
    pub shader_type: ShaderType,
    pub primitive: DrawPrimitive,
    pub draw_effects: DrawEffects,
    pub clipping_index: Option<usize>,
    pub instance_count: u32,
    pub instance_offset: u32,
    pub scene_index: Option<u32>,
}

impl BatchKey {
    pub fn new(
        shader_params: ShaderParams,
        shader_type: ShaderType,
        primitive: DrawPrimitive,
        draw_effects: DrawEffects,
        draw_flags: BatchDrawFlags,
        clipping_index: Option<usize>,
        scene_index: Option<u32>,
    ) -> Self {
        Self {
            shader_params,
            draw_flags,
            shader_type,
            primitive,
            draw_effects,
            clipping_index,
            instance_count: 0,
            instance_offset: 0,
            scene_index,
        }
    }

    /// Key for batches that never merge and carry no draw state of their own.
    pub fn passthrough(clipping_index: Option<usize>) -> Self {
        Self::new(
            ShaderParams::default(),
            ShaderType::Default,
            DrawPrimitive::TriangleList,
            DrawEffects::NONE,
            BatchDrawFlags::empty(),
            clipping_index,
            None,
        )
    }
}

/// Pre-built render batches with their own geometry, recorded once and
/// replayed into later frames at an offset.
#[derive(Debug, Clone, Default)]
pub struct CachedRenderData {
    pub render_batches: Vec<RenderBatch>,
    pub vertices: Vec<SlateVertex>,
    pub indices: Vec<SlateIndex>,
    pub clip_states: Vec<ClippingState>,
}

impl CachedRenderData {
    /// Snapshot the render batches of a frame that has already been flattened.
    pub fn from_batch_data(batch_data: &BatchData) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        batch_data.fill_vertex_and_index_buffer(&mut vertices, &mut indices, false);
        let render_batches = batch_data
            .render_batches()
            .iter()
            .map(|batch| RenderBatch {
                vertex_array_index: None,
                index_array_index: None,
                ..batch.clone()
            })
            .collect();
        Self {
            render_batches,
            vertices,
            indices,
            clip_states: batch_data.render_clip_states().to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BatchKind {
    /// Vertices and indices produced by the batcher
    Geometry,
    CustomDrawer(Weak<dyn CustomSlateElement>),
    CachedBuffer {
        data: Arc<CachedRenderData>,
        offset: Position,
    },
    Layer(DrawLayerHandle),
}

/// A mergeable group of geometry for one layer.
#[derive(Debug, Clone)]
pub struct ElementBatch {
    pub key: BatchKey,
    pub texture: Option<ShaderResource>,
    pub kind: BatchKind,
    /// instrumentation only
    pub num_elements: u32,
    pub vertex_array_index: Option<usize>,
    pub index_array_index: Option<usize>,
}

impl ElementBatch {
    pub fn new(texture: Option<ShaderResource>, key: BatchKey) -> Self {
        Self {
            key,
            texture,
            kind: BatchKind::Geometry,
            num_elements: 0,
            vertex_array_index: None,
            index_array_index: None,
        }
    }

    pub fn custom_drawer(drawer: Weak<dyn CustomSlateElement>, clipping_index: Option<usize>) -> Self {
        Self {
            kind: BatchKind::CustomDrawer(drawer),
            ..Self::new(None, BatchKey::passthrough(clipping_index))
        }
    }

    pub fn cached_buffer(
        data: Arc<CachedRenderData>,
        offset: Position,
        clipping_index: Option<usize>,
    ) -> Self {
        Self {
            kind: BatchKind::CachedBuffer { data, offset },
            ..Self::new(None, BatchKey::passthrough(clipping_index))
        }
    }

    pub fn layer(handle: DrawLayerHandle, clipping_index: Option<usize>) -> Self {
        Self {
            kind: BatchKind::Layer(handle),
            ..Self::new(None, BatchKey::passthrough(clipping_index))
        }
    }

    pub fn texture_id(&self) -> Option<ResourceId> {
        self.texture.map(|t| t.id)
    }
}

/// Storage handles of a batch inside [`BatchData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSlot {
    pub vertex_array: usize,
    pub index_array: usize,
}

type BatchLookupKey = (Option<ResourceId>, BatchKey);

#[derive(Debug, Default)]
pub struct LayerBatches {
    batches: Vec<ElementBatch>,
    lookup: HashMap<BatchLookupKey, usize>,
}

impl LayerBatches {
    pub fn batches(&self) -> &[ElementBatch] {
        &self.batches
    }

    fn clear(&mut self) {
        self.batches.clear();
        self.lookup.clear();
    }
}

const STATIC_LAYERS: usize = 256;

/// Layer index to batch list. The first 256 layers live in a flat array,
/// anything above spills into an ordered map.
#[derive(Debug)]
pub struct ElementBatchMap {
    layers: Vec<LayerBatches>,
    active: Vec<bool>,
    min_layer: usize,
    max_layer: usize,
    overflow: BTreeMap<u32, LayerBatches>,
}

impl Default for ElementBatchMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementBatchMap {
    pub fn new() -> Self {
        Self {
            layers: (0..STATIC_LAYERS).map(|_| LayerBatches::default()).collect(),
            active: vec![false; STATIC_LAYERS],
            min_layer: usize::MAX,
            max_layer: 0,
            overflow: BTreeMap::new(),
        }
    }

    /// Number of layers holding at least one batch.
    pub fn num_layers(&self) -> usize {
        self.layer_indices().len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_layers() == 0
    }

    fn layer_mut(&mut self, layer: u32) -> &mut LayerBatches {
        let index = layer as usize;
        if index < STATIC_LAYERS {
            self.min_layer = self.min_layer.min(index);
            self.max_layer = self.max_layer.max(index);
            self.active[index] = true;
            &mut self.layers[index]
        } else {
            self.overflow.entry(layer).or_default()
        }
    }

    pub fn get(&self, layer: u32) -> Option<&LayerBatches> {
        let index = layer as usize;
        if index < STATIC_LAYERS {
            self.active[index].then(|| &self.layers[index])
        } else {
            self.overflow.get(&layer)
        }
    }

    /// Finds the batch for `(texture, key)` on `layer`, creating it when
    /// missing. Returns the batch and whether it was just created.
    pub fn find_or_add(
        &mut self,
        layer: u32,
        texture: Option<ShaderResource>,
        key: BatchKey,
    ) -> (&mut ElementBatch, bool) {
        let layer_batches = self.layer_mut(layer);
        let lookup_key = (texture.map(|t| t.id), key);
        let (index, created) = match layer_batches.lookup.get(&lookup_key) {
            Some(&index) => (index, false),
            None => {
                let index = layer_batches.batches.len();
                layer_batches.batches.push(ElementBatch::new(texture, key));
                layer_batches.lookup.insert(lookup_key, index);
                (index, true)
            }
        };
        (&mut layer_batches.batches[index], created)
    }

    /// Appends a batch that is never merged with anything else.
    pub fn push_unmerged(&mut self, layer: u32, batch: ElementBatch) -> &mut ElementBatch {
        let layer_batches = self.layer_mut(layer);
        layer_batches.batches.push(batch);
        let last = layer_batches.batches.len() - 1;
        &mut layer_batches.batches[last]
    }

    fn layer_indices(&self) -> Vec<u32> {
        let mut out = Vec::new();
        if self.min_layer < STATIC_LAYERS {
            for index in self.min_layer..=self.max_layer.min(STATIC_LAYERS - 1) {
                if self.active[index] && !self.layers[index].batches.is_empty() {
                    out.push(index as u32);
                }
            }
        }
        out.extend(
            self.overflow
                .iter()
                .filter(|(_, batches)| !batches.batches.is_empty())
                .map(|(layer, _)| *layer),
        );
        out
    }

    /// Non-empty layers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[ElementBatch])> + '_ {
        self.layer_indices().into_iter().filter_map(move |layer| {
            self.get(layer).map(|batches| (layer, batches.batches()))
        })
    }

    /// Drains every non-empty layer in ascending order and resets the map.
    pub fn take_layers(&mut self) -> Vec<(u32, Vec<ElementBatch>)> {
        let mut out = Vec::new();
        for layer in self.layer_indices() {
            let index = layer as usize;
            let batches = if index < STATIC_LAYERS {
                self.layers[index].lookup.clear();
                std::mem::take(&mut self.layers[index].batches)
            } else {
                self.overflow
                    .get_mut(&layer)
                    .map(|b| {
                        b.lookup.clear();
                        std::mem::take(&mut b.batches)
                    })
                    .unwrap_or_default()
            };
            out.push((layer, batches));
        }
        self.reset();
        out
    }

    pub fn reset(&mut self) {
        if self.min_layer < STATIC_LAYERS {
            for index in self.min_layer..=self.max_layer.min(STATIC_LAYERS - 1) {
                self.layers[index].clear();
                self.active[index] = false;
            }
        }
        self.min_layer = usize::MAX;
        self.max_layer = 0;
        self.overflow.clear();
    }
}

/// A GPU-ready draw span: one draw call worth of state plus where its
/// geometry lives.
#[derive(Debug, Clone)]
pub struct RenderBatch {
    pub layer: u32,
    /// translation applied by the shader, used by replayed cached buffers
    pub dynamic_offset: Position,
    pub shader_params: ShaderParams,
    pub texture: Option<ShaderResource>,
    pub instance_count: u32,
    pub instance_offset: u32,
    pub custom_drawer: Option<Weak<dyn CustomSlateElement>>,
    pub draw_flags: BatchDrawFlags,
    pub shader_type: ShaderType,
    pub primitive: DrawPrimitive,
    pub draw_effects: DrawEffects,
    pub clipping_index: Option<usize>,
    pub vertex_array_index: Option<usize>,
    pub index_array_index: Option<usize>,
    pub vertex_offset: u32,
    pub index_offset: u32,
    pub num_vertices: u32,
    pub num_indices: u32,
    pub scene_index: Option<u32>,
}

impl RenderBatch {
    fn from_element_batch(
        layer: u32,
        batch: &ElementBatch,
        num_vertices: u32,
        num_indices: u32,
        vertex_offset: u32,
        index_offset: u32,
    ) -> Self {
        let custom_drawer = match &batch.kind {
            BatchKind::CustomDrawer(drawer) => Some(drawer.clone()),
            _ => None,
        };
        Self {
            layer,
            dynamic_offset: Position::ZERO,
            shader_params: batch.key.shader_params,
            texture: batch.texture,
            instance_count: batch.key.instance_count,
            instance_offset: batch.key.instance_offset,
            custom_drawer,
            draw_flags: batch.key.draw_flags,
            shader_type: batch.key.shader_type,
            primitive: batch.key.primitive,
            draw_effects: batch.key.draw_effects,
            clipping_index: batch.key.clipping_index,
            vertex_array_index: batch.vertex_array_index,
            index_array_index: batch.index_array_index,
            vertex_offset,
            index_offset,
            num_vertices,
            num_indices,
            scene_index: batch.key.scene_index,
        }
    }

    pub fn has_geometry(&self) -> bool {
        self.num_vertices > 0 && self.num_indices > 0
    }
}

/// Per-frame geometry storage plus the flattened render batches of one
/// window.
#[derive(Debug, Default)]
pub struct BatchData {
    vertex_arrays: Vec<Vec<SlateVertex>>,
    index_arrays: Vec<Vec<SlateIndex>>,
    vertex_free_list: Vec<usize>,
    index_free_list: Vec<usize>,
    render_batches: Vec<RenderBatch>,
    render_clip_states: Vec<ClippingState>,
    num_batched_vertices: u32,
    num_batched_indices: u32,
    num_layers: usize,
    pending_requires_vsync: bool,
    requires_vsync: bool,
    num_post_process_passes: u32,
}

const INITIAL_VERTEX_CAPACITY: usize = 64;
const INITIAL_INDEX_CAPACITY: usize = 96;

impl BatchData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_batches(&self) -> &[RenderBatch] {
        &self.render_batches
    }

    pub fn render_clip_states(&self) -> &[ClippingState] {
        &self.render_clip_states
    }

    pub fn num_batched_vertices(&self) -> u32 {
        self.num_batched_vertices
    }

    pub fn num_batched_indices(&self) -> u32 {
        self.num_batched_indices
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub fn requires_vsync(&self) -> bool {
        self.requires_vsync
    }

    pub fn num_post_process_passes(&self) -> u32 {
        self.num_post_process_passes
    }

    pub fn has_post_process_passes(&self) -> bool {
        self.num_post_process_passes > 0
    }

    pub fn is_stencil_clipping_required(&self) -> bool {
        self.render_clip_states
            .iter()
            .any(|state| state.is_stencil_clipping_required())
    }

    /// Recorded by the batcher, published by [`BatchData::create_render_batches`].
    pub(crate) fn set_pending_requires_vsync(&mut self, requires_vsync: bool) {
        self.pending_requires_vsync = requires_vsync;
    }

    /// Hands `batch` a pooled vertex array unless it already has one.
    /// Returns the array index.
    pub fn assign_vertex_array_to_batch(&mut self, batch: &mut ElementBatch) -> usize {
        if let Some(index) = batch.vertex_array_index {
            return index;
        }
        let index = match self.vertex_free_list.pop() {
            Some(index) => index,
            None => {
                self.vertex_arrays
                    .push(Vec::with_capacity(INITIAL_VERTEX_CAPACITY));
                self.vertex_arrays.len() - 1
            }
        };
        batch.vertex_array_index = Some(index);
        index
    }

    /// Hands `batch` a pooled index array unless it already has one.
    /// Returns the array index.
    pub fn assign_index_array_to_batch(&mut self, batch: &mut ElementBatch) -> usize {
        if let Some(index) = batch.index_array_index {
            return index;
        }
        let index = match self.index_free_list.pop() {
            Some(index) => index,
            None => {
                self.index_arrays
                    .push(Vec::with_capacity(INITIAL_INDEX_CAPACITY));
                self.index_arrays.len() - 1
            }
        };
        batch.index_array_index = Some(index);
        index
    }

    /// Storage for both buffers of a batch at once.
    pub fn batch_buffers(
        &mut self,
        slot: BatchSlot,
    ) -> (&mut Vec<SlateVertex>, &mut Vec<SlateIndex>) {
        (
            &mut self.vertex_arrays[slot.vertex_array],
            &mut self.index_arrays[slot.index_array],
        )
    }

    pub fn batch_vertex_list(&self, batch: &ElementBatch) -> &[SlateVertex] {
        batch
            .vertex_array_index
            .and_then(|i| self.vertex_arrays.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn batch_index_list(&self, batch: &ElementBatch) -> &[SlateIndex] {
        batch
            .index_array_index
            .and_then(|i| self.index_arrays.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn render_batch_vertices(&self, batch: &RenderBatch) -> &[SlateVertex] {
        batch
            .vertex_array_index
            .and_then(|i| self.vertex_arrays.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn render_batch_indices(&self, batch: &RenderBatch) -> &[SlateIndex] {
        batch
            .index_array_index
            .and_then(|i| self.index_arrays.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn copy_clipping_states(&mut self, states: &[ClippingState]) {
        self.render_clip_states.clear();
        self.render_clip_states.extend_from_slice(states);
    }

    /// Flattens the root batch map, expanding nested layers and cached
    /// buffers in place, into render batches sorted by layer.
    pub fn create_render_batches(
        &mut self,
        root: &mut ElementBatchMap,
        child_layers: &mut BTreeMap<DrawLayerHandle, DrawLayer>,
    ) {
        let mut vertex_offset = 0u32;
        let mut index_offset = 0u32;
        self.num_layers = 0;
        self.merge(root, child_layers, &mut vertex_offset, &mut index_offset);

        self.num_batched_vertices = vertex_offset;
        self.num_batched_indices = index_offset;
        self.requires_vsync = self.pending_requires_vsync;
        self.num_post_process_passes = self
            .render_batches
            .iter()
            .filter(|b| b.shader_type == ShaderType::PostProcess)
            .count() as u32;
    }

    fn merge(
        &mut self,
        map: &mut ElementBatchMap,
        child_layers: &mut BTreeMap<DrawLayerHandle, DrawLayer>,
        vertex_offset: &mut u32,
        index_offset: &mut u32,
    ) {
        for (layer, batches) in map.take_layers() {
            self.num_layers += 1;
            for batch in batches {
                match &batch.kind {
                    BatchKind::CustomDrawer(_) => {
                        self.render_batches
                            .push(RenderBatch::from_element_batch(layer, &batch, 0, 0, 0, 0));
                    }
                    BatchKind::CachedBuffer { data, offset } => {
                        self.expand_cached_buffer(data, *offset, vertex_offset, index_offset);
                    }
                    BatchKind::Layer(handle) => {
                        let nested = child_layers.get_mut(handle).map(|l| std::mem::take(&mut l.batch_map));
                        if let Some(mut nested_map) = nested {
                            self.merge(&mut nested_map, child_layers, vertex_offset, index_offset);
                            if let Some(child) = child_layers.get_mut(handle) {
                                child.batch_map = nested_map;
                            }
                        } else {
                            log::debug!("layer {:?} has no draw layer this frame", handle);
                        }
                    }
                    BatchKind::Geometry => {
                        let num_vertices = self.batch_vertex_list(&batch).len() as u32;
                        let num_indices = self.batch_index_list(&batch).len() as u32;
                        debug_assert!(
                            (num_vertices > 0) == (num_indices > 0),
                            "batch has vertices without indices or the reverse"
                        );
                        if num_vertices > 0 && num_indices > 0 {
                            self.render_batches.push(RenderBatch::from_element_batch(
                                layer,
                                &batch,
                                num_vertices,
                                num_indices,
                                *vertex_offset,
                                *index_offset,
                            ));
                            *vertex_offset += num_vertices;
                            *index_offset += num_indices;
                        } else if batch.key.shader_type == ShaderType::PostProcess {
                            self.render_batches
                                .push(RenderBatch::from_element_batch(layer, &batch, 0, 0, 0, 0));
                        }
                    }
                }
            }
        }
    }

    fn expand_cached_buffer(
        &mut self,
        data: &CachedRenderData,
        offset: Position,
        vertex_offset: &mut u32,
        index_offset: &mut u32,
    ) {
        let clip_base = self.render_clip_states.len();
        self.render_clip_states.extend(data.clip_states.iter().cloned());

        for foreign in &data.render_batches {
            let mut batch = foreign.clone();
            batch.dynamic_offset = offset;
            batch.clipping_index = foreign.clipping_index.map(|i| i + clip_base);

            if foreign.has_geometry() {
                let v_start = foreign.vertex_offset as usize;
                let i_start = foreign.index_offset as usize;
                let vertices = data
                    .vertices
                    .get(v_start..v_start + foreign.num_vertices as usize);
                let indices = data
                    .indices
                    .get(i_start..i_start + foreign.num_indices as usize);
                let (Some(vertices), Some(indices)) = (vertices, indices) else {
                    log::warn!("cached render batch points outside its buffers, skipping");
                    continue;
                };

                let mut holder = ElementBatch::new(foreign.texture, BatchKey::passthrough(None));
                let slot = BatchSlot {
                    vertex_array: self.assign_vertex_array_to_batch(&mut holder),
                    index_array: self.assign_index_array_to_batch(&mut holder),
                };
                let (dst_vertices, dst_indices) = self.batch_buffers(slot);
                dst_vertices.extend_from_slice(vertices);
                dst_indices.extend_from_slice(indices);

                batch.vertex_array_index = Some(slot.vertex_array);
                batch.index_array_index = Some(slot.index_array);
                batch.vertex_offset = *vertex_offset;
                batch.index_offset = *index_offset;
                *vertex_offset += foreign.num_vertices;
                *index_offset += foreign.num_indices;
            }
            self.render_batches.push(batch);
        }
    }

    /// Packs every render batch into one vertex and one index buffer, in
    /// render batch order. With `absolute_indices` each index is rebased by
    /// its batch's vertex offset, otherwise indices stay batch relative.
    pub fn fill_vertex_and_index_buffer(
        &self,
        vertices: &mut Vec<SlateVertex>,
        indices: &mut Vec<SlateIndex>,
        absolute_indices: bool,
    ) {
        vertices.clear();
        indices.clear();
        vertices.reserve(self.num_batched_vertices as usize);
        indices.reserve(self.num_batched_indices as usize);

        for batch in self.render_batches.iter().filter(|b| b.has_geometry()) {
            debug_assert_eq!(vertices.len(), batch.vertex_offset as usize);
            vertices.extend_from_slice(self.render_batch_vertices(batch));
            let batch_indices = self.render_batch_indices(batch);
            if absolute_indices {
                indices.extend(batch_indices.iter().map(|i| i + batch.vertex_offset));
            } else {
                indices.extend_from_slice(batch_indices);
            }
        }
    }

    /// Returns every pooled array to the free lists and drops the render
    /// batches of the previous frame.
    pub fn reset(&mut self) {
        self.vertex_free_list.clear();
        self.index_free_list.clear();
        for (i, array) in self.vertex_arrays.iter_mut().enumerate() {
            array.clear();
            self.vertex_free_list.push(i);
        }
        for (i, array) in self.index_arrays.iter_mut().enumerate() {
            array.clear();
            self.index_free_list.push(i);
        }
        // pop() hands out the lowest index first
        self.vertex_free_list.reverse();
        self.index_free_list.reverse();

        self.render_batches.clear();
        self.render_clip_states.clear();
        self.num_batched_vertices = 0;
        self.num_batched_indices = 0;
        self.num_layers = 0;
        self.pending_requires_vsync = false;
        self.requires_vsync = false;
        self.num_post_process_passes = 0;
    }

    pub fn num_pooled_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(clip: Option<usize>) -> BatchKey {
        BatchKey::new(
            ShaderParams::default(),
            ShaderType::Default,
            DrawPrimitive::TriangleList,
            DrawEffects::NONE,
            BatchDrawFlags::empty(),
            clip,
            None,
        )
    }

    #[test]
    fn overflow_layers_sort_after_static_layers() {
        let mut map = ElementBatchMap::new();
        map.find_or_add(1000, None, key(None));
        map.find_or_add(300, None, key(None));
        map.find_or_add(4, None, key(None));
        let layers: Vec<u32> = map.iter().map(|(layer, _)| layer).collect();
        assert_eq!(layers, vec![4, 300, 1000]);
    }

    #[test]
    fn same_key_returns_same_batch() {
        let mut map = ElementBatchMap::new();
        let (_, created_a) = map.find_or_add(2, None, key(Some(0)));
        let (batch, created_b) = map.find_or_add(2, None, key(Some(0)));
        batch.num_elements += 1;
        assert!(created_a);
        assert!(!created_b);
        let (_, created_c) = map.find_or_add(2, None, key(Some(1)));
        assert!(created_c);
        assert_eq!(map.get(2).map(|l| l.batches().len()), Some(2));
    }

    #[test]
    fn reset_recycles_arrays() {
        let mut data = BatchData::new();
        let mut batch = ElementBatch::new(None, key(None));
        data.assign_vertex_array_to_batch(&mut batch);
        data.assign_index_array_to_batch(&mut batch);
        assert_eq!(data.num_pooled_vertex_arrays(), 1);
        data.reset();
        let mut again = ElementBatch::new(None, key(None));
        data.assign_vertex_array_to_batch(&mut again);
        assert_eq!(again.vertex_array_index, Some(0));
        assert_eq!(data.num_pooled_vertex_arrays(), 1);
    }
}
