mod common;

use std::sync::Arc;

use approx::assert_relative_eq;

use slate_core::batch::{BatchDrawFlags, DrawPrimitive, ElementBatch, ShaderType};
use slate_core::config::SlateConfig;
use slate_core::draw_elements::{
    ClippingZone, CustomSlateElement, DrawEffects, DrawElement, ElementPayload, GradientPayload, GradientStop,
    Orientation, PaintGeometry, SplinePayload, ViewportPayload, WindowElementList,
};
use slate_core::element_batcher::{bounded_gradient_stops, spline_step_count, RenderingPolicy};
use slate_core::font::{FontOutlineSettings, ShapedGlyphSequence, SlateFontServices, TextDirection};
use slate_core::renderer::RenderBackend;
use slate_core::resources::{ShaderResource, ShaderResourceProxy, SlateBrush};
use slate_core::utils::{LinearColor, Margin, Position, Rectangle, Size, SlateVertex};

use common::BlockFace;

fn geometry(x: f32, y: f32, width: f32, height: f32) -> PaintGeometry {
    PaintGeometry::new(Position::new(x, y), Size::new(width, height), 1.0)
}

fn window() -> WindowElementList {
    WindowElementList::new(Size::new(800.0, 600.0))
}

fn solid_box(layer: u32, geometry: &PaintGeometry) -> Option<DrawElement> {
    DrawElement::make_box(layer, geometry, &SlateBrush::solid(), DrawEffects::NONE, LinearColor::WHITE)
}

fn layer_batches(list: &WindowElementList, layer: u32) -> Vec<ElementBatch> {
    list.root_batch_map()
        .get(layer)
        .map(|l| l.batches().to_vec())
        .unwrap_or_default()
}

fn positions(list: &WindowElementList, batch: &ElementBatch) -> Vec<(f32, f32)> {
    list.batch_data()
        .batch_vertex_list(batch)
        .iter()
        .map(|v| (v.position[0], v.position[1]))
        .collect()
}

#[test]
fn compatible_boxes_share_a_batch() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    list.add_optional(solid_box(0, &geometry(0.0, 0.0, 10.0, 10.0)));
    list.add_optional(solid_box(0, &geometry(20.0, 0.0, 10.0, 10.0)));

    let batcher = common::batch(&mut policy, &mut list);
    let batches = layer_batches(&list, 0);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].num_elements, 2);
    assert_eq!(batcher.stats().num_batches_created, 1);

    let data = list.batch_data();
    assert_eq!(data.batch_vertex_list(&batches[0]).len(), 8);
    assert_eq!(data.batch_index_list(&batches[0]), &[0, 1, 2, 2, 1, 3, 4, 5, 6, 6, 5, 7]);
    assert_eq!(positions(&list, &batches[0])[4], (20.0, 0.0));
}

#[test]
fn batch_key_differences_split_batches() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let g = geometry(0.0, 0.0, 10.0, 10.0);
    let texture_a = SlateBrush::image(ShaderResourceProxy::whole(ShaderResource::texture(8, 8)));
    let texture_b = SlateBrush::image(ShaderResourceProxy::whole(ShaderResource::texture(8, 8)));

    list.add_optional(solid_box(0, &g));
    list.add_optional(solid_box(1, &g));
    list.add_optional(DrawElement::make_box(0, &g, &texture_a, DrawEffects::NONE, LinearColor::WHITE));
    list.add_optional(DrawElement::make_box(0, &g, &texture_b, DrawEffects::NONE, LinearColor::WHITE));
    list.add_optional(DrawElement::make_box(0, &g, &SlateBrush::solid(), DrawEffects::NO_BLENDING, LinearColor::WHITE));
    list.push_clip(ClippingZone::from_rect(Rectangle::new(0.0, 0.0, 5.0, 5.0)));
    list.add_optional(solid_box(0, &g));
    list.pop_clip();
    // same key as the first element again
    list.add_optional(solid_box(0, &g));

    common::batch(&mut policy, &mut list);
    let batches = layer_batches(&list, 0);
    assert_eq!(batches.len(), 5);
    assert_eq!(batches[0].num_elements, 2);
    assert_eq!(batches[1].texture_id(), texture_a.resource.map(|p| p.resource.id));
    assert_eq!(batches[2].texture_id(), texture_b.resource.map(|p| p.resource.id));
    assert!(batches[3].key.draw_flags.contains(BatchDrawFlags::NO_BLENDING));
    assert_eq!(batches[4].key.clipping_index, Some(0));
    assert_eq!(layer_batches(&list, 1).len(), 1);
}

#[test]
fn nine_slice_margins_collapse_when_they_overlap() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let proxy = ShaderResourceProxy::whole(ShaderResource::texture(10, 10));
    let brush = SlateBrush::boxed(proxy, Margin::uniform(0.8));
    list.add_optional(DrawElement::make_box(
        0,
        &geometry(0.0, 0.0, 10.0, 10.0),
        &brush,
        DrawEffects::NONE,
        LinearColor::WHITE,
    ));

    common::batch(&mut policy, &mut list);
    let batches = layer_batches(&list, 0);
    let vertices = positions(&list, &batches[0]);
    assert_eq!(vertices.len(), 16);
    assert_eq!(list.batch_data().batch_index_list(&batches[0]).len(), 54);
    assert_eq!(vertices[1], (0.0, 5.0));
    assert_eq!(vertices[2], (5.0, 0.0));
    assert_eq!(vertices[4], (5.0, 0.0));
    assert_eq!(vertices[15], (10.0, 10.0));
}

#[test]
fn nine_slice_margins_scale_with_the_image() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let proxy = ShaderResourceProxy::whole(ShaderResource::texture(20, 20));
    let brush = SlateBrush::boxed(proxy, Margin::new(0.25, 0.25, 0.5, 0.25));
    list.add_optional(DrawElement::make_box(
        0,
        &geometry(100.0, 50.0, 80.0, 40.0),
        &brush,
        DrawEffects::NONE,
        LinearColor::WHITE,
    ));

    common::batch(&mut policy, &mut list);
    let vertices = positions(&list, &layer_batches(&list, 0)[0]);
    // left 5px, right 10px, top and bottom 5px
    assert_eq!(vertices[3], (105.0, 55.0));
    assert_eq!(vertices[5], (170.0, 55.0));
    assert_eq!(vertices[10], (170.0, 85.0));

    let uvs = list.batch_data().batch_vertex_list(&layer_batches(&list, 0)[0]);
    assert_relative_eq!(uvs[3].tex_coords[0], 0.25);
    assert_relative_eq!(uvs[3].tex_coords[1], 0.25);
    assert_relative_eq!(uvs[5].tex_coords[0], 0.5);
    assert_relative_eq!(uvs[10].tex_coords[1], 0.75);
}

#[test]
fn feathering_adds_an_outer_ring() {
    let config = SlateConfig {
        feathering: true,
        ..SlateConfig::default()
    };
    let mut policy = common::policy(config);
    let mut list = window();
    let g = geometry(0.0, 0.0, 40.0, 40.0);
    list.add_optional(DrawElement::make_box(0, &g, &SlateBrush::solid(), DrawEffects::NO_PIXEL_SNAPPING, LinearColor::WHITE));
    let boxed = SlateBrush::boxed(ShaderResourceProxy::whole(ShaderResource::texture(8, 8)), Margin::uniform(0.25));
    list.add_optional(DrawElement::make_box(1, &g, &boxed, DrawEffects::NO_PIXEL_SNAPPING, LinearColor::WHITE));
    // snapped elements are never feathered
    list.add_optional(solid_box(2, &g));

    common::batch(&mut policy, &mut list);
    let data = list.batch_data();
    let simple = &layer_batches(&list, 0)[0];
    assert_eq!(data.batch_vertex_list(simple).len(), 8);
    assert_eq!(data.batch_index_list(simple).len(), 30);
    assert_eq!(data.batch_vertex_list(simple)[4].color, [0, 0, 0, 0]);
    assert_eq!(data.batch_vertex_list(simple)[4].position, [-1.0, -1.0]);

    let sliced = &layer_batches(&list, 1)[0];
    assert_eq!(data.batch_vertex_list(sliced).len(), 28);
    assert_eq!(data.batch_index_list(sliced).len(), 54 + 72);

    let snapped = &layer_batches(&list, 2)[0];
    assert_eq!(data.batch_vertex_list(snapped).len(), 4);
}

#[test]
fn borders_tile_with_their_own_shader() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let texture = ShaderResource::texture(16, 16);
    let brush = SlateBrush::border(ShaderResourceProxy::whole(texture), Margin::uniform(0.25));
    list.add_optional(DrawElement::make_box(
        0,
        &geometry(0.0, 0.0, 64.0, 32.0),
        &brush,
        DrawEffects::NONE,
        LinearColor::WHITE,
    ));

    common::batch(&mut policy, &mut list);
    let batch = &layer_batches(&list, 0)[0];
    assert_eq!(batch.key.shader_type, ShaderType::Border);
    assert_eq!(batch.key.draw_flags, BatchDrawFlags::TILE_U | BatchDrawFlags::TILE_V);
    assert_eq!(batch.texture_id(), Some(texture.id));
    assert_eq!(list.batch_data().batch_vertex_list(batch).len(), 32);
    assert_eq!(list.batch_data().batch_index_list(batch).len(), 48);
}

#[test]
fn border_brush_without_texture_draws_nothing() {
    let mut brush = SlateBrush::border(ShaderResourceProxy::whole(ShaderResource::texture(4, 4)), Margin::uniform(0.25));
    brush.resource = None;
    let element = DrawElement::make_box(0, &geometry(0.0, 0.0, 10.0, 10.0), &brush, DrawEffects::NONE, LinearColor::WHITE);
    assert!(element.is_none());
    assert!(solid_box(0, &geometry(0.0, 0.0, 0.0, 10.0)).is_none());
}

#[test]
fn gradient_stops_are_extended_to_the_edges() {
    let payload = GradientPayload {
        stops: vec![
            GradientStop::new(Position::new(3.0, 0.0), LinearColor::RED),
            GradientStop::new(Position::new(7.0, 0.0), LinearColor::BLUE),
        ],
        orientation: Orientation::Vertical,
        batch_flags: BatchDrawFlags::empty(),
    };
    let stops = bounded_gradient_stops(&payload, Size::new(10.0, 4.0));
    let xs: Vec<f32> = stops.iter().map(|s| s.position.x).collect();
    assert_eq!(xs, vec![0.0, 3.0, 7.0, 10.0]);
    assert_eq!(stops[0].color, LinearColor::RED);
    assert_eq!(stops[3].color, LinearColor::BLUE);

    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    list.add_optional(DrawElement::make_gradient(
        0,
        &geometry(0.0, 0.0, 10.0, 4.0),
        payload.stops.clone(),
        Orientation::Vertical,
        DrawEffects::NONE,
    ));
    common::batch(&mut policy, &mut list);
    let batch = &layer_batches(&list, 0)[0];
    let vertices = list.batch_data().batch_vertex_list(batch);
    assert_eq!(vertices.len(), 8);
    assert_eq!(list.batch_data().batch_index_list(batch).len(), 18);
    assert_eq!(vertices[2].position, [3.0, 0.0]);
    assert_eq!(vertices[3].position, [3.0, 4.0]);
    assert_eq!(vertices[0].color, [255, 0, 0, 255]);
}

fn spline(end: Position) -> SplinePayload {
    SplinePayload {
        start: Position::ZERO,
        start_dir: Position::ZERO,
        end,
        end_dir: Position::ZERO,
        thickness: 2.0,
        tint: LinearColor::WHITE,
        gradient_stops: Vec::new(),
    }
}

#[test]
fn spline_steps_follow_length() {
    assert_eq!(spline_step_count(&spline(Position::new(150.0, 0.0))), 10.0);
    assert_eq!(spline_step_count(&spline(Position::new(1.0, 0.0))), 1.0);
    assert_eq!(spline_step_count(&spline(Position::new(100_000.0, 0.0))), 256.0);

    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let g = geometry(0.0, 0.0, 200.0, 200.0);
    list.add_item(DrawElement::make_spline(
        0,
        &g,
        Position::ZERO,
        Position::ZERO,
        Position::new(150.0, 0.0),
        Position::ZERO,
        2.0,
        DrawEffects::NONE,
        LinearColor::WHITE,
    ));
    common::batch(&mut policy, &mut list);
    let batch = &layer_batches(&list, 0)[0];
    assert_eq!(batch.key.shader_type, ShaderType::LineSegment);
    assert_eq!(batch.key.shader_params.pixel_params[0], 2.0);
    assert_eq!(list.batch_data().batch_vertex_list(batch).len(), 22);
    assert_eq!(list.batch_data().batch_index_list(batch).len(), 60);
}

#[test]
fn spline_gradients_align_steps_to_stops() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let mut element = DrawElement::make_spline(
        0,
        &geometry(0.0, 0.0, 200.0, 200.0),
        Position::ZERO,
        Position::ZERO,
        Position::new(150.0, 0.0),
        Position::ZERO,
        1.0,
        DrawEffects::NONE,
        LinearColor::WHITE,
    );
    if let ElementPayload::Spline(payload) = &mut element.payload {
        payload.gradient_stops = vec![
            GradientStop::new(Position::ZERO, LinearColor::RED),
            GradientStop::new(Position::new(50.0, 0.0), LinearColor::GREEN),
            GradientStop::new(Position::new(100.0, 0.0), LinearColor::BLUE),
            GradientStop::new(Position::new(150.0, 0.0), LinearColor::WHITE),
        ];
    }
    list.add_item(element);

    common::batch(&mut policy, &mut list);
    let batch = &layer_batches(&list, 0)[0];
    let vertices = list.batch_data().batch_vertex_list(batch);
    // ten steps over three gradient spans round up to twelve
    assert_eq!(vertices.len(), 2 + 2 * 12);
    assert_eq!(vertices[0].color, [255, 0, 0, 255]);
    assert_eq!(vertices.last().map(|v| v.color), Some([255, 255, 255, 255]));
}

#[test]
fn line_variants() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let g = geometry(0.0, 0.0, 100.0, 100.0);
    let points = vec![Position::new(0.0, 0.0), Position::new(50.0, 0.0), Position::new(50.0, 50.0)];
    list.add_optional(DrawElement::make_lines(0, &g, points.clone(), DrawEffects::NONE, LinearColor::WHITE, true, 2.0));
    list.add_optional(DrawElement::make_lines(1, &g, points.clone(), DrawEffects::NONE, LinearColor::WHITE, false, 1.0));
    list.add_optional(DrawElement::make_lines(2, &g, points.clone(), DrawEffects::NONE, LinearColor::WHITE, false, 3.0));
    assert!(DrawElement::make_lines(3, &g, vec![Position::ZERO], DrawEffects::NONE, LinearColor::WHITE, true, 1.0).is_none());

    common::batch(&mut policy, &mut list);
    let data = list.batch_data();

    let aa = &layer_batches(&list, 0)[0];
    assert_eq!(aa.key.shader_type, ShaderType::LineSegment);
    assert_eq!(data.batch_vertex_list(aa).len(), 8);
    assert_eq!(data.batch_index_list(aa).len(), 12);

    let thin = &layer_batches(&list, 1)[0];
    assert_eq!(thin.key.primitive, DrawPrimitive::LineList);
    assert_eq!(data.batch_vertex_list(thin).len(), 4);
    assert_eq!(data.batch_index_list(thin), &[0, 1, 2, 3]);

    let thick = &layer_batches(&list, 2)[0];
    assert_eq!(thick.key.primitive, DrawPrimitive::TriangleList);
    assert_eq!(thick.key.shader_type, ShaderType::Default);
    assert_eq!(data.batch_vertex_list(thick).len(), 8);
    assert_eq!(data.batch_index_list(thick).len(), 12);
}

#[test]
fn debug_quads_are_wireframe() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    list.add_item(DrawElement::make_debug_quad(0, &geometry(1.0, 2.0, 3.0, 4.0), LinearColor::GREEN));
    common::batch(&mut policy, &mut list);
    let batch = &layer_batches(&list, 0)[0];
    assert_eq!(batch.key.draw_flags, BatchDrawFlags::WIREFRAME | BatchDrawFlags::NO_BLENDING);
    assert_eq!(positions(&list, batch), vec![(1.0, 2.0), (4.0, 2.0), (1.0, 6.0), (4.0, 6.0)]);
}

#[test]
fn unscaled_viewport_uses_its_target_size() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let target = ShaderResource::render_target(32, 16);
    let payload = ViewportPayload {
        render_target: Some(target),
        allow_scaling: false,
        alpha_only: false,
        requires_vsync: true,
        tint: LinearColor::WHITE,
        batch_flags: BatchDrawFlags::empty(),
    };
    list.add_optional(DrawElement::make_viewport(0, &geometry(10.0, 10.0, 100.0, 100.0), payload, DrawEffects::NONE));

    let batcher = common::batch(&mut policy, &mut list);
    assert!(batcher.requires_vsync());
    let batch = &layer_batches(&list, 0)[0];
    assert_eq!(batch.texture_id(), Some(target.id));
    assert_eq!(positions(&list, batch)[3], (42.0, 26.0));

    list.create_render_batches();
    assert!(list.batch_data().requires_vsync());
}

#[test]
fn custom_verts_are_never_merged() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let vertices = vec![SlateVertex::default(); 3];
    let indices = vec![0, 1, 2];
    list.add_optional(DrawElement::make_custom_verts(0, None, vertices.clone(), indices.clone(), 4, 1));
    list.add_optional(DrawElement::make_custom_verts(0, None, vertices.clone(), indices.clone(), 4, 1));
    assert!(DrawElement::make_custom_verts(0, None, Vec::new(), indices, 1, 0).is_none());

    common::batch(&mut policy, &mut list);
    let batches = layer_batches(&list, 0);
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].key.shader_type, ShaderType::Custom);
    assert_eq!((batches[0].key.instance_count, batches[0].key.instance_offset), (4, 1));
    assert_eq!(list.batch_data().batch_vertex_list(&batches[1]).len(), 3);
}

#[test]
fn post_process_passes_need_a_window_area() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    list.add_optional(DrawElement::make_post_process_pass(2, &geometry(0.0, 0.0, 400.0, 300.0), [5.0, 2.0], 2));
    let batcher = common::batch(&mut policy, &mut list);
    assert_eq!(batcher.num_post_process_passes(), 1);
    let batch = &layer_batches(&list, 2)[0];
    assert_eq!(batch.key.shader_type, ShaderType::PostProcess);
    assert_eq!(batch.key.shader_params.pixel_params, [0.0, 0.0, 400.0, 300.0]);
    assert_eq!(batch.key.shader_params.pixel_params2, [5.0, 2.0, 2.0, 0.0]);

    list.create_render_batches();
    assert_eq!(list.batch_data().num_post_process_passes(), 1);
    assert!(!list.batch_data().render_batches()[0].has_geometry());

    let mut empty = WindowElementList::new(Size::new(0.0, 600.0));
    empty.add_optional(DrawElement::make_post_process_pass(0, &geometry(0.0, 0.0, 10.0, 10.0), [1.0, 1.0], 1));
    let batcher = common::batch(&mut policy, &mut empty);
    assert_eq!(batcher.num_post_process_passes(), 1);
    assert!(empty.root_batch_map().is_empty());
}

#[test]
fn render_batches_are_sorted_by_layer() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let g = geometry(0.0, 0.0, 10.0, 10.0);
    let first = SlateBrush::image(ShaderResourceProxy::whole(ShaderResource::texture(4, 4)));
    let second = SlateBrush::image(ShaderResourceProxy::whole(ShaderResource::texture(4, 4)));
    list.add_optional(solid_box(5, &g));
    list.add_optional(solid_box(1, &g));
    list.add_optional(DrawElement::make_box(3, &g, &first, DrawEffects::NONE, LinearColor::WHITE));
    list.add_optional(DrawElement::make_box(3, &g, &second, DrawEffects::NONE, LinearColor::WHITE));

    common::batch(&mut policy, &mut list);
    list.create_render_batches();
    let data = list.batch_data();
    let layers: Vec<u32> = data.render_batches().iter().map(|b| b.layer).collect();
    assert_eq!(layers, vec![1, 3, 3, 5]);

    let textures: Vec<_> = data.render_batches().iter().map(|b| b.texture.map(|t| t.id)).collect();
    assert_eq!(textures[1], first.resource.map(|p| p.resource.id));
    assert_eq!(textures[2], second.resource.map(|p| p.resource.id));

    let offsets: Vec<u32> = data.render_batches().iter().map(|b| b.vertex_offset).collect();
    assert_eq!(offsets, vec![0, 4, 8, 12]);
    assert_eq!(data.num_batched_vertices(), 16);
    assert_eq!(data.num_batched_indices(), 24);

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    data.fill_vertex_and_index_buffer(&mut vertices, &mut indices, true);
    assert_eq!(vertices.len(), 16);
    assert_eq!(&indices[6..12], &[4, 5, 6, 6, 5, 7]);
    data.fill_vertex_and_index_buffer(&mut vertices, &mut indices, false);
    assert_eq!(&indices[6..12], &[0, 1, 2, 2, 1, 3]);
}

#[test]
fn logical_layers_are_spliced_in_place() {
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let g = geometry(0.0, 0.0, 10.0, 10.0);
    list.add_optional(solid_box(0, &g));
    list.begin_logical_layer(1);
    list.add_optional(solid_box(7, &g));
    list.add_optional(solid_box(6, &g));
    list.end_logical_layer();
    list.add_optional(solid_box(2, &g));

    common::batch(&mut policy, &mut list);
    list.create_render_batches();
    let layers: Vec<u32> = list.batch_data().render_batches().iter().map(|b| b.layer).collect();
    assert_eq!(layers, vec![0, 6, 7, 2]);
}

#[test]
fn cached_buffers_replay_at_an_offset() {
    let mut policy = common::policy(SlateConfig::default());
    let mut recorded = window();
    recorded.push_clip(ClippingZone::from_rect(Rectangle::new(0.0, 0.0, 50.0, 50.0)));
    recorded.add_optional(solid_box(0, &geometry(0.0, 0.0, 10.0, 10.0)));
    recorded.pop_clip();
    common::batch(&mut policy, &mut recorded);
    recorded.create_render_batches();
    let cached = recorded.cache_render_data();
    assert_eq!(cached.vertices.len(), 4);

    let mut list = window();
    list.push_clip(ClippingZone::from_rect(Rectangle::new(0.0, 0.0, 800.0, 600.0)));
    list.pop_clip();
    list.add_optional(solid_box(0, &geometry(0.0, 0.0, 10.0, 10.0)));
    list.add_item(DrawElement::make_cached_buffer(1, cached, Position::new(5.0, 5.0)));
    common::batch(&mut policy, &mut list);
    list.create_render_batches();

    let data = list.batch_data();
    let batches = data.render_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].dynamic_offset, Position::new(5.0, 5.0));
    assert_eq!(batches[1].vertex_offset, 4);
    assert_eq!(batches[1].num_vertices, 4);
    // the replayed clip state lands after the window's own
    assert_eq!(batches[1].clipping_index, Some(1));
    assert_eq!(data.render_clip_states().len(), 2);
}

struct NoopDrawer;

impl CustomSlateElement for NoopDrawer {
    fn draw_render_thread(&self, _backend: &mut dyn RenderBackend) {}
}

#[test]
fn dropped_custom_drawers_are_skipped() {
    let mut policy = common::policy(SlateConfig::default());
    let drawer: Arc<dyn CustomSlateElement> = Arc::new(NoopDrawer);
    let mut list = window();
    list.add_item(DrawElement::make_custom(0, &drawer));
    common::batch(&mut policy, &mut list);
    list.create_render_batches();
    assert!(list.batch_data().render_batches()[0].custom_drawer.is_some());

    list.reset_batches();
    drop(drawer);
    common::batch(&mut policy, &mut list);
    list.create_render_batches();
    assert!(list.batch_data().render_batches().is_empty());
}

#[test]
fn text_quads_follow_the_character_metrics() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    let g = geometry(10.0, 20.0, 100.0, 40.0);
    list.add_optional(DrawElement::make_text(0, &g, "AB\nC D", None, &info, DrawEffects::NONE, LinearColor::WHITE));

    let batcher = common::batch(&mut policy, &mut list);
    assert_eq!(batcher.stats().num_glyph_quads, 4);
    let batches = layer_batches(&list, 0);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].key.shader_type, ShaderType::Font);

    let vertices = positions(&list, &batches[0]);
    assert_eq!(vertices.len(), 16);
    // pen + bearing, baseline at line height + descender
    assert_eq!(vertices[0], (11.0, 20.0));
    assert_eq!(vertices[3], (17.0, 32.0));
    assert_eq!(vertices[4], (19.0, 20.0));
    // second line, the space only advances
    assert_eq!(vertices[8], (11.0, 36.0));
    assert_eq!(vertices[12], (27.0, 36.0));
}

#[test]
fn outlined_text_draws_outline_below_fill() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face).with_outline(FontOutlineSettings::new(2, LinearColor::BLACK));
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    list.add_optional(DrawElement::make_text(
        3,
        &geometry(0.0, 0.0, 100.0, 40.0),
        "A",
        None,
        &info,
        DrawEffects::NONE,
        LinearColor::WHITE,
    ));

    common::batch(&mut policy, &mut list);
    let outline = &layer_batches(&list, 3)[0];
    let fill = &layer_batches(&list, 4)[0];
    let outline_vertices = list.batch_data().batch_vertex_list(outline);
    let fill_vertices = list.batch_data().batch_vertex_list(fill);
    assert_eq!(outline_vertices[0].color, [0, 0, 0, 255]);
    assert_eq!(fill_vertices[0].color, [255, 255, 255, 255]);
    assert_eq!(fill_vertices[0].position[0] - outline_vertices[0].position[0], 2.0);
    // dilated by two texels on every side
    let outline_width = outline_vertices[1].position[0] - outline_vertices[0].position[0];
    let fill_width = fill_vertices[1].position[0] - fill_vertices[0].position[0];
    assert_eq!(outline_width, fill_width + 4.0);
}

#[test]
fn invisible_text_is_skipped() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    list.add_optional(DrawElement::make_text(
        0,
        &geometry(0.0, 0.0, 100.0, 40.0),
        "hidden",
        None,
        &info,
        DrawEffects::NONE,
        LinearColor::TRANSPARENT,
    ));
    common::batch(&mut policy, &mut list);
    assert!(list.root_batch_map().is_empty());
    assert_eq!(face.rasterizations(), 0);
}

#[test]
fn shaped_text_outline_uses_two_layers() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face).with_outline(FontOutlineSettings::new(1, LinearColor::BLACK));
    let mut policy = common::policy(SlateConfig::default());
    let sequence = policy
        .font_cache_mut()
        .shape_bidirectional_text("Hi there", 0..8, &info, 1.0, TextDirection::LeftToRight, None);
    let mut list = window();
    list.add_optional(DrawElement::make_shaped_text(
        1,
        &geometry(0.0, 0.0, 200.0, 40.0),
        Arc::new(sequence),
        DrawEffects::NONE,
        LinearColor::WHITE,
        LinearColor::RED,
    ));

    let batcher = common::batch(&mut policy, &mut list);
    // seven visible glyphs, once per pass
    assert_eq!(batcher.stats().num_glyph_quads, 14);
    let outline = &layer_batches(&list, 1)[0];
    let fill = &layer_batches(&list, 2)[0];
    assert_eq!(list.batch_data().batch_vertex_list(outline)[0].color, [255, 0, 0, 255]);
    assert_eq!(list.batch_data().batch_vertex_list(fill).len(), 28);
}

#[test]
fn outline_only_text_is_still_drawn() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face).with_outline(FontOutlineSettings::new(2, LinearColor::BLACK));
    let mut policy = common::policy(SlateConfig::default());
    let mut list = window();
    list.add_optional(DrawElement::make_text(
        0,
        &geometry(0.0, 0.0, 100.0, 40.0),
        "AB",
        None,
        &info,
        DrawEffects::NONE,
        LinearColor::TRANSPARENT,
    ));

    let sequence = policy
        .font_cache_mut()
        .shape_bidirectional_text("AB", 0..2, &info, 1.0, TextDirection::LeftToRight, None);
    list.add_optional(DrawElement::make_shaped_text(
        5,
        &geometry(0.0, 50.0, 100.0, 40.0),
        Arc::new(sequence),
        DrawEffects::NONE,
        LinearColor::TRANSPARENT,
        LinearColor::RED,
    ));

    common::batch(&mut policy, &mut list);
    let data = list.batch_data();
    let text_outline = data.batch_vertex_list(&layer_batches(&list, 0)[0]);
    assert_eq!(text_outline.len(), 8);
    assert_eq!(text_outline[0].color, [0, 0, 0, 255]);
    let shaped_outline = data.batch_vertex_list(&layer_batches(&list, 5)[0]);
    assert_eq!(shaped_outline.len(), 8);
    assert_eq!(shaped_outline[0].color, [255, 0, 0, 255]);
}

fn shaped_hello(sequence: ShapedGlyphSequence) -> WindowElementList {
    let mut list = window();
    list.add_optional(DrawElement::make_shaped_text(
        0,
        &geometry(0.0, 0.0, 200.0, 40.0),
        Arc::new(sequence),
        DrawEffects::NONE,
        LinearColor::WHITE,
        LinearColor::TRANSPARENT,
    ));
    list
}

#[test]
fn text_shaped_on_the_game_thread_draws_with_the_render_cache() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let config = SlateConfig::default();
    let mut services = SlateFontServices::new(&config);
    let sequence = services.game_thread_font_cache().shape_bidirectional_text(
        "Hello",
        0..5,
        &info,
        1.0,
        TextDirection::LeftToRight,
        None,
    );
    let render_cache = services.take_render_thread_font_cache().expect("render cache");
    let mut policy = RenderingPolicy::new(config, render_cache);
    let mut list = shaped_hello(sequence);

    let batcher = common::batch(&mut policy, &mut list);
    assert_eq!(batcher.stats().num_glyph_quads, 5);
    // 'l' appears twice
    assert_eq!(face.rasterizations(), 4);
    assert_eq!(policy.font_cache().atlas_manager().num_atlas_pages(), 1);
    assert_eq!(services.game_thread_font_cache().atlas_manager().num_atlas_pages(), 0);
}

#[test]
fn cached_shaped_text_is_rasterized_again_after_a_flush() {
    let face = BlockFace::ascii("Block");
    let info = common::font_info(&face);
    let mut policy = common::policy(SlateConfig::default());
    let sequence = policy
        .font_cache_mut()
        .shape_bidirectional_text("Hello", 0..5, &info, 1.0, TextDirection::LeftToRight, None);
    let mut list = shaped_hello(sequence);

    let batcher = common::batch(&mut policy, &mut list);
    assert_eq!(batcher.stats().num_glyph_quads, 5);

    policy.font_cache_mut().request_flush_cache("reload");
    assert!(policy.font_cache_mut().conditional_flush_cache());
    assert_eq!(policy.font_cache().atlas_manager().num_atlas_pages(), 0);

    list.reset_batches();
    let batcher = common::batch(&mut policy, &mut list);
    assert_eq!(batcher.stats().num_glyph_quads, 5);
    assert_eq!(face.rasterizations(), 8);
    assert_eq!(layer_batches(&list, 0).len(), 1);
}
