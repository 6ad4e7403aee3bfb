//! Batches a demo frame and prints what the renderer would draw.
//!
//! Usage:
//!   batch_dump [--font path.ttf] [--config slate.json] [--atlas atlas.png] [--render frame.png]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;

use slate_core::batch::{DrawPrimitive, ShaderType};
use slate_core::config::SlateConfig;
use slate_core::draw_elements::{
    ClippingZone, DrawEffects, DrawElement, GradientStop, Orientation, PaintGeometry, WindowElementList,
};
use slate_core::font::{
    CompositeFont, FontCache, FontInfo, FontOutlineSettings, TextDirection, TrueTypeFace, Typeface,
};
use slate_core::renderer::{FrameStats, RecordingBackend, RenderBackend, SlateRenderer};
use slate_core::resources::{ShaderResource, ShaderResourceProxy, SlateBrush};
use slate_core::utils::{LinearColor, Margin, Position, Rectangle, Size};

const VIEWPORT_WIDTH: u32 = 800;
const VIEWPORT_HEIGHT: u32 = 600;
const PANEL_SIZE: u32 = 64;

#[derive(Default)]
struct Args {
    font: Option<PathBuf>,
    config: Option<PathBuf>,
    atlas: Option<PathBuf>,
    render: Option<PathBuf>,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);
        while let Some(flag) = iter.next() {
            let mut value = || iter.next().map(PathBuf::from).with_context(|| format!("{} needs a value", flag));
            match flag.as_str() {
                "--font" => args.font = Some(value()?),
                "--config" => args.config = Some(value()?),
                "--atlas" => args.atlas = Some(value()?),
                "--render" => args.render = Some(value()?),
                other => bail!("unknown argument {}", other),
            }
        }
        Ok(args)
    }
}

#[derive(Serialize)]
struct BatchSummary {
    layer: u32,
    shader_type: ShaderType,
    primitive: DrawPrimitive,
    textured: bool,
    vertex_offset: u32,
    num_vertices: u32,
    index_offset: u32,
    num_indices: u32,
    clipped: bool,
}

#[derive(Serialize)]
struct Report {
    frame: FrameStats,
    batches: Vec<BatchSummary>,
    atlas_pages: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse()?;

    let config = match &args.config {
        Some(path) => SlateConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SlateConfig::default(),
    };

    let font = match &args.font {
        Some(path) => {
            let face = TrueTypeFace::from_file(path).with_context(|| format!("loading {}", path.display()))?;
            let name = face_name(path);
            Some(Arc::new(CompositeFont::new(Typeface::single(name, Arc::new(face)))))
        }
        None => None,
    };

    let font_cache = FontCache::new(&config);
    let panel = ShaderResource::texture(PANEL_SIZE, PANEL_SIZE);
    let viewport = Size::new(VIEWPORT_WIDTH as f32, VIEWPORT_HEIGHT as f32);
    let mut windows = vec![WindowElementList::new(viewport)];

    if let Some(path) = &args.render {
        render_to_png(&args, config, font_cache, font.as_ref(), panel, &mut windows, path)?;
        return Ok(());
    }

    let mut renderer = SlateRenderer::new(RecordingBackend::new(), config, font_cache);
    renderer.backend_mut().create_texture_page(&panel, &panel_pixels())?;
    build_demo_frame(&mut windows[0], renderer.policy_mut().font_cache_mut(), font.as_ref(), panel);
    let frame = renderer.draw_windows(&mut windows);

    let report = make_report(frame, &windows[0], renderer.policy().font_cache());
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &args.atlas {
        save_atlas_pages(renderer.policy().font_cache(), path)?;
    }
    Ok(())
}

#[cfg(feature = "backend-wgpu")]
fn render_to_png(
    args: &Args,
    config: SlateConfig,
    font_cache: FontCache,
    font: Option<&Arc<CompositeFont>>,
    panel: ShaderResource,
    windows: &mut [WindowElementList],
    path: &std::path::Path,
) -> anyhow::Result<()> {
    use slate_core::renderer::WgpuBackend;

    let backend = WgpuBackend::headless(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)?;
    let mut renderer = SlateRenderer::new(backend, config, font_cache);
    renderer.backend_mut().create_texture_page(&panel, &panel_pixels())?;
    build_demo_frame(&mut windows[0], renderer.policy_mut().font_cache_mut(), font, panel);
    let frame = renderer.draw_windows(windows);
    if frame.windows_skipped > 0 {
        bail!("{} window(s) failed to draw", frame.windows_skipped);
    }

    renderer.backend().read_target()?.save(path)?;
    log::info!("wrote {}", path.display());

    let report = make_report(frame, &windows[0], renderer.policy().font_cache());
    println!("{}", serde_json::to_string_pretty(&report)?);
    if let Some(atlas) = &args.atlas {
        save_atlas_pages(renderer.policy().font_cache(), atlas)?;
    }
    Ok(())
}

#[cfg(not(feature = "backend-wgpu"))]
fn render_to_png(
    _args: &Args,
    _config: SlateConfig,
    _font_cache: FontCache,
    _font: Option<&Arc<CompositeFont>>,
    _panel: ShaderResource,
    _windows: &mut [WindowElementList],
    _path: &std::path::Path,
) -> anyhow::Result<()> {
    bail!("--render needs the backend-wgpu feature")
}

fn face_name(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Regular".to_string())
}

/// Checkered RGBA tile with a light frame, used by the box and border demos.
fn panel_pixels() -> Vec<u8> {
    let mut pixels = Vec::with_capacity((PANEL_SIZE * PANEL_SIZE * 4) as usize);
    for y in 0..PANEL_SIZE {
        for x in 0..PANEL_SIZE {
            let edge = x < 4 || y < 4 || x >= PANEL_SIZE - 4 || y >= PANEL_SIZE - 4;
            let value = if edge {
                230
            } else if (x / 8 + y / 8) % 2 == 0 {
                90
            } else {
                60
            };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    pixels
}

/// One of every element kind the batcher can draw without external
/// resources, plus text when a font was given.
fn build_demo_frame(
    window: &mut WindowElementList,
    font_cache: &mut FontCache,
    font: Option<&Arc<CompositeFont>>,
    panel: ShaderResource,
) {
    let panel = ShaderResourceProxy::whole(panel);
    let white = LinearColor::WHITE;

    window.add_optional(DrawElement::make_box(
        0,
        &PaintGeometry::new(Position::new(0.0, 0.0), Size::new(800.0, 600.0), 1.0),
        &SlateBrush::solid(),
        DrawEffects::NONE,
        LinearColor::new(0.08, 0.08, 0.1, 1.0),
    ));
    window.add_optional(DrawElement::make_box(
        1,
        &PaintGeometry::new(Position::new(20.0, 20.0), Size::new(360.0, 240.0), 1.0),
        &SlateBrush::boxed(panel, Margin::uniform(0.25)),
        DrawEffects::NONE,
        white,
    ));
    window.add_optional(DrawElement::make_box(
        1,
        &PaintGeometry::new(Position::new(420.0, 20.0), Size::new(360.0, 240.0), 1.0),
        &SlateBrush::border(panel, Margin::uniform(0.25)),
        DrawEffects::NONE,
        white,
    ));
    window.add_optional(DrawElement::make_gradient(
        2,
        &PaintGeometry::new(Position::new(40.0, 300.0), Size::new(320.0, 60.0), 1.0),
        vec![
            GradientStop::new(Position::new(0.0, 0.0), LinearColor::new(1.0, 0.2, 0.2, 1.0)),
            GradientStop::new(Position::new(160.0, 0.0), LinearColor::new(0.2, 1.0, 0.2, 1.0)),
            GradientStop::new(Position::new(320.0, 0.0), LinearColor::new(0.2, 0.2, 1.0, 1.0)),
        ],
        Orientation::Vertical,
        DrawEffects::NONE,
    ));

    window.push_clip(ClippingZone::from_rect(Rectangle::new(400.0, 280.0, 380.0, 300.0)));
    window.add_item(DrawElement::make_spline(
        2,
        &PaintGeometry::new(Position::new(420.0, 300.0), Size::new(340.0, 260.0), 1.0),
        Position::new(0.0, 0.0),
        Position::new(300.0, 0.0),
        Position::new(340.0, 260.0),
        Position::new(300.0, 0.0),
        3.0,
        DrawEffects::NONE,
        LinearColor::new(1.0, 0.8, 0.2, 1.0),
    ));
    window.add_optional(DrawElement::make_lines(
        2,
        &PaintGeometry::new(Position::new(420.0, 300.0), Size::new(340.0, 260.0), 1.0),
        vec![
            Position::new(0.0, 260.0),
            Position::new(120.0, 100.0),
            Position::new(220.0, 180.0),
            Position::new(340.0, 20.0),
        ],
        DrawEffects::NONE,
        LinearColor::new(0.4, 0.9, 1.0, 1.0),
        true,
        2.0,
    ));
    window.pop_clip();

    window.add_item(DrawElement::make_debug_quad(
        3,
        &PaintGeometry::new(Position::new(20.0, 20.0), Size::new(360.0, 240.0), 1.0),
        LinearColor::new(1.0, 0.0, 1.0, 1.0),
    ));

    let Some(font) = font else {
        return;
    };
    let title = FontInfo::new(font.clone(), 24.0)
        .with_outline(FontOutlineSettings::new(1, LinearColor::BLACK));
    window.add_optional(DrawElement::make_text(
        4,
        &PaintGeometry::new(Position::new(40.0, 40.0), Size::new(320.0, 40.0), 1.0),
        "Slate batch dump",
        None,
        &title,
        DrawEffects::NONE,
        white,
    ));

    let body = FontInfo::new(font.clone(), 14.0);
    let text = "Shaped text, left to right";
    let sequence = font_cache.shape_bidirectional_text(
        text,
        0..text.chars().count(),
        &body,
        1.0,
        TextDirection::LeftToRight,
        None,
    );
    window.add_optional(DrawElement::make_shaped_text(
        4,
        &PaintGeometry::new(Position::new(40.0, 100.0), Size::new(320.0, 30.0), 1.0),
        Arc::new(sequence),
        DrawEffects::NONE,
        LinearColor::new(0.9, 0.9, 0.9, 1.0),
        LinearColor::BLACK,
    ));
}

fn make_report(frame: FrameStats, window: &WindowElementList, font_cache: &FontCache) -> Report {
    let batch_data = window.batch_data();
    let batches = batch_data
        .render_batches()
        .iter()
        .map(|batch| BatchSummary {
            layer: batch.layer,
            shader_type: batch.shader_type,
            primitive: batch.primitive,
            textured: batch.texture.is_some(),
            vertex_offset: batch.vertex_offset,
            num_vertices: batch.num_vertices,
            index_offset: batch.index_offset,
            num_indices: batch.num_indices,
            clipped: batch.clipping_index.is_some(),
        })
        .collect();
    Report {
        frame,
        batches,
        atlas_pages: font_cache.atlas_manager().num_atlas_pages(),
    }
}

fn save_atlas_pages(font_cache: &FontCache, path: &std::path::Path) -> anyhow::Result<()> {
    let stem = face_name(path);
    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    for (i, texture) in font_cache.atlas_manager().textures().iter().enumerate() {
        if !texture.is_atlased() {
            continue;
        }
        let resource = texture.resource();
        let image = image::GrayImage::from_raw(resource.width, resource.height, texture.pixels().to_vec())
            .with_context(|| format!("atlas page {} has the wrong size", i))?;
        let page_path = if i == 0 {
            path.to_path_buf()
        } else {
            dir.join(format!("{}_{}.png", stem, i))
        };
        image.save(&page_path)?;
        log::info!("wrote {}", page_path.display());
    }
    Ok(())
}
