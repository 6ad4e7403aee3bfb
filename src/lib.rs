//! Draw element batching for a retained-mode UI renderer.
//!
//! Widgets paint [`DrawElement`]s into a [`WindowElementList`]. The
//! [`ElementBatcher`] tessellates them into [`batch::ElementBatch`]es keyed by
//! render state, [`batch::BatchData`] merges those into GPU-ready
//! [`batch::RenderBatch`]es and a [`renderer::RenderBackend`] draws them.
//! Glyphs come from a [`FontCache`] backed by alpha-only atlas pages.

pub mod batch;
pub mod config;
pub mod draw_elements;
pub mod element_batcher;
pub mod font;
pub mod renderer;
pub mod resources;
pub mod utils;

pub use batch::{BatchData, BatchDrawFlags, BatchKey, RenderBatch, ShaderParams, ShaderType};
pub use config::{ConfigError, SlateConfig};
pub use draw_elements::{ClippingZone, DrawEffects, DrawElement, PaintGeometry, WindowElementList};
pub use element_batcher::{BatcherStats, ElementBatcher, RenderingPolicy};
pub use font::{CompositeFont, FontCache, FontInfo, FontMeasure, SlateFontServices, Typeface};
pub use renderer::{BackendError, FrameStats, RecordingBackend, RenderBackend, SlateRenderer};
pub use resources::{ResourceId, ShaderResource, ShaderResourceProxy, SlateBrush};
pub use utils::{LinearColor, Position, Rectangle, Size, SlateIndex, SlateVertex};
