use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{Margin, Position, Rectangle, Size};

/// Identity of a GPU texture known to the renderer backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Regular rgba texture
    Texture,
    /// Single channel coverage texture (font atlas pages)
    AlphaOnly,
    /// Render target owned by a viewport
    RenderTarget,
}

/// A texture as the batcher sees it: an id plus its dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderResource {
    pub id: ResourceId,
    pub width: u32,
    pub height: u32,
    pub kind: ResourceKind,
}

impl ShaderResource {
    pub fn texture(width: u32, height: u32) -> Self {
        Self {
            id: ResourceId::new(),
            width,
            height,
            kind: ResourceKind::Texture,
        }
    }

    pub fn render_target(width: u32, height: u32) -> Self {
        Self {
            kind: ResourceKind::RenderTarget,
            ..Self::texture(width, height)
        }
    }
}

/// Where a brush image lives: possibly a sub rectangle of a shared atlas
/// texture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShaderResourceProxy {
    pub resource: ShaderResource,
    /// size of the image itself, not of the atlas holding it
    pub actual_size: (u32, u32),
    pub start_uv: Position,
    pub size_uv: Position,
}

impl ShaderResourceProxy {
    /// Proxy covering a whole, non-atlased texture.
    pub fn whole(resource: ShaderResource) -> Self {
        Self {
            resource,
            actual_size: (resource.width, resource.height),
            start_uv: Position::ZERO,
            size_uv: Position::splat(1.0),
        }
    }

    /// Proxy for a region of `atlas` given in texels.
    pub fn atlased(atlas: ShaderResource, region: Rectangle) -> Self {
        let atlas_w = atlas.width.max(1) as f32;
        let atlas_h = atlas.height.max(1) as f32;
        Self {
            resource: atlas,
            actual_size: (region.width as u32, region.height as u32),
            start_uv: Position::new(region.x / atlas_w, region.y / atlas_h),
            size_uv: Position::new(region.width / atlas_w, region.height / atlas_h),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushDrawType {
    NoDrawType,
    Box,
    Border,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushTileType {
    NoTile,
    Horizontal,
    Vertical,
    Both,
}

impl BrushTileType {
    pub fn tiles_horizontally(self) -> bool {
        matches!(self, BrushTileType::Horizontal | BrushTileType::Both)
    }

    pub fn tiles_vertically(self) -> bool {
        matches!(self, BrushTileType::Vertical | BrushTileType::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushMirrorType {
    NoMirror,
    Horizontal,
    Vertical,
    Both,
}

impl BrushMirrorType {
    pub fn mirrors_horizontally(self) -> bool {
        matches!(self, BrushMirrorType::Horizontal | BrushMirrorType::Both)
    }

    pub fn mirrors_vertically(self) -> bool {
        matches!(self, BrushMirrorType::Vertical | BrushMirrorType::Both)
    }
}

/// How to paint a rectangle: which texture, how to slice it and how to
/// repeat it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlateBrush {
    pub draw_as: BrushDrawType,
    pub tiling: BrushTileType,
    pub mirroring: BrushMirrorType,
    /// 9-slice margins as fractions of the image size
    pub margin: Margin,
    pub image_size: Size,
    /// optional uv region overriding the proxy's atlas region
    pub uv_region: Option<Rectangle>,
    pub resource: Option<ShaderResourceProxy>,
}

impl Default for SlateBrush {
    fn default() -> Self {
        Self {
            draw_as: BrushDrawType::Image,
            tiling: BrushTileType::NoTile,
            mirroring: BrushMirrorType::NoMirror,
            margin: Margin::default(),
            image_size: Size::new(32.0, 32.0),
            uv_region: None,
            resource: None,
        }
    }
}

impl SlateBrush {
    pub fn image(resource: ShaderResourceProxy) -> Self {
        let (w, h) = resource.actual_size;
        Self {
            image_size: Size::new(w as f32, h as f32),
            resource: Some(resource),
            ..Self::default()
        }
    }

    pub fn boxed(resource: ShaderResourceProxy, margin: Margin) -> Self {
        Self {
            draw_as: BrushDrawType::Box,
            margin,
            ..Self::image(resource)
        }
    }

    pub fn border(resource: ShaderResourceProxy, margin: Margin) -> Self {
        Self {
            draw_as: BrushDrawType::Border,
            margin,
            ..Self::image(resource)
        }
    }

    /// Untextured brush drawn with the vertex color only.
    pub fn solid() -> Self {
        Self {
            draw_as: BrushDrawType::Image,
            ..Self::default()
        }
    }

    pub fn no_draw() -> Self {
        Self {
            draw_as: BrushDrawType::NoDrawType,
            ..Self::default()
        }
    }

    pub fn with_tiling(mut self, tiling: BrushTileType) -> Self {
        self.tiling = tiling;
        self
    }

    pub fn with_mirroring(mut self, mirroring: BrushMirrorType) -> Self {
        self.mirroring = mirroring;
        self
    }

    pub fn with_uv_region(mut self, region: Rectangle) -> Self {
        self.uv_region = Some(region);
        self
    }
}
