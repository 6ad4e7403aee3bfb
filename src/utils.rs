use serde::{Deserialize, Serialize};
use std::{
    hash::{Hash, Hasher},
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

/// Index type used by every batch index buffer.
pub type SlateIndex = u32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn as_position(self) -> Position {
        Position::new(self.width, self.height)
    }
}

impl Mul<f32> for Size {
    type Output = Size;

    fn mul(self, rhs: f32) -> Self::Output {
        Size {
            width: self.width * rhs,
            height: self.height * rhs,
        }
    }
}

/// A 2D point or vector in whatever space the caller is working in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ZERO: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn splat(v: f32) -> Self {
        Self { x: v, y: v }
    }

    pub fn dot(self, other: Position) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn size_squared(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.size_squared().sqrt()
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector.
    pub fn safe_normal(self) -> Position {
        let len_sq = self.size_squared();
        if len_sq <= 1e-8 {
            Position::ZERO
        } else {
            self * (1.0 / len_sq.sqrt())
        }
    }

    /// Perpendicular rotated 90 degrees counter-clockwise in y-down space.
    pub fn perpendicular(self) -> Position {
        Position::new(-self.y, self.x)
    }

    pub fn round(self) -> Position {
        Position::new(self.x.round(), self.y.round())
    }

    pub fn component_mul(self, other: Position) -> Position {
        Position::new(self.x * other.x, self.y * other.y)
    }

    pub fn component_div(self, other: Position) -> Position {
        Position::new(self.x / other.x, self.y / other.y)
    }

    pub fn lerp(self, other: Position, alpha: f32) -> Position {
        self + (other - self) * alpha
    }

    pub fn is_nearly_zero(self, tolerance: f32) -> bool {
        self.x.abs() <= tolerance && self.y.abs() <= tolerance
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash at a fixed precision so nearly equal points land together
        let precision = 100.0;
        let x = (self.x * precision).round() as i32;
        let y = (self.y * precision).round() as i32;

        x.hash(state);
        y.hash(state);
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Self::Output {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Self::Output {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Position {
    fn sub_assign(&mut self, rhs: Position) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Position {
    type Output = Position;
    fn mul(self, factor: f32) -> Self::Output {
        Position {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

impl Div<f32> for Position {
    type Output = Position;
    fn div(self, divisor: f32) -> Self::Output {
        Position::new(self.x / divisor, self.y / divisor)
    }
}

impl Neg for Position {
    type Output = Position;
    fn neg(self) -> Self::Output {
        Position::new(-self.x, -self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= self.x
            && position.x <= self.x + self.width
            && position.y >= self.y
            && position.y <= self.y + self.height
    }

    pub fn pos(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Left, top, right and bottom insets. For brushes the values are fractions
/// of the brush image size, for layout they are slate units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Margin {
    pub fn uniform(v: f32) -> Self {
        Self {
            left: v,
            top: v,
            right: v,
            bottom: v,
        }
    }

    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.top == 0.0 && self.right == 0.0 && self.bottom == 0.0
    }
}

/// Linear space color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for LinearColor {
    fn default() -> Self {
        LinearColor::WHITE
    }
}

impl LinearColor {
    pub const WHITE: LinearColor = LinearColor::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: LinearColor = LinearColor::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: LinearColor = LinearColor::new(0.0, 0.0, 0.0, 0.0);
    pub const RED: LinearColor = LinearColor::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: LinearColor = LinearColor::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: LinearColor = LinearColor::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn mul_color(self, other: LinearColor) -> LinearColor {
        LinearColor::new(
            self.r * other.r,
            self.g * other.g,
            self.b * other.b,
            self.a * other.a,
        )
    }

    /// Quantizes to 8 bits per channel, optionally encoding rgb as sRGB.
    pub fn to_color(self, srgb: bool) -> Color {
        let encode = |c: f32| -> u8 {
            let c = c.clamp(0.0, 1.0);
            let c = if srgb {
                if c <= 0.003_130_8 {
                    c * 12.92
                } else {
                    1.055 * c.powf(1.0 / 2.4) - 0.055
                }
            } else {
                c
            };
            (c * 255.0 + 0.5).floor() as u8
        };
        Color {
            r: encode(self.r),
            g: encode(self.g),
            b: encode(self.b),
            a: (self.a.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u8,
        }
    }

    /// Hue in degrees, saturation and value in the rgb slots, alpha kept.
    pub fn linear_rgb_to_hsv(self) -> LinearColor {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let range = max - min;
        let hue = if range == 0.0 {
            0.0
        } else if max == self.r {
            (((self.g - self.b) / range) * 60.0 + 360.0) % 360.0
        } else if max == self.g {
            ((self.b - self.r) / range) * 60.0 + 120.0
        } else {
            ((self.r - self.g) / range) * 60.0 + 240.0
        };
        let saturation = if max == 0.0 { 0.0 } else { range / max };
        LinearColor::new(hue, saturation, max, self.a)
    }

    pub fn hsv_to_linear_rgb(self) -> LinearColor {
        let (hue, saturation, value) = (self.r, self.g, self.b);
        let h_div_60 = hue / 60.0;
        let h_div_60_floor = h_div_60.floor();
        let h_div_60_fraction = h_div_60 - h_div_60_floor;

        let rgb_values = [
            value,
            value * (1.0 - saturation),
            value * (1.0 - (h_div_60_fraction * saturation)),
            value * (1.0 - ((1.0 - h_div_60_fraction) * saturation)),
        ];
        const RGB_SWIZZLE: [[usize; 3]; 6] = [
            [0, 3, 1],
            [2, 0, 1],
            [1, 0, 3],
            [1, 2, 0],
            [3, 1, 0],
            [0, 1, 2],
        ];
        let swizzle_index = (h_div_60_floor as i32).rem_euclid(6) as usize;
        let s = RGB_SWIZZLE[swizzle_index];
        LinearColor::new(rgb_values[s[0]], rgb_values[s[1]], rgb_values[s[2]], self.a)
    }

    /// Interpolates through HSV along the shortest hue path.
    pub fn lerp_using_hsv(from: LinearColor, to: LinearColor, progress: f32) -> LinearColor {
        let from_hsv = from.linear_rgb_to_hsv();
        let to_hsv = to.linear_rgb_to_hsv();

        let mut from_hue = from_hsv.r;
        let mut to_hue = to_hsv.r;
        if (from_hue - to_hue).abs() > 180.0 {
            if to_hue > from_hue {
                from_hue += 360.0;
            } else {
                to_hue += 360.0;
            }
        }

        let mut new_hue = from_hue + (to_hue - from_hue) * progress;
        new_hue = new_hue.rem_euclid(360.0);

        let lerp = |a: f32, b: f32| a + (b - a) * progress;
        LinearColor::new(
            new_hue,
            lerp(from_hsv.g, to_hsv.g),
            lerp(from_hsv.b, to_hsv.b),
            lerp(from.a, to.a),
        )
        .hsv_to_linear_rgb()
    }
}

/// 8-bit RGBA vertex color.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn with_alpha(self, a: u8) -> Color {
        Color { a, ..self }
    }
}

/// 2D affine transform: a 2x2 linear part applied to row vectors, then a
/// translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlateRenderTransform {
    pub m: [[f32; 2]; 2],
    pub translation: Position,
}

impl Default for SlateRenderTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl SlateRenderTransform {
    pub const IDENTITY: SlateRenderTransform = SlateRenderTransform {
        m: [[1.0, 0.0], [0.0, 1.0]],
        translation: Position { x: 0.0, y: 0.0 },
    };

    pub fn from_translation(translation: Position) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_scale(scale: f32) -> Self {
        Self {
            m: [[scale, 0.0], [0.0, scale]],
            translation: Position::ZERO,
        }
    }

    pub fn from_scale_translation(scale: f32, translation: Position) -> Self {
        Self {
            m: [[scale, 0.0], [0.0, scale]],
            translation,
        }
    }

    pub fn from_rotation(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            m: [[cos, sin], [-sin, cos]],
            translation: Position::ZERO,
        }
    }

    pub fn transform_vector(&self, v: Position) -> Position {
        Position::new(
            v.x * self.m[0][0] + v.y * self.m[1][0],
            v.x * self.m[0][1] + v.y * self.m[1][1],
        )
    }

    pub fn transform_point(&self, p: Position) -> Position {
        self.transform_vector(p) + self.translation
    }

    /// `self` applied first, then `other`.
    pub fn concatenate(&self, other: &SlateRenderTransform) -> SlateRenderTransform {
        let a = self.m;
        let b = other.m;
        SlateRenderTransform {
            m: [
                [
                    a[0][0] * b[0][0] + a[0][1] * b[1][0],
                    a[0][0] * b[0][1] + a[0][1] * b[1][1],
                ],
                [
                    a[1][0] * b[0][0] + a[1][1] * b[1][0],
                    a[1][0] * b[0][1] + a[1][1] * b[1][1],
                ],
            ],
            translation: other.transform_point(self.translation),
        }
    }

    pub fn determinant(&self) -> f32 {
        self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]
    }

    pub fn inverse(&self) -> Option<SlateRenderTransform> {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let m = [
            [self.m[1][1] * inv_det, -self.m[0][1] * inv_det],
            [-self.m[1][0] * inv_det, self.m[0][0] * inv_det],
        ];
        let inverse = SlateRenderTransform {
            m,
            translation: Position::ZERO,
        };
        let translation = -inverse.transform_vector(self.translation);
        Some(SlateRenderTransform { m, translation })
    }

    /// True when the linear part keeps axis-aligned rectangles axis aligned.
    pub fn is_axis_aligned(&self) -> bool {
        (self.m[0][1].abs() <= 1e-4 && self.m[1][0].abs() <= 1e-4)
            || (self.m[0][0].abs() <= 1e-4 && self.m[1][1].abs() <= 1e-4)
    }
}

/// Whether vertex positions are snapped to whole pixels after transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexRounding {
    Enabled,
    Disabled,
}

/// GPU vertex layout shared by every batch.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SlateVertex {
    /// uv plus a second pair (tiling factor for boxes, line endpoints for lines)
    pub tex_coords: [f32; 4],
    /// normalized position inside the element, for material effects
    pub material_tex_coords: [f32; 2],
    pub position: [f32; 2],
    pub color: [u8; 4],
    pub pixel_size: [u16; 2],
}

impl SlateVertex {
    fn place(rounding: VertexRounding, position: Position) -> [f32; 2] {
        match rounding {
            VertexRounding::Enabled => {
                let p = position.round();
                [p.x, p.y]
            }
            VertexRounding::Disabled => [position.x, position.y],
        }
    }

    pub fn make(
        rounding: VertexRounding,
        transform: &SlateRenderTransform,
        local_position: Position,
        tex_coord: Position,
        tex_coord2: Position,
        color: Color,
    ) -> Self {
        Self {
            tex_coords: [tex_coord.x, tex_coord.y, tex_coord2.x, tex_coord2.y],
            material_tex_coords: [tex_coord.x, tex_coord.y],
            position: Self::place(rounding, transform.transform_point(local_position)),
            color: [color.r, color.g, color.b, color.a],
            pixel_size: [0, 0],
        }
    }

    pub fn make_uv(
        rounding: VertexRounding,
        transform: &SlateRenderTransform,
        local_position: Position,
        tex_coord: Position,
        color: Color,
    ) -> Self {
        Self::make(
            rounding,
            transform,
            local_position,
            tex_coord,
            Position::splat(1.0),
            color,
        )
    }

    /// Variant for sized elements: material coords are the normalized local
    /// position and the pixel size of the element is carried along.
    pub fn make_sized(
        rounding: VertexRounding,
        transform: &SlateRenderTransform,
        local_position: Position,
        local_size: Size,
        draw_scale: f32,
        tex_coords: [f32; 4],
        color: Color,
    ) -> Self {
        let material = if local_size.width != 0.0 && local_size.height != 0.0 {
            [
                local_position.x / local_size.width,
                local_position.y / local_size.height,
            ]
        } else {
            [0.0, 0.0]
        };
        let pixel_w = (local_size.width * draw_scale).round().clamp(0.0, u16::MAX as f32);
        let pixel_h = (local_size.height * draw_scale).round().clamp(0.0, u16::MAX as f32);
        Self {
            tex_coords,
            material_tex_coords: material,
            position: Self::place(rounding, transform.transform_point(local_position)),
            color: [color.r, color.g, color.b, color.a],
            pixel_size: [pixel_w as u16, pixel_h as u16],
        }
    }

    /// Text quads carry four texture components and a separate material
    /// coordinate in [0, 1] over the quad.
    pub fn make_material(
        rounding: VertexRounding,
        transform: &SlateRenderTransform,
        local_position: Position,
        tex_coords: [f32; 4],
        material: Position,
        color: Color,
    ) -> Self {
        Self {
            tex_coords,
            material_tex_coords: [material.x, material.y],
            position: Self::place(rounding, transform.transform_point(local_position)),
            color: [color.r, color.g, color.b, color.a],
            pixel_size: [0, 0],
        }
    }

    pub fn screen_position(&self) -> Position {
        Position::new(self.position[0], self.position[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_undoes_transform() {
        let t = SlateRenderTransform::from_rotation(0.7)
            .concatenate(&SlateRenderTransform::from_scale_translation(
                2.0,
                Position::new(5.0, -3.0),
            ));
        let inv = t.inverse().unwrap();
        let p = Position::new(12.0, 4.5);
        let back = inv.transform_point(t.transform_point(p));
        assert!((back.x - p.x).abs() < 1e-4 && (back.y - p.y).abs() < 1e-4);
    }

    #[test]
    fn hsv_round_trip_keeps_color() {
        let c = LinearColor::new(0.2, 0.6, 0.9, 0.5);
        let back = c.linear_rgb_to_hsv().hsv_to_linear_rgb();
        assert!((back.r - c.r).abs() < 1e-5);
        assert!((back.g - c.g).abs() < 1e-5);
        assert!((back.b - c.b).abs() < 1e-5);
        assert_eq!(back.a, c.a);
    }

    #[test]
    fn srgb_packing_brightens_midtones() {
        let linear = LinearColor::new(0.5, 0.5, 0.5, 1.0);
        assert_eq!(linear.to_color(false).r, 128);
        assert!(linear.to_color(true).r > 180);
        assert_eq!(linear.to_color(true).a, 255);
    }

    #[test]
    fn rounding_snaps_vertex_positions() {
        let t = SlateRenderTransform::from_translation(Position::new(0.4, 0.6));
        let v = SlateVertex::make_uv(
            VertexRounding::Enabled,
            &t,
            Position::new(1.0, 1.0),
            Position::ZERO,
            Color::WHITE,
        );
        assert_eq!(v.position, [1.0, 2.0]);
    }
}
