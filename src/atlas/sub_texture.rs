use glam::Vec2;
use image::{Rgba, RgbaImage};

use super::wrap::UvBounds;

/// Edge length of generated flat-colour swatches.
pub const SWATCH_SIZE: u32 = 8;

/// What a SubTexture was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTextureKind {
    /// Decoded from a texture resource.
    Textured,
    /// Generated from a flat material colour.
    Flat,
}

/// One packed unit of the atlas: a texture or a colour swatch.
#[derive(Debug, Clone)]
pub struct SubTexture {
    key: String,
    kind: SubTextureKind,
    /// Single-colour content; sampled at its centre and never tinted.
    flat: bool,
    pixels: Option<RgbaImage>,
    width: u32,
    height: u32,
    bounds: UvBounds,
    origin: (u32, u32),
}

impl SubTexture {
    /// Wrap a decoded texture. Textures of a single uniform colour are
    /// flagged flat.
    pub fn from_image(key: impl Into<String>, image: RgbaImage) -> Self {
        let flat = is_uniform(&image);
        let (width, height) = image.dimensions();
        Self {
            key: key.into(),
            kind: SubTextureKind::Textured,
            flat,
            pixels: Some(image),
            width,
            height,
            bounds: UvBounds::default(),
            origin: (0, 0),
        }
    }

    /// Generate a [`SWATCH_SIZE`] square swatch of one colour.
    pub fn swatch(key: impl Into<String>, rgba: [u8; 4]) -> Self {
        let image = RgbaImage::from_pixel(SWATCH_SIZE, SWATCH_SIZE, Rgba(rgba));
        Self {
            key: key.into(),
            kind: SubTextureKind::Flat,
            flat: true,
            pixels: Some(image),
            width: SWATCH_SIZE,
            height: SWATCH_SIZE,
            bounds: UvBounds::default(),
            origin: (0, 0),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> SubTextureKind {
        self.kind
    }

    pub fn is_flat(&self) -> bool {
        self.flat
    }

    /// Natural (single-tile) width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Natural (single-tile) height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> UvBounds {
        self.bounds
    }

    pub fn copies_u(&self) -> u32 {
        self.bounds.copies_u()
    }

    pub fn copies_v(&self) -> u32 {
        self.bounds.copies_v()
    }

    pub fn placed_width(&self) -> u32 {
        self.width * self.copies_u()
    }

    pub fn placed_height(&self) -> u32 {
        self.height * self.copies_v()
    }

    pub fn placed_area(&self) -> u64 {
        u64::from(self.placed_width()) * u64::from(self.placed_height())
    }

    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, x: u32, y: u32) {
        self.origin = (x, y);
    }

    /// Widen the tile range. Flat content never tiles.
    pub fn extend(&mut self, bounds: &UvBounds) {
        if !self.flat {
            self.bounds = self.bounds.union(bounds);
        }
    }

    pub fn has_pixels(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    /// Hand the source pixels to the compositor.
    pub(crate) fn take_pixels(&mut self) -> Option<RgbaImage> {
        self.pixels.take()
    }

    /// Local coordinate actually sampled: flat content always samples
    /// its centre.
    pub fn local_uv(&self, uv: Vec2) -> Vec2 {
        if self.flat { Vec2::splat(0.5) } else { uv }
    }

    /// Map a local (tile-shifted) UV into atlas space.
    pub fn map_uv(&self, uv: Vec2, sheet_width: u32, sheet_height: u32) -> Vec2 {
        let local = self.local_uv(uv);
        let sw = sheet_width as f32;
        let sh = sheet_height as f32;
        Vec2::new(
            self.origin.0 as f32 / sw + (local.x - self.bounds.min_u as f32) * (self.width as f32 / sw),
            self.origin.1 as f32 / sh + (local.y - self.bounds.min_v as f32) * (self.height as f32 / sh),
        )
    }
}

/// Whether every pixel of an image has the same value.
fn is_uniform(image: &RgbaImage) -> bool {
    let mut pixels = image.pixels();
    match pixels.next() {
        Some(first) => pixels.all(|p| p == first),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn checker(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn swatch_is_flat_and_sized() {
        let st = SubTexture::swatch("generated:paint", [10, 20, 30, 255]);
        assert_eq!(st.kind(), SubTextureKind::Flat);
        assert!(st.is_flat());
        assert_eq!((st.width(), st.height()), (SWATCH_SIZE, SWATCH_SIZE));
        assert_eq!(
            st.pixels().unwrap().get_pixel(3, 5),
            &Rgba([10, 20, 30, 255])
        );
    }

    #[test]
    fn uniform_texture_is_flagged_flat() {
        let plain = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let st = SubTexture::from_image("plain.png", plain);
        assert_eq!(st.kind(), SubTextureKind::Textured);
        assert!(st.is_flat());

        let st = SubTexture::from_image("checker.png", checker(4));
        assert!(!st.is_flat());
    }

    #[test]
    fn placed_size_scales_with_copies() {
        let mut st = SubTexture::from_image("checker.png", checker(16));
        st.extend(&UvBounds {
            min_u: 0,
            max_u: 2,
            min_v: 0,
            max_v: 3,
        });
        assert_eq!(st.placed_width(), 32);
        assert_eq!(st.placed_height(), 48);
        assert_eq!(st.placed_area(), 32 * 48);
    }

    #[test]
    fn flat_never_extends() {
        let mut st = SubTexture::swatch("generated:x", [0, 0, 0, 255]);
        st.extend(&UvBounds {
            min_u: 0,
            max_u: 4,
            min_v: 0,
            max_v: 4,
        });
        assert_eq!(st.copies_u(), 1);
        assert_eq!(st.copies_v(), 1);
    }

    #[test]
    fn map_uv_places_within_cell() {
        let mut st = SubTexture::from_image("checker.png", checker(16));
        st.set_origin(8, 0);

        let uv = st.map_uv(Vec2::new(0.0, 0.0), 32, 16);
        assert_relative_eq!(uv.x, 0.25);
        assert_relative_eq!(uv.y, 0.0);

        let uv = st.map_uv(Vec2::new(1.0, 1.0), 32, 16);
        assert_relative_eq!(uv.x, 0.75);
        assert_relative_eq!(uv.y, 1.0);
    }

    #[test]
    fn flat_maps_to_swatch_centre() {
        let mut st = SubTexture::swatch("generated:x", [0, 0, 0, 255]);
        st.set_origin(16, 0);
        assert_eq!(st.local_uv(Vec2::new(7.0, -3.0)), Vec2::splat(0.5));

        let a = st.map_uv(Vec2::new(0.0, 0.0), 24, 16);
        let b = st.map_uv(Vec2::new(0.9, 0.1), 24, 16);
        assert_eq!(a, b);
        assert_relative_eq!(a.x, 20.0 / 24.0);
        assert_relative_eq!(a.y, 4.0 / 16.0);
    }

    #[test]
    fn take_pixels_releases() {
        let mut st = SubTexture::from_image("checker.png", checker(2));
        assert!(st.has_pixels());
        assert!(st.take_pixels().is_some());
        assert!(!st.has_pixels());
        assert!(st.take_pixels().is_none());
    }
}
