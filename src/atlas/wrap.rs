//! Tile-repeat extents for textures sampled outside `[0, 1]`.
//!
//! A face whose UVs span `u ∈ [2.3, 3.6]` is shifted by its integer tile
//! offset (2) so its coordinates fall in `[0.3, 1.6]`; the texture's cell in
//! the atlas is then widened to two copies so the shifted range can be
//! sampled without wrapping.

use glam::Vec2;

use crate::error::{AtlasError, Result};

/// Integer tile offset of a face, bounded to the `i8` range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileOffset(i8);

impl TileOffset {
    pub const MIN: i8 = i8::MIN;
    pub const MAX: i8 = i8::MAX;

    pub fn get(self) -> i8 {
        self.0
    }

    pub fn as_f32(self) -> f32 {
        f32::from(self.0)
    }
}

impl TryFrom<f32> for TileOffset {
    type Error = f32;

    /// Accepts integral values within the `i8` range; returns the rejected
    /// value otherwise.
    fn try_from(value: f32) -> std::result::Result<Self, f32> {
        if value.fract() != 0.0 || value < f32::from(Self::MIN) || value > f32::from(Self::MAX) {
            return Err(value);
        }
        Ok(TileOffset(value as i8))
    }
}

/// Per-face tile offset in U and V.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceOffset {
    pub u: TileOffset,
    pub v: TileOffset,
}

impl FaceOffset {
    /// Validate a raw floor offset, failing loudly for faces that tile
    /// further than a [`TileOffset`] can express.
    pub fn checked(face: usize, offset: Vec2) -> Result<Self> {
        let bounded = |value: f32| {
            TileOffset::try_from(value).map_err(|value| AtlasError::TileOffsetOutOfRange {
                face,
                value,
                min: TileOffset::MIN,
                max: TileOffset::MAX,
            })
        };
        Ok(FaceOffset {
            u: bounded(offset.x)?,
            v: bounded(offset.y)?,
        })
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.u.as_f32(), self.v.as_f32())
    }
}

/// Integer UV range covered by a SubTexture, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UvBounds {
    pub min_u: i32,
    pub max_u: i32,
    pub min_v: i32,
    pub max_v: i32,
}

impl Default for UvBounds {
    /// The base unit square.
    fn default() -> Self {
        Self {
            min_u: 0,
            max_u: 1,
            min_v: 0,
            max_v: 1,
        }
    }
}

impl UvBounds {
    pub fn copies_u(&self) -> u32 {
        (self.max_u - self.min_u).max(1) as u32
    }

    pub fn copies_v(&self) -> u32 {
        (self.max_v - self.min_v).max(1) as u32
    }

    /// Smallest bounds covering both `self` and `other`.
    pub fn union(&self, other: &UvBounds) -> UvBounds {
        UvBounds {
            min_u: self.min_u.min(other.min_u),
            max_u: self.max_u.max(other.max_u),
            min_v: self.min_v.min(other.min_v),
            max_v: self.max_v.max(other.max_v),
        }
    }
}

/// Extent of one face's texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceExtent {
    /// Floor of the raw minimum, before any widening.
    pub offset: Vec2,
    /// Bounds of the shifted coordinates, always containing the unit square.
    pub bounds: UvBounds,
}

/// Convert a source texcoord into the internal convention (V negated).
pub fn internal_uv(source: Vec2) -> Vec2 {
    Vec2::new(source.x, -source.y)
}

/// Compute the tile offset and bounds for one face.
///
/// `texcoords` are source coordinates; V is negated internally. Returns
/// `None` for an empty slice.
pub fn face_extent(texcoords: &[Vec2]) -> Option<FaceExtent> {
    let first = internal_uv(*texcoords.first()?);
    let (min, max) = texcoords
        .iter()
        .map(|&t| internal_uv(t))
        .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));

    let offset = min.floor();
    let min = min - offset;
    let max = max - offset;

    let base = UvBounds::default();
    let bounds = UvBounds {
        min_u: (base.min_u as f32).min(min.x).floor() as i32,
        max_u: (base.max_u as f32).max(max.x).ceil() as i32,
        min_v: (base.min_v as f32).min(min.y).floor() as i32,
        max_v: (base.max_v as f32).max(max.y).ceil() as i32,
    };

    Some(FaceExtent { offset, bounds })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_face() {
        let ext = face_extent(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
        ])
        .unwrap();
        assert_eq!(ext.offset.x, 0.0);
        // V is negated: [-1, 0] floors to -1.
        assert_eq!(ext.offset.y, -1.0);
        assert_eq!(ext.bounds, UvBounds::default());
        assert_eq!(ext.bounds.copies_u(), 1);
        assert_eq!(ext.bounds.copies_v(), 1);
    }

    #[test]
    fn u_range_zero_to_two_needs_two_copies() {
        let ext = face_extent(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 1.0),
        ])
        .unwrap();
        assert_eq!(ext.offset.x, 0.0);
        assert_eq!(ext.bounds.copies_u(), 2);
        assert_eq!(ext.bounds.copies_v(), 1);
    }

    #[test]
    fn far_tile_is_shifted_home() {
        let ext = face_extent(&[
            Vec2::new(5.25, -3.5),
            Vec2::new(5.75, -3.25),
            Vec2::new(5.5, -3.75),
        ])
        .unwrap();
        assert_eq!(ext.offset, Vec2::new(5.0, 3.0));
        assert_eq!(ext.bounds, UvBounds::default());
    }

    #[test]
    fn straddling_face_widens_bounds() {
        // U spans 0.5..1.5 after the shift: one extra copy.
        let ext = face_extent(&[Vec2::new(3.5, 0.5), Vec2::new(4.5, 0.5)]).unwrap();
        assert_eq!(ext.offset.x, 3.0);
        assert_eq!(ext.bounds.min_u, 0);
        assert_eq!(ext.bounds.max_u, 2);
    }

    #[test]
    fn empty_face_has_no_extent() {
        assert!(face_extent(&[]).is_none());
    }

    #[test]
    fn bounds_union() {
        let a = UvBounds::default();
        let b = UvBounds {
            min_u: 0,
            max_u: 3,
            min_v: 0,
            max_v: 2,
        };
        let u = a.union(&b);
        assert_eq!(u.copies_u(), 3);
        assert_eq!(u.copies_v(), 2);
    }

    #[test]
    fn tile_offset_bounds() {
        assert_eq!(TileOffset::try_from(-128.0).unwrap().get(), -128);
        assert_eq!(TileOffset::try_from(127.0).unwrap().get(), 127);
        assert_eq!(TileOffset::try_from(128.0), Err(128.0));
        assert_eq!(TileOffset::try_from(1.5), Err(1.5));
    }

    #[test]
    fn face_offset_out_of_range_fails() {
        let err = FaceOffset::checked(4, Vec2::new(0.0, -300.0)).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::TileOffsetOutOfRange { face: 4, .. }
        ));

        let ok = FaceOffset::checked(0, Vec2::new(2.0, -1.0)).unwrap();
        assert_eq!(ok.as_vec2(), Vec2::new(2.0, -1.0));
    }
}
