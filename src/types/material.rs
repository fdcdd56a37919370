use crate::resource::Identifier;

/// A surface material as referenced by model faces.
///
/// Textured and flat-colour materials are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Diffuse texture, tinted by `diffuse` at draw time.
    Textured {
        texture: Identifier,
        /// Diffuse colour `[r, g, b, a]`, white when the source has none.
        diffuse: [f32; 4],
    },
    /// Uniform colour rendered from a generated swatch.
    FlatColor {
        color: [f32; 4],
        /// Overrides the model-wide darken factor for this material.
        darken: Option<f32>,
    },
}

impl Material {
    pub fn textured(texture: impl Into<Identifier>) -> Self {
        Material::Textured {
            texture: texture.into(),
            diffuse: [1.0, 1.0, 1.0, 1.0],
        }
    }

    pub fn flat(color: [f32; 4]) -> Self {
        Material::FlatColor {
            color,
            darken: None,
        }
    }

    /// Texture identifier for textured materials.
    pub fn texture(&self) -> Option<&Identifier> {
        match self {
            Material::Textured { texture, .. } => Some(texture),
            Material::FlatColor { .. } => None,
        }
    }

    /// Nominal diffuse colour used for draw-time tinting.
    pub fn diffuse(&self) -> [f32; 4] {
        match self {
            Material::Textured { diffuse, .. } => *diffuse,
            Material::FlatColor { color, .. } => *color,
        }
    }
}

/// Darken used when synthesising flat-colour swatches.
///
/// Each colour channel becomes `max(0, c - darken)`; alpha is kept. Returns
/// 8-bit RGBA.
pub fn darken_subtractive(color: [f32; 4], darken: f32) -> [u8; 4] {
    let channel = |c: f32| ((c - darken).clamp(0.0, 1.0) * 255.0) as u8;
    [
        channel(color[0]),
        channel(color[1]),
        channel(color[2]),
        (color[3].clamp(0.0, 1.0) * 255.0) as u8,
    ]
}

/// Darken used when tinting faces at draw time.
///
/// Each colour channel becomes `max(0, c * (1 - 5 * darken))`. This is not
/// the same curve as [`darken_subtractive`]; both are kept as they are.
pub fn darken_multiplicative(rgb: [f32; 3], darken: f32) -> [f32; 3] {
    let mult = 1.0 - darken * 5.0;
    rgb.map(|c| (c * mult).max(0.0))
}

/// Pack 8-bit RGBA into a single `0xAARRGGBB` integer.
pub fn pack_argb(rgba: [u8; 4]) -> u32 {
    let [r, g, b, a] = rgba.map(u32::from);
    (a << 24) | (r << 16) | (g << 8) | b
}
