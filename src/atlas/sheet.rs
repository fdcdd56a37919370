use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use glam::Vec2;
use image::RgbaImage;
use tracing::{debug, info};

use crate::config::AtlasConfig;
use crate::error::Result;
use crate::report::BuildReport;
use crate::resource::ResourceResolver;
use crate::types::Model;

use super::cache::CacheEntry;
use super::collector;
use super::compose::{self, CompositeStats};
use super::packer;
use super::sub_texture::SubTexture;
use super::wrap::FaceOffset;

/// Lifecycle of a [`TextureSheet`] during its build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetState {
    Uninitialized,
    Packed,
    CacheHit,
    Composed,
    Ready,
}

impl SheetState {
    fn can_advance_to(self, next: SheetState) -> bool {
        use SheetState::*;
        matches!(
            (self, next),
            (Uninitialized, Packed)
                | (Packed, CacheHit)
                | (Packed, Composed)
                | (CacheHit, Ready)
                | (Composed, Ready)
        )
    }
}

/// An image handed to the GPU layer: either pixels in memory or a cache
/// file to load when the upload happens.
#[derive(Debug, Clone)]
pub struct AtlasAsset {
    pub name: String,
    pub path: PathBuf,
    pub pixels: Option<RgbaImage>,
    /// How long the GPU layer should keep the texture resident when unused.
    pub lifetime: Duration,
    pub for_icon: bool,
}

/// The full atlas and its icon.
#[derive(Debug, Clone)]
pub struct SheetAssets {
    pub atlas: AtlasAsset,
    pub icon: AtlasAsset,
}

/// All textures of one model and prefix, packed into a single atlas.
#[derive(Debug)]
pub struct TextureSheet {
    prefix: Option<String>,
    sub_textures: Vec<SubTexture>,
    index: HashMap<String, usize>,
    materials: HashMap<String, String>,
    face_offsets: Vec<FaceOffset>,
    width: u32,
    height: u32,
    hash: u64,
    state: SheetState,
    cached: bool,
    cache: CacheEntry,
    stats: CompositeStats,
    assets: Option<SheetAssets>,
}

impl TextureSheet {
    /// Collect, pack and compose (or load from cache) the atlas for
    /// `model` with the given texture prefix.
    pub fn build(
        model: &Model,
        prefix: Option<&str>,
        resolver: &dyn ResourceResolver,
        max_texture_size: u32,
        config: &AtlasConfig,
        report: &mut BuildReport,
    ) -> Result<Self> {
        let collection = collector::collect(model, prefix, resolver, report)?;
        let cache = CacheEntry::new(&config.cache_dir, &model.location, prefix);

        let mut sheet = TextureSheet {
            prefix: prefix.map(str::to_string),
            sub_textures: collection.sub_textures,
            index: collection.index,
            materials: collection.materials,
            face_offsets: collection.face_offsets,
            width: 1,
            height: 1,
            hash: collection.hash,
            state: SheetState::Uninitialized,
            cached: false,
            cache,
            stats: CompositeStats::default(),
            assets: None,
        };

        let (width, height) = packer::pack(&mut sheet.sub_textures, max_texture_size, report);
        sheet.width = width;
        sheet.height = height;
        sheet.advance(SheetState::Packed);

        let atlas_path = sheet.cache.atlas_path();
        let icon_path = sheet.cache.icon_path();
        let (atlas_pixels, icon_pixels) = if sheet.cache.validate(sheet.hash, report) {
            for st in &mut sheet.sub_textures {
                st.take_pixels();
            }
            sheet.cached = true;
            sheet.advance(SheetState::CacheHit);
            (None, None)
        } else {
            let (image, stats) =
                compose::composite(&mut sheet.sub_textures, width, height, report);
            sheet.stats = stats;
            let icon = compose::make_icon(&image, config.icon_threshold);
            sheet.cache.store(&image, icon.as_ref(), sheet.hash, report);
            sheet.advance(SheetState::Composed);
            let icon = icon.unwrap_or_else(|| image.clone());
            (Some(image), Some(icon))
        };

        sheet.assets = Some(SheetAssets {
            atlas: AtlasAsset {
                name: sheet.cache.key().to_string(),
                path: atlas_path,
                pixels: atlas_pixels,
                lifetime: config.atlas_lifetime(),
                for_icon: false,
            },
            icon: AtlasAsset {
                name: format!("{}_icon", sheet.cache.key()),
                path: icon_path,
                pixels: icon_pixels,
                lifetime: config.icon_lifetime(),
                for_icon: true,
            },
        });
        sheet.advance(SheetState::Ready);

        info!(
            key = sheet.cache.key(),
            width,
            height,
            sub_textures = sheet.sub_textures.len(),
            cached = sheet.cached,
            "Texture sheet ready"
        );
        Ok(sheet)
    }

    fn advance(&mut self, next: SheetState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid sheet transition {:?} -> {next:?}",
            self.state
        );
        debug!(from = ?self.state, to = ?next, "Sheet state");
        self.state = next;
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Model hash plus the content of every collected SubTexture.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn state(&self) -> SheetState {
        self.state
    }

    /// Whether the atlas came from the disk cache.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn cache_entry(&self) -> &CacheEntry {
        &self.cache
    }

    pub fn composite_stats(&self) -> CompositeStats {
        self.stats
    }

    pub fn sub_textures(&self) -> &[SubTexture] {
        &self.sub_textures
    }

    pub fn sub_texture(&self, key: &str) -> Option<&SubTexture> {
        self.index.get(key).map(|&i| &self.sub_textures[i])
    }

    /// SubTexture a material resolved to, if it made it into the sheet.
    pub fn material_sub_texture(&self, material: &str) -> Option<&SubTexture> {
        self.materials.get(material).and_then(|key| self.sub_texture(key))
    }

    pub fn face_offset(&self, face: usize) -> FaceOffset {
        self.face_offsets.get(face).copied().unwrap_or_default()
    }

    /// Whether a material is drawn from single-colour content.
    pub fn is_flat_material(&self, material: &str) -> bool {
        self.material_sub_texture(material)
            .is_some_and(SubTexture::is_flat)
    }

    /// Map a material-local, tile-shifted UV into atlas space.
    ///
    /// Returns `None` for materials that are not in the sheet.
    pub fn map_uv(&self, material: &str, uv: Vec2) -> Option<Vec2> {
        self.material_sub_texture(material)
            .map(|st| st.map_uv(uv, self.width, self.height))
    }

    /// Move the atlas and icon out for upload. Returns `None` once taken.
    pub fn take_assets(&mut self) -> Option<SheetAssets> {
        self.assets.take()
    }
}
