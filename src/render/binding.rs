//! Non-blocking texture binding with icon and placeholder fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::atlas::{AtlasAsset, SheetAssets};

use super::gpu::{BindToken, GpuBackend, TextureHandle};

/// Edge length of the placeholder texture.
pub const PLACEHOLDER_SIZE: u32 = 16;
/// Residency hint for the placeholder texture.
pub const PLACEHOLDER_LIFETIME: Duration = Duration::from_secs(6000);
const PLACEHOLDER_GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);

/// A GPU backend plus the shared placeholder texture bound while nothing
/// better is resident.
#[derive(Debug)]
pub struct RenderContext<B: GpuBackend> {
    backend: B,
    placeholder: TextureHandle,
}

impl<B: GpuBackend> RenderContext<B> {
    pub fn new(mut backend: B) -> Self {
        let asset = AtlasAsset {
            name: "placeholder".into(),
            path: PathBuf::new(),
            pixels: Some(RgbaImage::from_pixel(
                PLACEHOLDER_SIZE,
                PLACEHOLDER_SIZE,
                PLACEHOLDER_GREY,
            )),
            lifetime: PLACEHOLDER_LIFETIME,
            for_icon: false,
        };
        let placeholder = backend.create_texture(&asset);
        backend.try_upload(placeholder);
        Self {
            backend,
            placeholder,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn placeholder(&self) -> TextureHandle {
        self.placeholder
    }

    pub fn bind_placeholder(&mut self) -> BindToken {
        self.backend.try_upload(self.placeholder);
        self.backend.bind(self.placeholder, false)
    }

    /// Release the placeholder and hand back the backend.
    pub fn into_backend(mut self) -> B {
        self.backend.free_texture(self.placeholder);
        self.backend
    }
}

/// GPU textures for one sheet: the full atlas and its icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetTextures {
    pub atlas: TextureHandle,
    pub icon: TextureHandle,
}

impl SheetTextures {
    pub fn create<B: GpuBackend>(ctx: &mut RenderContext<B>, assets: &SheetAssets) -> Self {
        let atlas = ctx.backend.create_texture(&assets.atlas);
        let icon = ctx.backend.create_texture(&assets.icon);
        Self { atlas, icon }
    }

    /// Bind the full atlas if it is resident, otherwise the icon, otherwise
    /// the placeholder. Never blocks on an upload.
    pub fn bind<B: GpuBackend>(&self, ctx: &mut RenderContext<B>) -> BindToken {
        if !ctx.backend.is_loaded(self.atlas) {
            ctx.backend.try_upload(self.icon);
        }
        if ctx.backend.try_upload(self.atlas) {
            ctx.backend.bind(self.atlas, false)
        } else {
            debug!(atlas = ?self.atlas, "Atlas not resident, falling back to icon");
            self.bind_icon(ctx)
        }
    }

    /// Bind the icon if it is resident, otherwise the placeholder.
    pub fn bind_icon<B: GpuBackend>(&self, ctx: &mut RenderContext<B>) -> BindToken {
        if ctx.backend.try_upload(self.icon) {
            ctx.backend.bind(self.icon, true)
        } else {
            ctx.bind_placeholder()
        }
    }

    pub fn free<B: GpuBackend>(&self, ctx: &mut RenderContext<B>) {
        ctx.backend.free_texture(self.atlas);
        ctx.backend.free_texture(self.icon);
    }
}
