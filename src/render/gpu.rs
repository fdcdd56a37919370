//! GPU primitives the renderer is written against, plus a headless
//! implementation for the CLI and tests.

use std::collections::HashMap;
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::atlas::AtlasAsset;

use super::vertex_buffer::{GroupRange, VertexBuffer};

/// Handle to a texture owned by a [`GpuBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Handle to an uploaded vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Proof that a texture was bound, returned so callers can tell which
/// texture in the fallback chain ended up active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindToken {
    pub handle: TextureHandle,
    pub for_icon: bool,
}

/// The GPU operations needed to upload, bind and draw a baked model.
///
/// Uploads are non-blocking: `try_upload` may return `false` several times
/// before a texture becomes resident.
pub trait GpuBackend {
    /// Largest texture edge the device accepts.
    fn max_texture_size(&self) -> u32;

    /// Register a texture from in-memory pixels or a deferred file path.
    fn create_texture(&mut self, asset: &AtlasAsset) -> TextureHandle;

    /// Advance the upload of a texture; `true` once it is resident.
    fn try_upload(&mut self, handle: TextureHandle) -> bool;

    fn is_loaded(&self, handle: TextureHandle) -> bool;

    fn bind(&mut self, handle: TextureHandle, for_icon: bool) -> BindToken;

    fn free_texture(&mut self, handle: TextureHandle);

    fn create_vertex_buffer(&mut self, buffer: &VertexBuffer) -> BufferHandle;

    fn draw(&mut self, buffer: BufferHandle, ranges: &[GroupRange]);

    fn free_vertex_buffer(&mut self, buffer: BufferHandle);
}

#[derive(Debug)]
struct HeadlessTexture {
    asset: AtlasAsset,
    pending_polls: u32,
    resident: Option<RgbaImage>,
}

#[derive(Debug)]
struct HeadlessBuffer {
    bytes: usize,
    vertices: usize,
}

/// Counters kept by [`HeadlessBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub textures_created: u32,
    pub textures_uploaded: u32,
    pub textures_freed: u32,
    pub binds: u32,
    pub buffers_created: u32,
    pub buffers_freed: u32,
    pub draws: u32,
    pub vertices_drawn: u64,
}

/// In-memory backend: textures are decoded into RAM and draws are counted.
///
/// `upload_delay` makes every texture report "not ready" for that many
/// `try_upload` calls, to exercise the non-blocking fallback path.
#[derive(Debug)]
pub struct HeadlessBackend {
    max_texture_size: u32,
    upload_delay: u32,
    next_id: u32,
    textures: HashMap<TextureHandle, HeadlessTexture>,
    buffers: HashMap<BufferHandle, HeadlessBuffer>,
    last_bound: Option<BindToken>,
    stats: HeadlessStats,
}

impl HeadlessBackend {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            upload_delay: 0,
            next_id: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            last_bound: None,
            stats: HeadlessStats::default(),
        }
    }

    pub fn with_upload_delay(mut self, polls: u32) -> Self {
        self.upload_delay = polls;
        self
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    pub fn last_bound(&self) -> Option<BindToken> {
        self.last_bound
    }

    /// Pixels of a resident texture.
    pub fn texture_pixels(&self, handle: TextureHandle) -> Option<&RgbaImage> {
        self.textures.get(&handle)?.resident.as_ref()
    }

    /// Residency hint the texture was created with.
    pub fn texture_lifetime(&self, handle: TextureHandle) -> Option<Duration> {
        self.textures.get(&handle).map(|t| t.asset.lifetime)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_vertex_count(&self, buffer: BufferHandle) -> Option<usize> {
        self.buffers.get(&buffer).map(|b| b.vertices)
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GpuBackend for HeadlessBackend {
    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn create_texture(&mut self, asset: &AtlasAsset) -> TextureHandle {
        let handle = TextureHandle(self.next_id());
        debug!(?handle, name = %asset.name, deferred = asset.pixels.is_none(), "Created texture");
        self.textures.insert(
            handle,
            HeadlessTexture {
                asset: asset.clone(),
                pending_polls: self.upload_delay,
                resident: None,
            },
        );
        self.stats.textures_created += 1;
        handle
    }

    fn try_upload(&mut self, handle: TextureHandle) -> bool {
        let Some(tex) = self.textures.get_mut(&handle) else {
            return false;
        };
        if tex.resident.is_some() {
            return true;
        }
        if tex.pending_polls > 0 {
            tex.pending_polls -= 1;
            return false;
        }

        let pixels = match &tex.asset.pixels {
            Some(pixels) => pixels.clone(),
            None => match image::open(&tex.asset.path) {
                Ok(img) => img.to_rgba8(),
                Err(e) => {
                    warn!(path = %tex.asset.path.display(), "Failed to load deferred texture: {e}");
                    return false;
                }
            },
        };
        debug!(?handle, width = pixels.width(), height = pixels.height(), "Uploaded texture");
        tex.resident = Some(pixels);
        self.stats.textures_uploaded += 1;
        true
    }

    fn is_loaded(&self, handle: TextureHandle) -> bool {
        self.textures
            .get(&handle)
            .is_some_and(|t| t.resident.is_some())
    }

    fn bind(&mut self, handle: TextureHandle, for_icon: bool) -> BindToken {
        let token = BindToken { handle, for_icon };
        self.last_bound = Some(token);
        self.stats.binds += 1;
        token
    }

    fn free_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_some() {
            self.stats.textures_freed += 1;
        }
    }

    fn create_vertex_buffer(&mut self, buffer: &VertexBuffer) -> BufferHandle {
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(
            handle,
            HeadlessBuffer {
                bytes: buffer.as_bytes().len(),
                vertices: buffer.vertex_count(),
            },
        );
        self.stats.buffers_created += 1;
        debug!(?handle, vertices = buffer.vertex_count(), "Created vertex buffer");
        handle
    }

    fn draw(&mut self, buffer: BufferHandle, ranges: &[GroupRange]) {
        let Some(buf) = self.buffers.get(&buffer) else {
            warn!(?buffer, "Draw with unknown vertex buffer");
            return;
        };
        let vertices: u64 = ranges.iter().map(|r| u64::from(r.vertex_count)).sum();
        debug!(?buffer, bytes = buf.bytes, groups = ranges.len(), vertices, "Draw");
        self.stats.draws += 1;
        self.stats.vertices_drawn += vertices;
    }

    fn free_vertex_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            self.stats.buffers_freed += 1;
        }
    }
}
