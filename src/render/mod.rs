//! GPU-facing side of a baked model: vertex buffer assembly, the backend
//! trait, and non-blocking texture binding.

pub mod binding;
pub mod gpu;
pub mod renderer;
pub mod vertex_buffer;

pub use binding::{PLACEHOLDER_LIFETIME, PLACEHOLDER_SIZE, RenderContext, SheetTextures};
pub use gpu::{BindToken, BufferHandle, GpuBackend, HeadlessBackend, HeadlessStats, TextureHandle};
pub use renderer::ModelRenderer;
pub use vertex_buffer::{GroupRange, ParticleFilter, VertexBuffer, VertexRecord, assemble};
