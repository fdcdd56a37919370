pub mod atlas;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod resource;
pub mod types;

pub use atlas::TextureSheet;
pub use config::{AtlasConfig, BakeConfig};
pub use error::{AtlasError, Result};
pub use pipeline::Pipeline;
pub use render::ModelRenderer;
pub use report::{BuildReport, BuildWarning};
