//! Texture sheet construction.
//!
//! A model's materials are gathered into [`SubTexture`]s (one per texture or
//! flat colour), shelf-packed, and composited into a single atlas image. The
//! result is cached on disk keyed by model location and prefix, guarded by a
//! content hash so a rebuild is skipped when nothing changed.

pub mod cache;
pub mod collector;
pub mod compose;
pub mod packer;
pub mod sheet;
pub mod sub_texture;
pub mod wrap;

pub use cache::{CacheEntry, CacheLookup, cache_key};
pub use collector::{Collection, HashingReader, collect, flat_key};
pub use compose::{CompositeStats, composite, make_icon};
pub use packer::{Placement, ShelfLayout, pack, shelf_pack};
pub use sheet::{AtlasAsset, SheetAssets, SheetState, TextureSheet};
pub use sub_texture::{SWATCH_SIZE, SubTexture, SubTextureKind};
pub use wrap::{FaceOffset, TileOffset, UvBounds};
