pub mod material;
pub mod model;

pub use material::{Material, darken_multiplicative, darken_subtractive, pack_argb};
pub use model::{Face, FacePoint, Group, Model};
