mod blob;
mod image_format;
mod object_key;
mod tile_coord;

pub use blob::Blob;
pub use image_format::ImageFormat;
pub use object_key::{KeyBuilder, ObjectKind, PathPrefix};
pub use tile_coord::TileCoord;
