//! Building blocks shared by the mbtiles2s3 crates: object keys, tile coordinates, JSON(P)
//! serialization, UTFGrid assembly, compression helpers and the terminal progress bar.

pub mod compression;

pub mod grid;

pub mod json;

pub mod progress;

pub mod types;
pub use types::*;
