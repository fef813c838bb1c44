//! Read access to MBTiles files for the export pipeline.
//!
//! [`MBTilesStore`] opens an MBTiles (SQLite) file read-only and hands out its metadata, image
//! tiles and UTFGrid tiles row by row, so stores with millions of tiles never have to fit into
//! memory.
//!
//! # Features
//! - `test`: exposes [`testing::MBTilesBuilder`] to write small fixture stores.

pub mod mbtiles;
pub use mbtiles::*;

#[cfg(any(test, feature = "test"))]
pub mod testing;
