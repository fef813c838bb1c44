//! Export an MBTiles file into an S3 bucket, one object per tile.
//!
//! The export writes the following objects, all below an optional path prefix:
//!
//! | key | content |
//! |---|---|
//! | `{tileset}.json` | metadata as JSON (or JSONP) |
//! | `{tileset}/metadata.json` | the same metadata |
//! | `{tileset}/{z}/{x}/{y}.png` | image tiles |
//! | `{tileset}/{z}/{x}/{y}.grid.json` | UTFGrid tiles with their feature data |
//! | `{tileset}.mbtiles` | the MBTiles file itself |
//!
//! Build an [`ExportOptions`](config::ExportOptions), pick a bucket backend and hand both to an
//! [`Exporter`](export::Exporter).

pub mod config;
pub mod export;
