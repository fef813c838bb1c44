//! `SQLite` file `*.mbtiles` as export source
//!
//! - `MBTilesStore`: read-only handle with row-by-row access to `tiles`, `grids` and `grid_data`.
//! - `ImageTileRow` / `GridTileRow`: the rows handed to the scan callbacks.

mod rows;
mod store;

pub use rows::{GridTileRow, ImageTileRow};
pub use store::MBTilesStore;
