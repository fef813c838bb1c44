use anyhow::{Context, Result};
use mbtiles2s3_core::{Blob, TileCoord, grid::GridOverlay};
use r2d2_sqlite::rusqlite::{Row, Statement, params};

/// One row of the `tiles` table.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageTileRow {
	pub coord: TileCoord,
	pub data: Blob,
}

impl ImageTileRow {
	pub(super) fn from_row(row: &Row) -> Result<ImageTileRow> {
		let coord = TileCoord::from_row(row.get(0)?, row.get(1)?, row.get(2)?)?;
		let data: Vec<u8> = row
			.get(3)
			.with_context(|| format!("reading tile_data of {coord:?}"))?;
		Ok(ImageTileRow {
			coord,
			data: Blob::from(data),
		})
	}
}

/// One row of the `grids` table, together with its feature data from `grid_data`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridTileRow {
	pub coord: TileCoord,
	pub grid: Blob,
	pub overlay: GridOverlay,
}

impl GridTileRow {
	pub(super) fn from_row(row: &Row, overlay_stmt: Option<&mut Statement>) -> Result<GridTileRow> {
		let coord = TileCoord::from_row(row.get(0)?, row.get(1)?, row.get(2)?)?;
		let grid: Vec<u8> = row.get(3).with_context(|| format!("reading grid of {coord:?}"))?;
		let overlay = match overlay_stmt {
			Some(stmt) => query_overlay(stmt, &coord)?,
			None => GridOverlay::new(),
		};
		Ok(GridTileRow {
			coord,
			grid: Blob::from(grid),
			overlay,
		})
	}
}

/// Runs the prepared `grid_data` statement for one tile and parses every `key_json`.
pub(super) fn query_overlay(stmt: &mut Statement, coord: &TileCoord) -> Result<GridOverlay> {
	let mut overlay = GridOverlay::new();
	let mut rows = stmt.query(params![coord.level, coord.x, coord.y])?;
	while let Some(row) = rows.next()? {
		let name: String = row.get(0)?;
		let json: String = row.get(1)?;
		let value = serde_json::from_str(&json)
			.with_context(|| format!("invalid key_json for key '{name}' of {coord:?}"))?;
		overlay.insert(name, value);
	}
	Ok(overlay)
}
