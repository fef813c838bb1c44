//! Builder for small MBTiles fixtures used by the test suites.

use anyhow::{Context, Result};
use mbtiles2s3_core::Blob;
use r2d2_sqlite::rusqlite::{Connection, params, types::Value};
use std::path::Path;

type Row = (u8, u32, u32, Vec<u8>);

/// Collects metadata, tiles and grids in memory and writes them as a new MBTiles file.
///
/// Coordinates are written as given, without validation, so tests can produce broken rows.
#[derive(Clone, Debug)]
pub struct MBTilesBuilder {
	metadata: Vec<(String, Value)>,
	tiles: Vec<Row>,
	grids: Vec<Row>,
	grid_data: Vec<(u8, u32, u32, String, String)>,
	grid_tables: bool,
}

impl Default for MBTilesBuilder {
	fn default() -> Self {
		MBTilesBuilder {
			metadata: Vec::new(),
			tiles: Vec::new(),
			grids: Vec::new(),
			grid_data: Vec::new(),
			grid_tables: true,
		}
	}
}

impl MBTilesBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn metadata(mut self, name: &str, value: &str) -> Self {
		self.metadata.push((name.to_string(), Value::Text(value.to_string())));
		self
	}

	/// Adds a metadata entry of any SQLite type, e.g. an integer `minzoom`.
	pub fn metadata_value(mut self, name: &str, value: impl Into<Value>) -> Self {
		self.metadata.push((name.to_string(), value.into()));
		self
	}

	pub fn tile(mut self, level: u8, x: u32, y: u32, data: &[u8]) -> Self {
		self.tiles.push((level, x, y, data.to_vec()));
		self
	}

	/// Adds a grid tile; `compressed` is stored as is.
	pub fn grid(mut self, level: u8, x: u32, y: u32, compressed: &Blob) -> Self {
		self.grids.push((level, x, y, compressed.as_slice().to_vec()));
		self
	}

	pub fn grid_data(mut self, level: u8, x: u32, y: u32, key_name: &str, key_json: &str) -> Self {
		self.grid_data
			.push((level, x, y, key_name.to_string(), key_json.to_string()));
		self
	}

	/// Leaves out the `grids` and `grid_data` tables entirely.
	pub fn without_grid_tables(mut self) -> Self {
		self.grid_tables = false;
		self
	}

	/// Writes the database to `path`, replacing an existing file.
	pub fn write(&self, path: &Path) -> Result<()> {
		if path.exists() {
			std::fs::remove_file(path)?;
		}
		let mut conn = Connection::open(path).with_context(|| format!("creating {path:?}"))?;
		conn.execute_batch(
			"CREATE TABLE metadata (name TEXT, value);
			CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);",
		)?;
		if self.grid_tables {
			conn.execute_batch(
				"CREATE TABLE grids (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, grid BLOB);
				CREATE TABLE grid_data (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, key_name TEXT, key_json TEXT);",
			)?;
		}

		let transaction = conn.transaction()?;
		for (name, value) in &self.metadata {
			transaction.execute("INSERT INTO metadata (name, value) VALUES (?1, ?2)", params![name, value])?;
		}
		for (level, x, y, data) in &self.tiles {
			transaction.execute(
				"INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
				params![level, x, y, data],
			)?;
		}
		if self.grid_tables {
			for (level, x, y, grid) in &self.grids {
				transaction.execute(
					"INSERT INTO grids (zoom_level, tile_column, tile_row, grid) VALUES (?1, ?2, ?3, ?4)",
					params![level, x, y, grid],
				)?;
			}
			for (level, x, y, key_name, key_json) in &self.grid_data {
				transaction.execute(
					"INSERT INTO grid_data (zoom_level, tile_column, tile_row, key_name, key_json) VALUES (?1, ?2, ?3, ?4, ?5)",
					params![level, x, y, key_name, key_json],
				)?;
			}
		}
		transaction.commit()?;
		Ok(())
	}
}
