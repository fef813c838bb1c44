//! Read-only access to an MBTiles (SQLite) database.
//!
//! `MBTilesStore` never loads whole tables. The scan methods step through a query and hand one
//! row at a time to a callback; the callback decides whether to continue by returning
//! [`ControlFlow`]. Errors inside a single row (bad coordinates, a `NULL` blob, unparsable
//! `key_json`) are passed to the callback as `Err` so the caller can count them, while errors
//! of the query itself end the scan.
//!
//! ## Usage
//! ```rust,no_run
//! use mbtiles2s3_container::MBTilesStore;
//! use std::{ops::ControlFlow, path::Path};
//!
//! let store = MBTilesStore::open(Path::new("world.mbtiles")).unwrap();
//! println!("{} image tiles", store.count_image_tiles().unwrap());
//! store
//! 	.for_each_image_tile(|row| {
//! 		println!("{:?}", row.map(|r| r.coord));
//! 		ControlFlow::Continue(())
//! 	})
//! 	.unwrap();
//! ```

use super::rows::{GridTileRow, ImageTileRow, query_overlay};
use anyhow::{Context, Result, ensure};
use mbtiles2s3_core::{ImageFormat, TileCoord, grid::GridOverlay};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::{
	SqliteConnectionManager,
	rusqlite::{Connection, OpenFlags, OptionalExtension, types::Value as SqlValue},
};
use serde_json::Value;
use std::{
	collections::BTreeMap,
	ops::ControlFlow,
	path::{Path, PathBuf},
	time::Duration,
};

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

const SQL_OVERLAY: &str =
	"SELECT key_name, key_json FROM grid_data WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3";

/// Read-only handle on an MBTiles file.
pub struct MBTilesStore {
	path: PathBuf,
	pool: Pool<SqliteConnectionManager>,
}

impl MBTilesStore {
	/// Opens the database read-only and checks that it is a readable SQLite file.
	///
	/// # Errors
	/// Returns an error if the file does not exist or is not a SQLite database.
	pub fn open(path: &Path) -> Result<MBTilesStore> {
		log::debug!("open {path:?}");

		ensure!(path.exists(), "file {path:?} does not exist");
		ensure!(path.is_file(), "{path:?} is not a file");

		let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

		// sqlite opens lazily; the first statement tells whether this really is a database.
		// Checked on a single connection, a pool would keep retrying until its timeout.
		Connection::open_with_flags(path, flags)
			.and_then(|conn| conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0)))
			.with_context(|| format!("{path:?} is not a valid SQLite database"))?;

		let manager = SqliteConnectionManager::file(path).with_flags(flags);
		let pool = Pool::builder()
			.max_size(4)
			.connection_timeout(CONNECTION_TIMEOUT)
			.build(manager)
			.with_context(|| format!("opening SQLite database {path:?}"))?;

		let store = MBTilesStore {
			path: path.to_path_buf(),
			pool,
		};
		ensure!(store.has_table("metadata")?, "{path:?} has no metadata table");

		Ok(store)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Size of the file on disk in bytes.
	pub fn file_size(&self) -> Result<u64> {
		Ok(std::fs::metadata(&self.path)
			.with_context(|| format!("reading size of {:?}", self.path))?
			.len())
	}

	fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
		self.pool.get().context("getting SQLite connection from pool")
	}

	fn has_table(&self, name: &str) -> Result<bool> {
		let found = self
			.connection()?
			.query_row(
				"SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
				[name],
				|_| Ok(()),
			)
			.optional()?;
		Ok(found.is_some())
	}

	/// Reads the whole `metadata` table.
	///
	/// Text values become JSON strings and numbers stay numbers. Rows with a `NULL` name or
	/// value are skipped. If a name appears twice, the later row wins.
	pub fn read_metadata(&self) -> Result<BTreeMap<String, Value>> {
		log::debug!("read metadata of {:?}", self.path);

		let conn = self.connection()?;
		let mut stmt = conn
			.prepare("SELECT name, value FROM metadata")
			.context("querying metadata table")?;
		let entries = stmt.query_map([], |row| Ok((row.get::<_, SqlValue>(0)?, row.get::<_, SqlValue>(1)?)))?;

		let mut metadata = BTreeMap::new();
		for entry in entries {
			let (name, value) = entry.context("reading metadata row")?;
			let name = match name {
				SqlValue::Text(name) => name,
				SqlValue::Integer(name) => name.to_string(),
				other => {
					log::warn!("skipping metadata entry with name {other:?}");
					continue;
				}
			};
			match json_value(value) {
				Some(value) => {
					metadata.insert(name, value);
				}
				None => log::warn!("skipping metadata entry '{name}' with NULL or unreadable value"),
			}
		}
		Ok(metadata)
	}

	/// The tile image format declared by the `format` metadata entry, `PNG` if absent.
	pub fn image_format(&self) -> Result<ImageFormat> {
		let metadata = self.read_metadata()?;
		Ok(match metadata.get("format") {
			None => ImageFormat::default(),
			Some(value) => value.as_str().and_then(ImageFormat::from_metadata).unwrap_or_else(|| {
				log::warn!("unknown tile format {value}, assuming {}", ImageFormat::default());
				ImageFormat::default()
			}),
		})
	}

	pub fn count_image_tiles(&self) -> Result<u64> {
		let count: i64 = self
			.connection()?
			.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0))
			.context("counting rows of the tiles table")?;
		Ok(count.max(0) as u64)
	}

	/// Number of grid tiles, `0` if the store carries no `grids` table or it cannot be read.
	pub fn count_grid_tiles(&self) -> u64 {
		let count = self.has_table("grids").and_then(|exists| {
			if !exists {
				return Ok(0);
			}
			let count: i64 = self
				.connection()?
				.query_row("SELECT COUNT(*) FROM grids", [], |row| row.get(0))?;
			Ok(count)
		});
		match count {
			Ok(count) => count.max(0) as u64,
			Err(error) => {
				log::warn!("cannot count grid tiles, treating store as grid-less: {error:#}");
				0
			}
		}
	}

	/// Calls `callback` for every row of the `tiles` table until it returns `Break`.
	pub fn for_each_image_tile<F>(&self, mut callback: F) -> Result<()>
	where
		F: FnMut(Result<ImageTileRow>) -> ControlFlow<()>,
	{
		log::debug!("scan image tiles of {:?}", self.path);

		let conn = self.connection()?;
		let mut stmt = conn
			.prepare("SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles")
			.context("querying tiles table")?;
		let mut rows = stmt.query([])?;
		while let Some(row) = rows.next().context("stepping through tiles table")? {
			if callback(ImageTileRow::from_row(row)).is_break() {
				break;
			}
		}
		Ok(())
	}

	/// Calls `callback` for every row of the `grids` table until it returns `Break`.
	///
	/// Each row arrives with the feature data of its coordinates from `grid_data`. Does nothing
	/// if there is no `grids` table.
	pub fn for_each_grid_tile<F>(&self, mut callback: F) -> Result<()>
	where
		F: FnMut(Result<GridTileRow>) -> ControlFlow<()>,
	{
		if !self.has_table("grids")? {
			log::debug!("{:?} has no grids table", self.path);
			return Ok(());
		}
		log::debug!("scan grid tiles of {:?}", self.path);

		let has_grid_data = self.has_table("grid_data")?;
		let conn = self.connection()?;
		let mut stmt = conn
			.prepare("SELECT zoom_level, tile_column, tile_row, grid FROM grids")
			.context("querying grids table")?;
		let mut overlay_stmt = if has_grid_data {
			Some(conn.prepare(SQL_OVERLAY).context("querying grid_data table")?)
		} else {
			None
		};

		let mut rows = stmt.query([])?;
		while let Some(row) = rows.next().context("stepping through grids table")? {
			if callback(GridTileRow::from_row(row, overlay_stmt.as_mut())).is_break() {
				break;
			}
		}
		Ok(())
	}

	/// Feature data of the grid tile at `coord`; empty if there is none.
	pub fn read_grid_overlay(&self, coord: &TileCoord) -> Result<GridOverlay> {
		if !self.has_table("grid_data")? {
			return Ok(GridOverlay::new());
		}
		let conn = self.connection()?;
		let mut stmt = conn.prepare(SQL_OVERLAY)?;
		query_overlay(&mut stmt, coord)
	}
}

fn json_value(value: SqlValue) -> Option<Value> {
	match value {
		SqlValue::Null => None,
		SqlValue::Integer(number) => Some(Value::from(number)),
		SqlValue::Real(number) => serde_json::Number::from_f64(number).map(Value::Number),
		SqlValue::Text(text) => Some(Value::String(text)),
		SqlValue::Blob(bytes) => String::from_utf8(bytes).ok().map(Value::String),
	}
}

impl std::fmt::Debug for MBTilesStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MBTilesStore").field("path", &self.path).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::MBTilesBuilder;
	use mbtiles2s3_core::{Blob, compression::compress_zlib};
	use pretty_assertions::assert_eq;
	use serde_json::json;
	use tempfile::TempDir;

	fn world(dir: &TempDir) -> Result<PathBuf> {
		let path = dir.path().join("world.mbtiles");
		MBTilesBuilder::new()
			.metadata("name", "World")
			.metadata("format", "png")
			.tile(0, 0, 0, b"root tile")
			.tile(1, 0, 0, b"a")
			.tile(1, 1, 1, b"b")
			.grid(1, 0, 0, &compress_zlib(&Blob::from(r#"{"grid":["!"],"keys":["","7"]}"#))?)
			.grid_data(1, 0, 0, "7", r#"{"NAME":"Minnesota"}"#)
			.write(&path)?;
		Ok(path)
	}

	#[test]
	fn open_and_read_metadata() -> Result<()> {
		let dir = TempDir::new()?;
		let store = MBTilesStore::open(&world(&dir)?)?;

		let metadata = store.read_metadata()?;
		assert_eq!(metadata.get("name"), Some(&json!("World")));
		assert_eq!(store.image_format()?, ImageFormat::PNG);
		assert_eq!(store.count_image_tiles()?, 3);
		assert_eq!(store.count_grid_tiles(), 1);
		assert!(store.file_size()? > 0);
		Ok(())
	}

	#[test]
	fn metadata_keeps_numbers_and_skips_nulls() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("untyped.mbtiles");
		let conn = Connection::open(&path)?;
		conn.execute_batch(
			"CREATE TABLE metadata (name, value);
			CREATE TABLE tiles (zoom_level, tile_column, tile_row, tile_data);
			INSERT INTO metadata VALUES ('name', 'World');
			INSERT INTO metadata VALUES ('minzoom', 0);
			INSERT INTO metadata VALUES ('maxzoom', 12);
			INSERT INTO metadata VALUES ('center_lat', 44.5);
			INSERT INTO metadata VALUES ('attribution', NULL);
			INSERT INTO metadata VALUES (NULL, 'orphan');",
		)?;
		drop(conn);

		let metadata = MBTilesStore::open(&path)?.read_metadata()?;
		assert_eq!(
			metadata,
			BTreeMap::from([
				("center_lat".to_string(), json!(44.5)),
				("maxzoom".to_string(), json!(12)),
				("minzoom".to_string(), json!(0)),
				("name".to_string(), json!("World")),
			])
		);
		Ok(())
	}

	#[test]
	fn numeric_format_falls_back_to_png() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("numeric.mbtiles");
		MBTilesBuilder::new().metadata_value("format", 7).write(&path)?;
		assert_eq!(MBTilesStore::open(&path)?.image_format()?, ImageFormat::PNG);
		Ok(())
	}

	#[test]
	fn open_missing_file_fails() {
		let error = MBTilesStore::open(Path::new("/does/not/exist.mbtiles")).unwrap_err();
		assert!(error.to_string().contains("does not exist"), "{error}");
	}

	#[test]
	fn open_non_database_fails() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("garbage.mbtiles");
		std::fs::write(&path, "this is definitely not a sqlite file, just some text padding it out")?;
		let start = std::time::Instant::now();
		let error = MBTilesStore::open(&path).unwrap_err();
		assert!(error.to_string().contains("not a valid SQLite database"), "{error}");
		assert!(start.elapsed() < CONNECTION_TIMEOUT, "took {:?}", start.elapsed());
		Ok(())
	}

	#[test]
	fn open_database_without_metadata_fails() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("empty.sqlite");
		r2d2_sqlite::rusqlite::Connection::open(&path)?.execute_batch("CREATE TABLE other (id INTEGER);")?;
		let error = MBTilesStore::open(&path).unwrap_err();
		assert!(error.to_string().contains("no metadata table"), "{error}");
		Ok(())
	}

	#[test]
	fn image_tiles_are_streamed() -> Result<()> {
		let dir = TempDir::new()?;
		let store = MBTilesStore::open(&world(&dir)?)?;

		let mut rows = Vec::new();
		store.for_each_image_tile(|row| {
			rows.push(row.unwrap());
			ControlFlow::Continue(())
		})?;
		rows.sort_by_key(|row| (row.coord.level, row.coord.x, row.coord.y));

		let coords: Vec<_> = rows.iter().map(|row| (row.coord.level, row.coord.x, row.coord.y)).collect();
		assert_eq!(coords, vec![(0, 0, 0), (1, 0, 0), (1, 1, 1)]);
		assert_eq!(rows[0].data, Blob::from("root tile"));
		Ok(())
	}

	#[test]
	fn break_stops_the_scan() -> Result<()> {
		let dir = TempDir::new()?;
		let store = MBTilesStore::open(&world(&dir)?)?;

		let mut seen = 0;
		store.for_each_image_tile(|_| {
			seen += 1;
			ControlFlow::Break(())
		})?;
		assert_eq!(seen, 1);
		Ok(())
	}

	#[test]
	fn bad_row_is_reported_per_item() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("bad.mbtiles");
		MBTilesBuilder::new()
			.tile(0, 0, 0, b"fine")
			.tile(1, 5, 0, b"outside of level 1")
			.write(&path)?;
		Connection::open(&path)?.execute_batch(
			"INSERT INTO tiles VALUES (1, -1, 0, x'00');
			INSERT INTO tiles VALUES (2, 0, 0, NULL);",
		)?;
		let store = MBTilesStore::open(&path)?;

		let (mut ok, mut failed) = (Vec::new(), 0);
		store.for_each_image_tile(|row| {
			match row {
				Ok(row) => ok.push((row.coord.level, row.coord.x, row.coord.y)),
				Err(_) => failed += 1,
			}
			ControlFlow::Continue(())
		})?;
		ok.sort_unstable();
		assert_eq!(ok, vec![(0, 0, 0), (1, 5, 0)]);
		assert_eq!(failed, 2);
		Ok(())
	}

	#[test]
	fn grid_tiles_carry_their_overlay() -> Result<()> {
		let dir = TempDir::new()?;
		let store = MBTilesStore::open(&world(&dir)?)?;

		let mut rows = Vec::new();
		store.for_each_grid_tile(|row| {
			rows.push(row.unwrap());
			ControlFlow::Continue(())
		})?;

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].coord, TileCoord::new(1, 0, 0)?);
		assert_eq!(
			rows[0].overlay,
			GridOverlay::from([("7".to_string(), json!({"NAME": "Minnesota"}))])
		);
		assert_eq!(store.read_grid_overlay(&TileCoord::new(1, 0, 0)?)?, rows[0].overlay);
		assert!(store.read_grid_overlay(&TileCoord::new(0, 0, 0)?)?.is_empty());
		Ok(())
	}

	#[test]
	fn invalid_key_json_fails_only_that_grid() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("grids.mbtiles");
		let grid = compress_zlib(&Blob::from(r#"{"grid":[" "],"keys":[""]}"#))?;
		MBTilesBuilder::new()
			.grid(0, 0, 0, &grid)
			.grid(1, 0, 0, &grid)
			.grid_data(1, 0, 0, "1", "{broken")
			.write(&path)?;
		let store = MBTilesStore::open(&path)?;

		let mut results = Vec::new();
		store.for_each_grid_tile(|row| {
			results.push(row.map(|r| r.coord.level));
			ControlFlow::Continue(())
		})?;
		results.sort_by_key(|r| r.as_ref().map_or(u8::MAX, |l| *l));
		assert_eq!(results[0].as_ref().ok(), Some(&0));
		assert!(results[1].is_err());
		Ok(())
	}

	#[test]
	fn store_without_grids() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("plain.mbtiles");
		MBTilesBuilder::new().tile(0, 0, 0, b"t").without_grid_tables().write(&path)?;
		let store = MBTilesStore::open(&path)?;

		assert_eq!(store.count_grid_tiles(), 0);
		let mut seen = 0;
		store.for_each_grid_tile(|_| {
			seen += 1;
			ControlFlow::Continue(())
		})?;
		assert_eq!(seen, 0);
		assert!(store.read_grid_overlay(&TileCoord::new(0, 0, 0)?)?.is_empty());
		Ok(())
	}

	#[test]
	fn unknown_format_falls_back_to_png() -> Result<()> {
		let dir = TempDir::new()?;
		let path = dir.path().join("tiff.mbtiles");
		MBTilesBuilder::new().metadata("format", "tiff").write(&path)?;
		assert_eq!(MBTilesStore::open(&path)?.image_format()?, ImageFormat::PNG);
		Ok(())
	}
}
