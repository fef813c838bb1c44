//! Tile coordinates as stored in an MBTiles file.
//!
//! MBTiles addresses rows in the TMS scheme (row 0 at the bottom). [`TileCoord`] keeps the
//! values exactly as they were read; [`TileCoord::flip_y`] converts between TMS and XYZ.
//!
//! ```
//! use mbtiles2s3_core::TileCoord;
//!
//! let mut coord = TileCoord::new(2, 1, 0).unwrap();
//! coord.flip_y().unwrap();
//! assert_eq!(coord.y, 3);
//! ```

use anyhow::{Result, ensure};
use std::fmt::{self, Debug};

/// A tile coordinate with zoom level, column and row.
#[derive(Eq, PartialEq, Clone, Hash, Copy)]
pub struct TileCoord {
	pub level: u8,
	pub x: u32,
	pub y: u32,
}

impl TileCoord {
	/// Create a new `TileCoord` at the given zoom `level` and tile indices `x`, `y`.
	///
	/// # Errors
	/// Returns an error if `level` > 31 or an index does not fit into the level.
	pub fn new(level: u8, x: u32, y: u32) -> Result<TileCoord> {
		ensure!(level <= 31, "level ({level}) must be <= 31");
		let max = 2u64.pow(u32::from(level));
		ensure!(u64::from(x) < max, "x ({x}) out of bounds for level {level}");
		ensure!(u64::from(y) < max, "y ({y}) out of bounds for level {level}");
		Ok(TileCoord { level, x, y })
	}

	/// Builds a coordinate from the signed integers SQLite hands out.
	///
	/// Only the level and the signs are checked. Rows outside the grid of their level are kept
	/// as they are, since they still map to a valid object key.
	pub fn from_row(level: i64, x: i64, y: i64) -> Result<TileCoord> {
		ensure!(
			(0..=31).contains(&level) && x >= 0 && y >= 0,
			"invalid tile coordinate {level}/{x}/{y}"
		);
		Ok(TileCoord {
			level: level as u8,
			x: u32::try_from(x)?,
			y: u32::try_from(y)?,
		})
	}

	fn max_value(&self) -> u32 {
		(2u64.pow(u32::from(self.level)) - 1) as u32
	}

	/// Mirror the row index, converting TMS to XYZ and back.
	///
	/// # Errors
	/// Returns an error if the row lies outside the grid of the level.
	pub fn flip_y(&mut self) -> Result<()> {
		let max = self.max_value();
		ensure!(self.y <= max, "cannot flip row of {self:?}, it is outside of level {}", self.level);
		self.y = max - self.y;
		Ok(())
	}
}

impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TileCoord({}, [{}, {}])", self.level, self.x, self.y)
	}
}
