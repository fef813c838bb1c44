//! Mapping of exported artifacts to bucket object keys.
//!
//! Every artifact of one export lives below the tileset name, optionally inside a path prefix:
//!
//! | kind | key |
//! |---|---|
//! | [`ObjectKind::MetadataRoot`] | `{prefix/}{tileset}.json` |
//! | [`ObjectKind::MetadataNested`] | `{prefix/}{tileset}/metadata.json` |
//! | [`ObjectKind::ImageTile`] | `{prefix/}{tileset}/{z}/{x}/{y}.png` |
//! | [`ObjectKind::GridTile`] | `{prefix/}{tileset}/{z}/{x}/{y}.grid.json` |
//! | [`ObjectKind::Archive`] | `{prefix/}{tileset}.mbtiles` |
//!
//! ```
//! use mbtiles2s3_core::{KeyBuilder, ObjectKind, PathPrefix, TileCoord};
//!
//! let keys = KeyBuilder::new("world", PathPrefix::parse("/maps/tiles/")).unwrap();
//! let coord = TileCoord::new(1, 0, 1).unwrap();
//! assert_eq!(keys.key(&ObjectKind::ImageTile(coord)), "maps/tiles/world/1/0/1.png");
//! assert_eq!(keys.key(&ObjectKind::Archive), "maps/tiles/world.mbtiles");
//! ```

use super::{ImageFormat, TileCoord};
use crate::json::{MIME_JSON, MIME_JSONP};
use anyhow::{Result, ensure};
use std::fmt::{self, Display};

/// Content type of the uploaded archive.
pub const MIME_ARCHIVE: &str = "application/octet-stream";

/// Bucket path prefix, normalized once at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathPrefix(String);

impl PathPrefix {
	/// Normalizes a user supplied path: strips leading and trailing separators, drops empty
	/// segments and, on platforms with case-insensitive paths, lowercases it.
	pub fn parse(raw: &str) -> PathPrefix {
		let joined = raw.split('/').filter(|segment| !segment.is_empty()).collect::<Vec<_>>().join("/");
		if cfg!(windows) {
			PathPrefix(joined.to_lowercase())
		} else {
			PathPrefix(joined)
		}
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Prepends the prefix and a separator to `path`; an empty prefix leaves `path` untouched.
	pub fn join(&self, path: &str) -> String {
		if self.0.is_empty() {
			path.to_string()
		} else {
			format!("{}/{path}", self.0)
		}
	}
}

impl Display for PathPrefix {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// One kind of exported artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
	ImageTile(TileCoord),
	GridTile(TileCoord),
	MetadataRoot,
	MetadataNested,
	Archive,
}

/// Builds object keys and content types for a single tileset.
#[derive(Clone, Debug)]
pub struct KeyBuilder {
	tileset: String,
	prefix: PathPrefix,
	image_format: ImageFormat,
	jsonp: bool,
}

impl KeyBuilder {
	/// # Errors
	/// Returns an error if `tileset` is empty or contains a `/`.
	pub fn new(tileset: &str, prefix: PathPrefix) -> Result<KeyBuilder> {
		ensure!(!tileset.is_empty(), "tileset name must not be empty");
		ensure!(!tileset.contains('/'), "tileset name '{tileset}' must not contain '/'");
		Ok(KeyBuilder {
			tileset: tileset.to_string(),
			prefix,
			image_format: ImageFormat::default(),
			jsonp: false,
		})
	}

	pub fn with_image_format(mut self, image_format: ImageFormat) -> Self {
		self.image_format = image_format;
		self
	}

	/// Whether JSON documents are wrapped in a JSONP callback.
	pub fn with_jsonp(mut self, jsonp: bool) -> Self {
		self.jsonp = jsonp;
		self
	}

	pub fn tileset(&self) -> &str {
		&self.tileset
	}

	pub fn prefix(&self) -> &PathPrefix {
		&self.prefix
	}

	pub fn key(&self, kind: &ObjectKind) -> String {
		let tileset = &self.tileset;
		let path = match kind {
			ObjectKind::ImageTile(c) => format!("{tileset}/{}/{}/{}.{}", c.level, c.x, c.y, self.image_format.extension()),
			ObjectKind::GridTile(c) => format!("{tileset}/{}/{}/{}.grid.json", c.level, c.x, c.y),
			ObjectKind::MetadataRoot => format!("{tileset}.json"),
			ObjectKind::MetadataNested => format!("{tileset}/metadata.json"),
			ObjectKind::Archive => format!("{tileset}.mbtiles"),
		};
		self.prefix.join(&path)
	}

	pub fn content_type(&self, kind: &ObjectKind) -> &'static str {
		match kind {
			ObjectKind::ImageTile(_) => self.image_format.content_type(),
			ObjectKind::GridTile(_) | ObjectKind::MetadataRoot | ObjectKind::MetadataNested => {
				if self.jsonp {
					MIME_JSONP
				} else {
					MIME_JSON
				}
			}
			ObjectKind::Archive => MIME_ARCHIVE,
		}
	}

	/// The listing prefix that holds every tile and the nested metadata of this tileset.
	pub fn removal_prefix(&self) -> String {
		self.prefix.join(&format!("{}/", self.tileset))
	}

	/// Keys of this tileset that live next to, not inside, the tileset directory.
	pub fn removal_keys(&self) -> [String; 2] {
		[self.key(&ObjectKind::MetadataRoot), self.key(&ObjectKind::Archive)]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	fn coord(level: u8, x: u32, y: u32) -> TileCoord {
		TileCoord::new(level, x, y).unwrap()
	}

	#[rstest]
	#[case("", "")]
	#[case("/", "")]
	#[case("tiles", "tiles")]
	#[case("/tiles/", "tiles")]
	#[case("//a//b///", "a/b")]
	#[case("a/b/c", "a/b/c")]
	fn prefix_normalization(#[case] raw: &str, #[case] expected: &str) {
		assert_eq!(PathPrefix::parse(raw).as_str(), expected);
	}

	#[rstest]
	#[case(ObjectKind::ImageTile(coord(3, 2, 5)), "world/3/2/5.png", "image/png")]
	#[case(ObjectKind::GridTile(coord(3, 2, 5)), "world/3/2/5.grid.json", "application/json")]
	#[case(ObjectKind::MetadataRoot, "world.json", "application/json")]
	#[case(ObjectKind::MetadataNested, "world/metadata.json", "application/json")]
	#[case(ObjectKind::Archive, "world.mbtiles", "application/octet-stream")]
	fn keys_without_prefix(#[case] kind: ObjectKind, #[case] key: &str, #[case] content_type: &str) {
		let keys = KeyBuilder::new("world", PathPrefix::default()).unwrap();
		assert_eq!(keys.key(&kind), key);
		assert_eq!(keys.content_type(&kind), content_type);
	}

	#[test]
	fn jsonp_changes_json_content_types_only() {
		let keys = KeyBuilder::new("world", PathPrefix::default()).unwrap().with_jsonp(true);
		assert_eq!(keys.content_type(&ObjectKind::MetadataRoot), "text/javascript");
		assert_eq!(keys.content_type(&ObjectKind::GridTile(coord(0, 0, 0))), "text/javascript");
		assert_eq!(keys.content_type(&ObjectKind::ImageTile(coord(0, 0, 0))), "image/png");
		assert_eq!(keys.content_type(&ObjectKind::Archive), "application/octet-stream");
	}

	#[test]
	fn image_format_sets_extension() {
		let keys = KeyBuilder::new("world", PathPrefix::default())
			.unwrap()
			.with_image_format(ImageFormat::JPG);
		assert_eq!(keys.key(&ObjectKind::ImageTile(coord(1, 1, 0))), "world/1/1/0.jpg");
		assert_eq!(keys.content_type(&ObjectKind::ImageTile(coord(1, 1, 0))), "image/jpeg");
	}

	#[rstest]
	#[case("maps")]
	#[case("/maps/")]
	#[case("maps/v2")]
	#[case("//maps//v2//")]
	fn prefixed_keys_start_with_prefix(#[case] raw: &str) {
		let prefix = PathPrefix::parse(raw);
		let keys = KeyBuilder::new("world", prefix.clone()).unwrap();
		let kinds = [
			ObjectKind::ImageTile(coord(2, 1, 3)),
			ObjectKind::GridTile(coord(2, 1, 3)),
			ObjectKind::MetadataRoot,
			ObjectKind::MetadataNested,
			ObjectKind::Archive,
		];
		for kind in kinds {
			let key = keys.key(&kind);
			assert!(key.starts_with(&format!("{prefix}/")), "{key}");
			assert!(!key.contains("//"), "{key}");
		}
	}

	#[test]
	fn kinds_never_collide() {
		let keys = KeyBuilder::new("world", PathPrefix::parse("p")).unwrap();
		let c = coord(0, 0, 0);
		let mut all = vec![
			keys.key(&ObjectKind::ImageTile(c)),
			keys.key(&ObjectKind::GridTile(c)),
			keys.key(&ObjectKind::MetadataRoot),
			keys.key(&ObjectKind::MetadataNested),
			keys.key(&ObjectKind::Archive),
		];
		all.sort();
		all.dedup();
		assert_eq!(all.len(), 5);
	}

	#[test]
	fn removal_targets() {
		let keys = KeyBuilder::new("world", PathPrefix::parse("maps")).unwrap();
		assert_eq!(keys.removal_prefix(), "maps/world/");
		assert_eq!(keys.removal_keys(), ["maps/world.json".to_string(), "maps/world.mbtiles".to_string()]);
	}

	#[rstest]
	#[case("")]
	#[case("a/b")]
	fn invalid_tileset_names(#[case] name: &str) {
		assert!(KeyBuilder::new(name, PathPrefix::default()).is_err());
	}
}
