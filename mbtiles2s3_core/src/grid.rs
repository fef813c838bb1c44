//! Assembly of UTFGrid documents.
//!
//! An MBTiles grid tile is split in two: the compressed grid itself (in `grids`) and the
//! feature data of its keys (in `grid_data`). Serving the grid as a static file requires both
//! halves merged into one document, with the feature data stored under `data`:
//!
//! ```json
//! {"data":{"1":{"NAME":"Minnesota"}},"grid":["  ","!!"],"keys":["","1"]}
//! ```

use crate::{Blob, compression::decompress_grid, json::wrap_jsonp};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::BTreeMap;

/// Feature data of one grid tile: key name → parsed `key_json`.
pub type GridOverlay = BTreeMap<String, Value>;

/// Decompresses a grid payload and merges `overlay` into its `data` field.
///
/// An existing `data` field is replaced. All other fields are left untouched.
pub fn merge_grid(compressed: &Blob, overlay: GridOverlay) -> Result<Value> {
	let text = decompress_grid(compressed)?;
	let mut document: Value =
		serde_json::from_str(text.to_utf8()?).context("grid payload is not valid JSON")?;

	let Some(object) = document.as_object_mut() else {
		bail!("grid payload is not a JSON object");
	};
	object.insert("data".to_string(), Value::Object(overlay.into_iter().collect()));

	Ok(document)
}

/// Builds the final grid document, wrapped in `callback` if it is not empty.
pub fn assemble_grid(compressed: &Blob, overlay: GridOverlay, callback: &str) -> Result<(Blob, &'static str)> {
	let document = merge_grid(compressed, overlay)?;
	Ok(wrap_jsonp(&document, callback))
}
