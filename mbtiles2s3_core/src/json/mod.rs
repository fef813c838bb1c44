//! JSON serialization for exported documents.
//!
//! Documents are written compactly with object keys in sorted order, so repeated exports of the
//! same store produce byte-identical objects. [`wrap_jsonp`] optionally wraps the document in a
//! callback invocation for script-tag consumption.
//!
//! ```
//! use mbtiles2s3_core::json::wrap_jsonp;
//! use serde_json::json;
//!
//! let (text, content_type) = wrap_jsonp(&json!({"version": "1"}), "grid");
//! assert_eq!(text.as_str(), r#"grid({"version":"1"});"#);
//! assert_eq!(content_type, "text/javascript");
//! ```

use crate::Blob;
use serde_json::{Map, Value};

pub const MIME_JSON: &str = "application/json";
pub const MIME_JSONP: &str = "text/javascript";

/// Serializes `value` compactly, with the keys of every object sorted.
pub fn stringify_sorted(value: &Value) -> String {
	sort_keys(value).to_string()
}

fn sort_keys(value: &Value) -> Value {
	match value {
		Value::Object(object) => {
			let mut entries: Vec<(&String, &Value)> = object.iter().collect();
			entries.sort_by(|a, b| a.0.cmp(b.0));
			let mut sorted = Map::new();
			for (key, entry) in entries {
				sorted.insert(key.clone(), sort_keys(entry));
			}
			Value::Object(sorted)
		}
		Value::Array(array) => Value::Array(array.iter().map(sort_keys).collect()),
		other => other.clone(),
	}
}

/// Serializes `content` and wraps it in `callback(...);` when `callback` is not empty.
///
/// Returns the text and its content type. The callback name is embedded verbatim; it has to
/// be validated by whoever accepts it from the operator.
pub fn wrap_jsonp(content: &Value, callback: &str) -> (Blob, &'static str) {
	let json = stringify_sorted(content);
	if callback.is_empty() {
		(Blob::from(json), MIME_JSON)
	} else {
		(Blob::from(format!("{callback}({json});")), MIME_JSONP)
	}
}
