//! This module provides the [`Blob`] struct, an owned byte buffer used for tile payloads and
//! serialized documents on their way into the bucket.
//!
//! # Examples
//!
//! ```rust
//! use mbtiles2s3_core::Blob;
//!
//! let blob = Blob::from("grid({});");
//! assert_eq!(blob.len(), 9);
//! assert_eq!(blob.as_str(), "grid({});");
//! ```

use anyhow::{Context, Result};
use std::fmt::Debug;

/// A simple wrapper around [`Vec<u8>`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	#[must_use]
	pub fn new_empty() -> Blob {
		Blob(Vec::new())
	}

	/// Returns a reference to the underlying byte slice.
	#[must_use]
	pub fn as_slice(&self) -> &[u8] {
		self.0.as_ref()
	}

	/// Consumes this [`Blob`] and returns the underlying `Vec<u8>`.
	#[must_use]
	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}

	/// Returns the content as a string slice.
	///
	/// # Panics
	///
	/// Panics if the bytes are not valid UTF-8. Use [`Blob::to_utf8`] for untrusted content.
	#[must_use]
	pub fn as_str(&self) -> &str {
		std::str::from_utf8(&self.0).expect("Blob content was not valid UTF-8")
	}

	/// Returns the content as a string slice, or an error if it is not valid UTF-8.
	pub fn to_utf8(&self) -> Result<&str> {
		std::str::from_utf8(&self.0).context("content is not valid UTF-8")
	}

	#[must_use]
	pub fn len(&self) -> u64 {
		self.0.len() as u64
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<Vec<u8>> for Blob {
	fn from(item: Vec<u8>) -> Self {
		Blob(item)
	}
}

impl From<&[u8]> for Blob {
	fn from(item: &[u8]) -> Self {
		Blob(item.to_vec())
	}
}

impl<const N: usize> From<&[u8; N]> for Blob {
	fn from(item: &[u8; N]) -> Self {
		Blob(item.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(item: &str) -> Self {
		Blob(item.as_bytes().to_vec())
	}
}

impl From<String> for Blob {
	fn from(item: String) -> Self {
		Blob(item.into_bytes())
	}
}

impl Debug for Blob {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Blob({} bytes)", self.0.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conversions() {
		assert_eq!(Blob::from(vec![1, 2, 3]).as_slice(), &[1, 2, 3]);
		assert_eq!(Blob::from(&[4u8, 5]).into_vec(), vec![4, 5]);
		assert_eq!(Blob::from(String::from("Xylofön")).as_str(), "Xylofön");
		assert!(Blob::new_empty().is_empty());
	}

	#[test]
	fn utf8_check() {
		assert_eq!(Blob::from("abc").to_utf8().unwrap(), "abc");
		assert!(Blob::from(&[0xff, 0xfe]).to_utf8().is_err());
	}

	#[test]
	fn debug_format() {
		assert_eq!(format!("{:?}", Blob::from("hello")), "Blob(5 bytes)");
	}
}
