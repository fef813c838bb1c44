//! The tile image format, as announced by the `format` entry of the MBTiles `metadata` table.
//!
//! The format decides the file extension and the `Content-Type` of every exported image tile.
//! Stores without a (known) `format` entry are exported as PNG.

use std::fmt::{Display, Formatter};

#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ImageFormat {
	JPG,
	MVT,
	#[default]
	PNG,
	WEBP,
}

impl ImageFormat {
	/// Parses the MBTiles `format` value (`png`, `jpg`, `webp`, `pbf`).
	///
	/// Returns `None` for unknown values.
	pub fn from_metadata(value: &str) -> Option<ImageFormat> {
		match value.trim().to_ascii_lowercase().as_str() {
			"png" => Some(ImageFormat::PNG),
			"jpg" | "jpeg" => Some(ImageFormat::JPG),
			"webp" => Some(ImageFormat::WEBP),
			"pbf" | "mvt" => Some(ImageFormat::MVT),
			_ => None,
		}
	}

	/// File extension without the leading dot.
	pub fn extension(&self) -> &'static str {
		match self {
			ImageFormat::JPG => "jpg",
			ImageFormat::MVT => "pbf",
			ImageFormat::PNG => "png",
			ImageFormat::WEBP => "webp",
		}
	}

	pub fn content_type(&self) -> &'static str {
		match self {
			ImageFormat::JPG => "image/jpeg",
			ImageFormat::MVT => "application/x-protobuf",
			ImageFormat::PNG => "image/png",
			ImageFormat::WEBP => "image/webp",
		}
	}
}

impl Display for ImageFormat {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.extension())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("png", Some(ImageFormat::PNG))]
	#[case(" PNG ", Some(ImageFormat::PNG))]
	#[case("jpg", Some(ImageFormat::JPG))]
	#[case("jpeg", Some(ImageFormat::JPG))]
	#[case("webp", Some(ImageFormat::WEBP))]
	#[case("pbf", Some(ImageFormat::MVT))]
	#[case("tiff", None)]
	#[case("", None)]
	fn parse_metadata_value(#[case] value: &str, #[case] expected: Option<ImageFormat>) {
		assert_eq!(ImageFormat::from_metadata(value), expected);
	}

	#[test]
	fn png_is_default() {
		let format = ImageFormat::default();
		assert_eq!(format.extension(), "png");
		assert_eq!(format.content_type(), "image/png");
		assert_eq!(format.to_string(), "png");
	}
}
