//! Deflate-family compression helpers.
//!
//! UTFGrid payloads in MBTiles files are zlib streams by convention, but some producers store
//! gzip or raw deflate data. [`decompress_grid`] sniffs the header and picks the right decoder.

use crate::Blob;
use anyhow::{Context, Result};
use flate2::bufread::{DeflateDecoder, GzDecoder, GzEncoder, ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Compresses data into a zlib stream.
pub fn compress_zlib(blob: &Blob) -> Result<Blob> {
	let mut encoder = ZlibEncoder::new(blob.as_slice(), flate2::Compression::default());
	let mut compressed_data = Vec::new();
	encoder
		.read_to_end(&mut compressed_data)
		.context("Failed to compress data using zlib")?;
	Ok(Blob::from(compressed_data))
}

/// Compresses data using Gzip.
pub fn compress_gzip(blob: &Blob) -> Result<Blob> {
	let mut encoder = GzEncoder::new(blob.as_slice(), flate2::Compression::default());
	let mut compressed_data = Vec::new();
	encoder
		.read_to_end(&mut compressed_data)
		.context("Failed to compress data using Gzip")?;
	Ok(Blob::from(compressed_data))
}

/// Decompresses a zlib stream.
pub fn decompress_zlib(blob: &Blob) -> Result<Blob> {
	let mut decoder = ZlibDecoder::new(blob.as_slice());
	let mut decompressed_data = Vec::new();
	decoder
		.read_to_end(&mut decompressed_data)
		.context("Failed to decompress data using zlib")?;
	Ok(Blob::from(decompressed_data))
}

/// Decompresses data that was compressed using Gzip.
pub fn decompress_gzip(blob: &Blob) -> Result<Blob> {
	let mut decoder = GzDecoder::new(blob.as_slice());
	let mut decompressed_data = Vec::new();
	decoder
		.read_to_end(&mut decompressed_data)
		.context("Failed to decompress data using Gzip")?;
	Ok(Blob::from(decompressed_data))
}

/// Decompresses a raw deflate stream without header.
pub fn decompress_deflate(blob: &Blob) -> Result<Blob> {
	let mut decoder = DeflateDecoder::new(blob.as_slice());
	let mut decompressed_data = Vec::new();
	decoder
		.read_to_end(&mut decompressed_data)
		.context("Failed to decompress raw deflate data")?;
	Ok(Blob::from(decompressed_data))
}

/// `Content-Encoding` of gzip compressed objects.
pub const ENCODING_GZIP: &str = "gzip";

/// Whether `blob` starts with the gzip magic bytes.
pub fn is_gzip(blob: &Blob) -> bool {
	blob.as_slice().starts_with(&[0x1f, 0x8b])
}

// RFC 1950: CM = 8, CINFO <= 7, and the 16-bit header is a multiple of 31.
fn is_zlib(data: &[u8]) -> bool {
	data.len() >= 2 && data[0] & 0x0f == 8 && data[0] >> 4 <= 7 && ((u16::from(data[0]) << 8) | u16::from(data[1])) % 31 == 0
}

/// Decompresses a grid payload, detecting gzip, zlib and raw deflate.
pub fn decompress_grid(blob: &Blob) -> Result<Blob> {
	let data = blob.as_slice();
	if is_gzip(blob) {
		decompress_gzip(blob)
	} else if is_zlib(data) {
		decompress_zlib(blob)
	} else {
		log::trace!("grid payload has no zlib/gzip header, trying raw deflate");
		decompress_deflate(blob)
	}
}
