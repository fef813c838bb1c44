use crate::ByteProgress;
use mbtiles2s3_core::Blob;
use std::{fmt, path::PathBuf};

/// The content of an upload.
#[derive(Clone)]
pub enum UploadBody {
	Blob(Blob),
	/// A local file, streamed by the backend. `progress` receives `(bytes_sent, total_bytes)`.
	File { path: PathBuf, progress: Option<ByteProgress> },
}

impl fmt::Debug for UploadBody {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			UploadBody::Blob(blob) => blob.fmt(f),
			UploadBody::File { path, .. } => f.debug_tuple("File").field(path).finish(),
		}
	}
}

/// One object to write into the bucket.
#[derive(Clone, Debug)]
pub struct UploadTask {
	pub key: String,
	pub content_type: &'static str,
	/// Only applied to in-memory bodies.
	pub content_encoding: Option<&'static str>,
	pub body: UploadBody,
}

impl UploadTask {
	pub fn blob(key: String, body: Blob, content_type: &'static str) -> UploadTask {
		UploadTask {
			key,
			content_type,
			content_encoding: None,
			body: UploadBody::Blob(body),
		}
	}

	pub fn with_content_encoding(mut self, content_encoding: &'static str) -> Self {
		self.content_encoding = Some(content_encoding);
		self
	}

	pub fn file(key: String, path: PathBuf, content_type: &'static str, progress: Option<ByteProgress>) -> UploadTask {
		UploadTask {
			key,
			content_type,
			content_encoding: None,
			body: UploadBody::File { path, progress },
		}
	}
}

/// Result of a single upload that did not stop the export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
	Uploaded,
	Failed(String),
}

/// Counts of one export phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhaseSummary {
	pub uploaded: u64,
	pub failed: u64,
}

impl PhaseSummary {
	pub fn total(&self) -> u64 {
		self.uploaded + self.failed
	}
}
