use anyhow::Result;
use async_trait::async_trait;
use mbtiles2s3_core::Blob;
use std::{fmt::Debug, path::Path, sync::Arc};

/// Callback receiving `(bytes_sent, total_bytes)` while a file is uploaded.
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Object-safe interface of a storage bucket.
///
/// Errors should carry a [`BucketError`](crate::BucketError) so callers can tell retryable
/// failures from fatal ones.
#[async_trait]
pub trait BucketTrait: Debug + Send + Sync {
	fn name(&self) -> &str;

	/// Creates the bucket if needed and applies the bucket ACL and CORS rule.
	async fn prepare(&self) -> Result<()>;

	/// Creates or overwrites the object at `key`, applying the object ACL.
	///
	/// `content_encoding` is stored as the object's `Content-Encoding`, e.g. `gzip` for vector
	/// tiles that are kept compressed.
	async fn put_object(&self, key: &str, body: Blob, content_type: &str, content_encoding: Option<&str>) -> Result<()>;

	/// Like [`BucketTrait::put_object`], streaming the body from a local file.
	async fn put_file(
		&self,
		key: &str,
		path: &Path,
		content_type: &str,
		progress: &(dyn Fn(u64, u64) + Send + Sync),
	) -> Result<()>;

	/// All keys starting with `prefix`.
	async fn list(&self, prefix: &str) -> Result<Vec<String>>;

	/// Deletes the given keys. Keys that do not exist are ignored.
	async fn delete(&self, keys: &[String]) -> Result<()>;
}
