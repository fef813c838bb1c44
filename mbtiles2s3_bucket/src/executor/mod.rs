//! Concurrent uploads with retries and failure accounting.
//!
//! [`UploadExecutor::run`] consumes a stream of [`UploadTask`]s and keeps at most
//! `concurrency` uploads in flight. Each item ends in one of three ways:
//!
//! - uploaded
//! - failed: logged and counted, the phase goes on
//! - fatal: no further tasks are pulled from the stream, running uploads are awaited, and
//!   `run` returns the error
//!
//! Items of the stream may already be `Err`, e.g. a grid tile that could not be assembled.
//! Those count as failed without touching the bucket.

mod retry;
mod task;

pub use retry::RetryPolicy;
pub use task::{Outcome, PhaseSummary, UploadBody, UploadTask};

use crate::{BucketErrorKind, BucketTrait};
use anyhow::{Context, Result};
use futures::{Stream, StreamExt, future::ready};
use mbtiles2s3_core::progress::ProgressBar;
use std::sync::{
	Arc, OnceLock,
	atomic::{AtomicBool, AtomicU64, Ordering},
};

#[derive(Clone, Debug)]
pub struct UploadExecutor {
	bucket: Arc<dyn BucketTrait>,
	concurrency: usize,
	retry: RetryPolicy,
}

impl UploadExecutor {
	pub fn new(bucket: Arc<dyn BucketTrait>, concurrency: usize) -> UploadExecutor {
		UploadExecutor {
			bucket,
			concurrency: concurrency.max(1),
			retry: RetryPolicy::default(),
		}
	}

	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	pub fn bucket(&self) -> &Arc<dyn BucketTrait> {
		&self.bucket
	}

	pub fn retry(&self) -> &RetryPolicy {
		&self.retry
	}

	async fn send(&self, task: &UploadTask) -> Result<()> {
		match &task.body {
			UploadBody::Blob(blob) => {
				self
					.bucket
					.put_object(&task.key, blob.clone(), task.content_type, task.content_encoding)
					.await
			}
			UploadBody::File { path, progress } => {
				let silent = |_: u64, _: u64| {};
				let progress = progress.as_deref().unwrap_or(&silent);
				self.bucket.put_file(&task.key, path, task.content_type, progress).await
			}
		}
	}

	/// Uploads a single task, retrying retryable errors.
	///
	/// Returns `Err` only if the export has to stop.
	pub async fn upload(&self, task: UploadTask) -> Result<Outcome> {
		log::trace!("upload '{}' ({})", task.key, task.content_type);
		let Err(error) = self.retry.run(&task.key, || self.send(&task)).await else {
			return Ok(Outcome::Uploaded);
		};
		if BucketErrorKind::of(&error).is_fatal() {
			return Err(error).with_context(|| format!("uploading '{}'", task.key));
		}
		Ok(Outcome::Failed(format!("{error:#}")))
	}

	/// Uploads every task of `tasks`, at most `concurrency` at a time.
	///
	/// `progress` is advanced by one for every finished item, failed ones included.
	pub async fn run<S>(&self, tasks: S, progress: Option<&ProgressBar>) -> Result<PhaseSummary>
	where
		S: Stream<Item = Result<UploadTask>>,
	{
		let abort = AtomicBool::new(false);
		let fatal = OnceLock::new();
		let uploaded = AtomicU64::new(0);
		let failed = AtomicU64::new(0);
		let (abort_ref, fatal_ref, uploaded_ref, failed_ref) = (&abort, &fatal, &uploaded, &failed);

		tasks
			.take_while(move |_| ready(!abort_ref.load(Ordering::Acquire)))
			.map(move |item| async move {
				match item {
					Ok(task) => {
						let key = task.key.clone();
						match self.upload(task).await {
							Ok(Outcome::Uploaded) => {
								uploaded_ref.fetch_add(1, Ordering::AcqRel);
							}
							Ok(Outcome::Failed(reason)) => {
								log::warn!("failed to upload '{key}': {reason}");
								failed_ref.fetch_add(1, Ordering::AcqRel);
							}
							Err(error) => {
								abort_ref.store(true, Ordering::Release);
								let _ = fatal_ref.set(error);
							}
						}
					}
					Err(error) => {
						log::warn!("skipping item: {error:#}");
						failed_ref.fetch_add(1, Ordering::AcqRel);
					}
				}
				if let Some(progress) = progress {
					progress.inc(1);
				}
			})
			.buffer_unordered(self.concurrency)
			.for_each(|()| ready(()))
			.await;

		let summary = PhaseSummary {
			uploaded: uploaded.into_inner(),
			failed: failed.into_inner(),
		};
		if let Some(error) = fatal.into_inner() {
			log::debug!("phase aborted after {} uploads, {} failures", summary.uploaded, summary.failed);
			return Err(error);
		}
		Ok(summary)
	}
}
