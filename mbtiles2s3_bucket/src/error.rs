use std::fmt::{self, Display};

/// How an upload or bucket operation failed, and what the caller should do about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketErrorKind {
	/// Worth retrying; once retries are exhausted only the affected item fails.
	Transient,
	/// The backend cannot be reached. Retried, then the whole export stops.
	Unavailable,
	/// The backend refused this object. Not retried, only the item fails.
	Rejected,
	/// Nothing further can succeed (bad credentials, missing bucket, ...).
	Fatal,
}

impl BucketErrorKind {
	pub fn is_retryable(self) -> bool {
		matches!(self, BucketErrorKind::Transient | BucketErrorKind::Unavailable)
	}

	/// Whether the export has to stop once retries are exhausted.
	pub fn is_fatal(self) -> bool {
		matches!(self, BucketErrorKind::Unavailable | BucketErrorKind::Fatal)
	}

	/// Finds the [`BucketError`] in the chain of `error`.
	///
	/// Errors that did not come from a bucket backend (a local file that cannot be read, for
	/// instance) are treated as [`BucketErrorKind::Rejected`].
	pub fn of(error: &anyhow::Error) -> BucketErrorKind {
		error
			.chain()
			.find_map(|cause| cause.downcast_ref::<BucketError>())
			.map_or(BucketErrorKind::Rejected, |bucket_error| bucket_error.kind)
	}
}

/// An error reported by a bucket backend, tagged with its [`BucketErrorKind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketError {
	pub kind: BucketErrorKind,
	pub message: String,
}

impl BucketError {
	pub fn new(kind: BucketErrorKind, message: impl Into<String>) -> BucketError {
		BucketError {
			kind,
			message: message.into(),
		}
	}

	pub fn transient(message: impl Into<String>) -> BucketError {
		BucketError::new(BucketErrorKind::Transient, message)
	}

	pub fn unavailable(message: impl Into<String>) -> BucketError {
		BucketError::new(BucketErrorKind::Unavailable, message)
	}

	pub fn rejected(message: impl Into<String>) -> BucketError {
		BucketError::new(BucketErrorKind::Rejected, message)
	}

	pub fn fatal(message: impl Into<String>) -> BucketError {
		BucketError::new(BucketErrorKind::Fatal, message)
	}
}

impl Display for BucketError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({:?})", self.message, self.kind)
	}
}

impl std::error::Error for BucketError {}
