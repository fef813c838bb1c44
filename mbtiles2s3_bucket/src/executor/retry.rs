use crate::BucketErrorKind;
use anyhow::Result;
use std::time::Duration;

/// Bounded exponential backoff for retryable bucket errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	pub retries: u32,
	pub base_delay: Duration,
	pub factor: u32,
	pub max_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		RetryPolicy {
			retries: 3,
			base_delay: Duration::from_millis(200),
			factor: 2,
			max_delay: Duration::from_secs(5),
		}
	}
}

impl RetryPolicy {
	pub fn none() -> RetryPolicy {
		RetryPolicy {
			retries: 0,
			..RetryPolicy::default()
		}
	}

	pub fn with_retries(mut self, retries: u32) -> Self {
		self.retries = retries;
		self
	}

	/// Delay before retry number `attempt + 1`, or `None` if retries are used up.
	pub fn delay(&self, attempt: u32) -> Option<Duration> {
		if attempt >= self.retries {
			return None;
		}
		let factor = self.factor.max(1).saturating_pow(attempt);
		Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
	}

	/// Runs `operation` until it succeeds, fails with a non-retryable error, or retries run out.
	pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 0;
		loop {
			let error = match operation().await {
				Ok(value) => return Ok(value),
				Err(error) => error,
			};
			let delay = match self.delay(attempt) {
				Some(delay) if BucketErrorKind::of(&error).is_retryable() => delay,
				_ => return Err(error),
			};
			attempt += 1;
			log::debug!("{what} failed (attempt {attempt}), retrying in {delay:?}: {error:#}");
			tokio::time::sleep(delay).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::BucketError;
	use rstest::rstest;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[rstest]
	#[case(0, Some(200))]
	#[case(1, Some(400))]
	#[case(2, Some(800))]
	#[case(3, None)]
	fn default_backoff(#[case] attempt: u32, #[case] expected_ms: Option<u64>) {
		assert_eq!(RetryPolicy::default().delay(attempt), expected_ms.map(Duration::from_millis));
	}

	#[test]
	fn backoff_is_capped() {
		let policy = RetryPolicy::default().with_retries(10);
		assert_eq!(policy.delay(9), Some(Duration::from_secs(5)));
	}

	fn quick(retries: u32) -> RetryPolicy {
		RetryPolicy {
			retries,
			base_delay: Duration::from_millis(1),
			factor: 2,
			max_delay: Duration::from_millis(5),
		}
	}

	#[tokio::test]
	async fn retries_transient_until_success() -> Result<()> {
		let calls = &AtomicU32::new(0);
		let value = quick(3)
			.run("test", move || async move {
				if calls.fetch_add(1, Ordering::AcqRel) < 2 {
					Err(BucketError::transient("busy").into())
				} else {
					Ok(42)
				}
			})
			.await?;
		assert_eq!(value, 42);
		assert_eq!(calls.load(Ordering::Acquire), 3);
		Ok(())
	}

	#[tokio::test]
	async fn gives_up_after_retries() {
		let calls = &AtomicU32::new(0);
		let result: Result<()> = quick(2)
			.run("test", move || async move {
				calls.fetch_add(1, Ordering::AcqRel);
				Err(BucketError::unavailable("down").into())
			})
			.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::Acquire), 3);
	}

	#[rstest]
	#[case(BucketError::rejected("no"))]
	#[case(BucketError::fatal("no"))]
	#[tokio::test]
	async fn does_not_retry_final_errors(#[case] failure: BucketError) {
		let calls = &AtomicU32::new(0);
		let failure = &failure;
		let result: Result<()> = quick(5)
			.run("test", move || async move {
				calls.fetch_add(1, Ordering::AcqRel);
				Err(failure.clone().into())
			})
			.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::Acquire), 1);
	}
}
