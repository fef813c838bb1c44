//! In-memory bucket.
//!
//! Besides storing objects, `MemoryBucket` records what happened to it, so tests can check
//! the order of operations, the highest number of concurrent uploads, and how the exporter
//! reacts to injected failures.

use crate::{AccessPolicy, BucketError, BucketErrorKind, BucketTrait};
use anyhow::{Context, Result};
use async_trait::async_trait;
use mbtiles2s3_core::Blob;
use std::{
	collections::BTreeMap,
	path::Path,
	sync::{
		Mutex, MutexGuard,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

/// An object as stored in a [`MemoryBucket`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
	pub body: Blob,
	pub content_type: String,
	pub content_encoding: Option<String>,
	pub acl: String,
}

/// Operations in the order the bucket saw them complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BucketEvent {
	Prepare,
	Put(String),
	Delete(String),
}

#[derive(Debug)]
struct FailureRule {
	pattern: String,
	kind: BucketErrorKind,
	remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct State {
	objects: BTreeMap<String, StoredObject>,
	events: Vec<BucketEvent>,
	put_failures: Vec<FailureRule>,
	prepare_failure: Option<BucketErrorKind>,
	put_attempts: usize,
}

#[derive(Debug)]
pub struct MemoryBucket {
	name: String,
	policy: AccessPolicy,
	delay: Option<Duration>,
	state: Mutex<State>,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::AcqRel);
	}
}

impl MemoryBucket {
	pub fn new(name: &str) -> MemoryBucket {
		MemoryBucket {
			name: name.to_string(),
			policy: AccessPolicy::default(),
			delay: None,
			state: Mutex::new(State::default()),
			in_flight: AtomicUsize::new(0),
			max_in_flight: AtomicUsize::new(0),
		}
	}

	pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Makes every upload take at least `delay`.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	/// Fails uploads whose key contains `pattern` with `kind`, `times` times or forever if `None`.
	pub fn fail_puts(self, pattern: &str, kind: BucketErrorKind, times: Option<usize>) -> Self {
		self.state().put_failures.push(FailureRule {
			pattern: pattern.to_string(),
			kind,
			remaining: times,
		});
		self
	}

	pub fn fail_prepare(self, kind: BucketErrorKind) -> Self {
		self.state().prepare_failure = Some(kind);
		self
	}

	/// Stores an object directly, without recording an event.
	pub fn insert(&self, key: &str, body: Blob, content_type: &str) {
		self.state().objects.insert(
			key.to_string(),
			StoredObject {
				body,
				content_type: content_type.to_string(),
				content_encoding: None,
				acl: self.policy.acl.to_string(),
			},
		);
	}

	pub fn get(&self, key: &str) -> Option<StoredObject> {
		self.state().objects.get(key).cloned()
	}

	pub fn objects(&self) -> BTreeMap<String, StoredObject> {
		self.state().objects.clone()
	}

	pub fn keys(&self) -> Vec<String> {
		self.state().objects.keys().cloned().collect()
	}

	pub fn events(&self) -> Vec<BucketEvent> {
		self.state().events.clone()
	}

	/// Number of upload attempts, failed ones included.
	pub fn put_attempts(&self) -> usize {
		self.state().put_attempts
	}

	/// Highest number of uploads that were running at the same time.
	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::Acquire)
	}

	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
	}

	fn enter(&self) -> InFlightGuard<'_> {
		let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
		self.max_in_flight.fetch_max(now, Ordering::AcqRel);
		InFlightGuard(&self.in_flight)
	}

	fn injected_failure(&self, key: &str) -> Option<BucketError> {
		let mut state = self.state();
		state.put_attempts += 1;
		let rule = state
			.put_failures
			.iter_mut()
			.find(|rule| key.contains(&rule.pattern) && rule.remaining != Some(0))?;
		if let Some(remaining) = rule.remaining.as_mut() {
			*remaining -= 1;
		}
		Some(BucketError::new(rule.kind, format!("injected failure for '{key}'")))
	}

	async fn store(&self, key: &str, body: Blob, content_type: &str, content_encoding: Option<&str>) -> Result<()> {
		let _guard = self.enter();
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
		if let Some(error) = self.injected_failure(key) {
			return Err(error.into());
		}

		let mut state = self.state();
		state.objects.insert(
			key.to_string(),
			StoredObject {
				body,
				content_type: content_type.to_string(),
				content_encoding: content_encoding.map(str::to_string),
				acl: self.policy.acl.to_string(),
			},
		);
		state.events.push(BucketEvent::Put(key.to_string()));
		Ok(())
	}
}

#[async_trait]
impl BucketTrait for MemoryBucket {
	fn name(&self) -> &str {
		&self.name
	}

	async fn prepare(&self) -> Result<()> {
		let mut state = self.state();
		if let Some(kind) = state.prepare_failure {
			return Err(BucketError::new(kind, format!("cannot prepare bucket '{}'", self.name)).into());
		}
		state.events.push(BucketEvent::Prepare);
		Ok(())
	}

	async fn put_object(&self, key: &str, body: Blob, content_type: &str, content_encoding: Option<&str>) -> Result<()> {
		self.store(key, body, content_type, content_encoding).await
	}

	async fn put_file(
		&self,
		key: &str,
		path: &Path,
		content_type: &str,
		progress: &(dyn Fn(u64, u64) + Send + Sync),
	) -> Result<()> {
		let data = tokio::fs::read(path)
			.await
			.with_context(|| format!("reading {path:?}"))?;
		let total = data.len() as u64;
		self.store(key, Blob::from(data), content_type, None).await?;
		progress(total, total);
		Ok(())
	}

	async fn list(&self, prefix: &str) -> Result<Vec<String>> {
		Ok(self
			.state()
			.objects
			.keys()
			.filter(|key| key.starts_with(prefix))
			.cloned()
			.collect())
	}

	async fn delete(&self, keys: &[String]) -> Result<()> {
		let mut state = self.state();
		for key in keys {
			if state.objects.remove(key).is_some() {
				state.events.push(BucketEvent::Delete(key.clone()));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::sync::{Arc, atomic::AtomicU64};

	#[tokio::test]
	async fn put_list_delete() -> Result<()> {
		let bucket = MemoryBucket::new("tiles");
		bucket.prepare().await?;
		bucket.put_object("world/0/0/0.png", Blob::from("a"), "image/png", None).await?;
		bucket.put_object("world.json", Blob::from("{}"), "application/json", None).await?;
		bucket.put_object("worldwide.json", Blob::from("{}"), "application/json", None).await?;

		assert_eq!(bucket.list("world/").await?, ["world/0/0/0.png"]);

		bucket
			.delete(&["world/0/0/0.png".to_string(), "missing".to_string()])
			.await?;
		assert_eq!(bucket.keys(), ["world.json", "worldwide.json"]);
		assert_eq!(
			bucket.events(),
			[
				BucketEvent::Prepare,
				BucketEvent::Put("world/0/0/0.png".to_string()),
				BucketEvent::Put("world.json".to_string()),
				BucketEvent::Put("worldwide.json".to_string()),
				BucketEvent::Delete("world/0/0/0.png".to_string()),
			]
		);
		Ok(())
	}

	#[tokio::test]
	async fn objects_carry_content_type_and_acl() -> Result<()> {
		let bucket = MemoryBucket::new("tiles").with_policy(AccessPolicy {
			acl: crate::ObjectAcl::Private,
			cors: None,
		});
		bucket.put_object("a.json", Blob::from("{}"), "application/json", None).await?;
		let object = bucket.get("a.json").unwrap();
		assert_eq!(object.content_type, "application/json");
		assert_eq!(object.content_encoding, None);
		assert_eq!(object.acl, "private");

		bucket
			.put_object("0.pbf", Blob::from("x"), "application/x-protobuf", Some("gzip"))
			.await?;
		assert_eq!(bucket.get("0.pbf").unwrap().content_encoding.as_deref(), Some("gzip"));
		Ok(())
	}

	#[tokio::test]
	async fn injected_failures_run_out() -> Result<()> {
		let bucket = MemoryBucket::new("tiles").fail_puts(".png", BucketErrorKind::Transient, Some(2));
		for _ in 0..2 {
			let error = bucket.put_object("1.png", Blob::from("x"), "image/png", None).await.unwrap_err();
			assert_eq!(BucketErrorKind::of(&error), BucketErrorKind::Transient);
		}
		bucket.put_object("1.png", Blob::from("x"), "image/png", None).await?;
		bucket.put_object("1.json", Blob::from("x"), "application/json", None).await?;
		assert_eq!(bucket.put_attempts(), 4);
		Ok(())
	}

	#[tokio::test]
	async fn failing_prepare() {
		let bucket = MemoryBucket::new("tiles").fail_prepare(BucketErrorKind::Fatal);
		let error = bucket.prepare().await.unwrap_err();
		assert_eq!(BucketErrorKind::of(&error), BucketErrorKind::Fatal);
	}

	#[tokio::test]
	async fn put_file_reports_progress() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("world.mbtiles");
		std::fs::write(&path, vec![7u8; 1000])?;

		let bucket = MemoryBucket::new("tiles");
		let sent = Arc::new(AtomicU64::new(0));
		let sent_clone = Arc::clone(&sent);
		bucket
			.put_file("world.mbtiles", &path, "application/octet-stream", &move |done, total| {
				assert_eq!(total, 1000);
				sent_clone.store(done, Ordering::Release);
			})
			.await?;
		assert_eq!(sent.load(Ordering::Acquire), 1000);
		assert_eq!(bucket.get("world.mbtiles").unwrap().body.len(), 1000);
		Ok(())
	}

	#[tokio::test]
	async fn tracks_max_in_flight() -> Result<()> {
		let bucket = Arc::new(MemoryBucket::new("tiles").with_delay(Duration::from_millis(20)));
		let uploads = (0..5).map(|i| {
			let bucket = Arc::clone(&bucket);
			async move { bucket.put_object(&format!("{i}.png"), Blob::from("x"), "image/png", None).await }
		});
		for result in futures::future::join_all(uploads).await {
			result?;
		}
		assert_eq!(bucket.max_in_flight(), 5);
		Ok(())
	}
}
