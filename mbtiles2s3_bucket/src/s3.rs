//! Amazon S3 backend, also usable with S3 compatible stores via a custom endpoint.
//!
//! Credentials and region come from the usual AWS environment (`AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`, profiles, ...), resolved by `aws-config`.
//! Files larger than [`MULTIPART_THRESHOLD`] are sent as multipart uploads, so progress is
//! reported after every part.

use crate::{AccessPolicy, BucketError, BucketErrorKind, BucketTrait};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
	Client,
	config::{Region, http::HttpResponse},
	error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
	primitives::ByteStream,
	types::{
		BucketCannedAcl, BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CorsConfiguration,
		CorsRule as S3CorsRule, CreateBucketConfiguration, Delete, ObjectCannedAcl, ObjectIdentifier,
	},
};
use mbtiles2s3_core::Blob;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Files at least this large are uploaded in parts.
pub const MULTIPART_THRESHOLD: u64 = 16 * 1024 * 1024;
const PART_SIZE: usize = 8 * 1024 * 1024;
const DELETE_BATCH: usize = 1000;

/// Connection settings of an [`S3Bucket`].
#[derive(Clone, Debug, Default)]
pub struct S3Config {
	pub bucket: String,
	/// Overrides the region from the environment.
	pub region: Option<String>,
	/// Custom endpoint, e.g. for MinIO or localstack. Enables path-style addressing.
	pub endpoint_url: Option<String>,
	pub policy: AccessPolicy,
}

#[derive(Clone, Debug)]
pub struct S3Bucket {
	client: Client,
	name: String,
	policy: AccessPolicy,
}

impl S3Bucket {
	pub async fn connect(config: S3Config) -> Result<S3Bucket> {
		anyhow::ensure!(!config.bucket.is_empty(), "bucket name must not be empty");
		log::debug!("connect to S3 bucket '{}'", config.bucket);

		let mut loader = aws_config::defaults(BehaviorVersion::latest());
		if let Some(region) = &config.region {
			loader = loader.region(Region::new(region.clone()));
		}
		let shared_config = loader.load().await;

		let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
		if let Some(endpoint) = &config.endpoint_url {
			builder = builder.endpoint_url(endpoint).force_path_style(true);
		}

		Ok(S3Bucket {
			client: Client::from_conf(builder.build()),
			name: config.bucket,
			policy: config.policy,
		})
	}

	fn object_acl(&self) -> ObjectCannedAcl {
		ObjectCannedAcl::from(self.policy.acl.as_str())
	}

	async fn create_bucket(&self) -> Result<()> {
		let mut request = self.client.create_bucket().bucket(&self.name);
		// us-east-1 is the default location and must not be named explicitly
		if let Some(region) = self.client.config().region().map(|r| r.as_ref().to_string())
			&& region != "us-east-1"
		{
			request = request.create_bucket_configuration(
				CreateBucketConfiguration::builder()
					.location_constraint(BucketLocationConstraint::from(region.as_str()))
					.build(),
			);
		}

		match request.send().await {
			Ok(_) => {
				log::info!("created bucket '{}'", self.name);
				Ok(())
			}
			Err(error) if error.as_service_error().is_some_and(|e| e.is_bucket_already_owned_by_you()) => {
				log::debug!("bucket '{}' already exists", self.name);
				Ok(())
			}
			Err(error) if error.as_service_error().is_some_and(|e| e.is_bucket_already_exists()) => Err(
				BucketError::fatal(format!("bucket name '{}' is taken by another account", self.name)).into(),
			),
			Err(error) => Err(classify(error, &format!("creating bucket '{}'", self.name))),
		}
	}

	async fn apply_policy(&self) -> Result<()> {
		self
			.client
			.put_bucket_acl()
			.bucket(&self.name)
			.acl(BucketCannedAcl::from(self.policy.acl.bucket_acl()))
			.send()
			.await
			.map_err(|e| classify(e, &format!("setting ACL of bucket '{}'", self.name)))?;

		let Some(cors) = &self.policy.cors else {
			return Ok(());
		};
		let rule = S3CorsRule::builder()
			.set_allowed_methods(Some(cors.allowed_methods.clone()))
			.set_allowed_origins(Some(cors.allowed_origins.clone()))
			.set_allowed_headers(Some(cors.allowed_headers.clone()))
			.set_max_age_seconds(cors.max_age_seconds.map(|s| s as i32))
			.build()
			.context("building CORS rule")?;
		let configuration = CorsConfiguration::builder()
			.cors_rules(rule)
			.build()
			.context("building CORS configuration")?;
		self
			.client
			.put_bucket_cors()
			.bucket(&self.name)
			.cors_configuration(configuration)
			.send()
			.await
			.map_err(|e| classify(e, &format!("setting CORS of bucket '{}'", self.name)))?;
		Ok(())
	}

	async fn put_multipart(
		&self,
		key: &str,
		path: &Path,
		content_type: &str,
		total: u64,
		progress: &(dyn Fn(u64, u64) + Send + Sync),
	) -> Result<()> {
		let created = self
			.client
			.create_multipart_upload()
			.bucket(&self.name)
			.key(key)
			.content_type(content_type)
			.acl(self.object_acl())
			.send()
			.await
			.map_err(|e| classify(e, &format!("starting multipart upload of '{key}'")))?;
		let upload_id = created
			.upload_id()
			.ok_or_else(|| BucketError::transient(format!("no upload id for '{key}'")))?
			.to_string();

		let result = self.send_parts(key, path, &upload_id, total, progress).await;
		if result.is_err() {
			log::debug!("abort multipart upload of '{key}'");
			if let Err(error) = self
				.client
				.abort_multipart_upload()
				.bucket(&self.name)
				.key(key)
				.upload_id(&upload_id)
				.send()
				.await
			{
				log::warn!("cannot abort multipart upload of '{key}': {}", DisplayErrorContext(&error));
			}
		}
		result
	}

	async fn send_parts(
		&self,
		key: &str,
		path: &Path,
		upload_id: &str,
		total: u64,
		progress: &(dyn Fn(u64, u64) + Send + Sync),
	) -> Result<()> {
		let mut file = tokio::fs::File::open(path)
			.await
			.with_context(|| format!("opening {path:?}"))?;
		let mut parts = Vec::new();
		let mut sent = 0u64;
		let mut part_number = 1;

		loop {
			let chunk = read_chunk(&mut file, PART_SIZE)
				.await
				.with_context(|| format!("reading {path:?}"))?;
			if chunk.is_empty() {
				break;
			}
			let length = chunk.len() as u64;
			let uploaded = self
				.client
				.upload_part()
				.bucket(&self.name)
				.key(key)
				.upload_id(upload_id)
				.part_number(part_number)
				.body(ByteStream::from(chunk))
				.send()
				.await
				.map_err(|e| classify(e, &format!("uploading part {part_number} of '{key}'")))?;
			parts.push(
				CompletedPart::builder()
					.part_number(part_number)
					.set_e_tag(uploaded.e_tag().map(str::to_string))
					.build(),
			);
			sent += length;
			progress(sent, total);
			part_number += 1;
		}

		self
			.client
			.complete_multipart_upload()
			.bucket(&self.name)
			.key(key)
			.upload_id(upload_id)
			.multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
			.send()
			.await
			.map_err(|e| classify(e, &format!("completing multipart upload of '{key}'")))?;
		Ok(())
	}
}

async fn read_chunk(file: &mut tokio::fs::File, size: usize) -> std::io::Result<Vec<u8>> {
	let mut buffer = vec![0u8; size];
	let mut filled = 0;
	while filled < size {
		let read = file.read(&mut buffer[filled..]).await?;
		if read == 0 {
			break;
		}
		filled += read;
	}
	buffer.truncate(filled);
	Ok(buffer)
}

/// Converts an SDK error into a [`BucketError`] of the matching kind.
fn classify<E>(error: SdkError<E, HttpResponse>, action: &str) -> anyhow::Error
where
	E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
	use BucketErrorKind::*;

	let kind = match &error {
		SdkError::ConstructionFailure(_) => Fatal,
		SdkError::DispatchFailure(_) => Unavailable,
		SdkError::ServiceError(context) => match context.raw().status().as_u16() {
			401 | 403 | 404 => Fatal,
			408 | 429 => Transient,
			status if status >= 500 => Transient,
			_ => Rejected,
		},
		_ => Transient,
	};
	let code = error.code().map(|c| format!(" [{c}]")).unwrap_or_default();
	BucketError::new(kind, format!("{action}{code}: {}", DisplayErrorContext(&error))).into()
}

#[async_trait]
impl BucketTrait for S3Bucket {
	fn name(&self) -> &str {
		&self.name
	}

	async fn prepare(&self) -> Result<()> {
		self.create_bucket().await?;
		self.apply_policy().await
	}

	async fn put_object(&self, key: &str, body: Blob, content_type: &str, content_encoding: Option<&str>) -> Result<()> {
		self
			.client
			.put_object()
			.bucket(&self.name)
			.key(key)
			.content_type(content_type)
			.set_content_encoding(content_encoding.map(str::to_string))
			.acl(self.object_acl())
			.body(ByteStream::from(body.into_vec()))
			.send()
			.await
			.map_err(|e| classify(e, &format!("uploading '{key}'")))?;
		Ok(())
	}

	async fn put_file(
		&self,
		key: &str,
		path: &Path,
		content_type: &str,
		progress: &(dyn Fn(u64, u64) + Send + Sync),
	) -> Result<()> {
		let total = tokio::fs::metadata(path)
			.await
			.with_context(|| format!("reading size of {path:?}"))?
			.len();
		if total >= MULTIPART_THRESHOLD {
			return self.put_multipart(key, path, content_type, total, progress).await;
		}

		let body = ByteStream::from_path(path)
			.await
			.with_context(|| format!("reading {path:?}"))?;
		self
			.client
			.put_object()
			.bucket(&self.name)
			.key(key)
			.content_type(content_type)
			.acl(self.object_acl())
			.body(body)
			.send()
			.await
			.map_err(|e| classify(e, &format!("uploading '{key}'")))?;
		progress(total, total);
		Ok(())
	}

	async fn list(&self, prefix: &str) -> Result<Vec<String>> {
		let mut keys = Vec::new();
		let mut pages = self
			.client
			.list_objects_v2()
			.bucket(&self.name)
			.prefix(prefix)
			.into_paginator()
			.send();
		while let Some(page) = pages.next().await {
			let page = page.map_err(|e| classify(e, &format!("listing '{prefix}'")))?;
			keys.extend(page.contents().iter().filter_map(|object| object.key().map(str::to_string)));
		}
		Ok(keys)
	}

	async fn delete(&self, keys: &[String]) -> Result<()> {
		for batch in keys.chunks(DELETE_BATCH) {
			let objects = batch
				.iter()
				.map(|key| ObjectIdentifier::builder().key(key).build())
				.collect::<Result<Vec<_>, _>>()
				.context("building delete request")?;
			let request = Delete::builder()
				.set_objects(Some(objects))
				.quiet(true)
				.build()
				.context("building delete request")?;
			let response = self
				.client
				.delete_objects()
				.bucket(&self.name)
				.delete(request)
				.send()
				.await
				.map_err(|e| classify(e, &format!("deleting {} objects", batch.len())))?;
			if let Some(failed) = response.errors().first() {
				return Err(BucketError::fatal(format!(
					"deleting '{}' failed: {}",
					failed.key().unwrap_or_default(),
					failed.message().unwrap_or_default()
				))
				.into());
			}
		}
		Ok(())
	}
}
