//! Object storage for exported tiles.
//!
//! Everything the exporter writes goes through [`BucketTrait`]. Two backends exist:
//!
//! - [`MemoryBucket`]: keeps objects in memory, always compiled, instrumented for tests
//! - [`S3Bucket`]: Amazon S3 or any S3 compatible store (feature `s3`, on by default)
//!
//! [`UploadExecutor`] runs many uploads against a bucket with bounded concurrency and retries.

mod error;
pub mod executor;
mod memory;
mod policy;
#[cfg(feature = "s3")]
mod s3;
mod traits;

pub use error::{BucketError, BucketErrorKind};
pub use executor::{Outcome, PhaseSummary, RetryPolicy, UploadBody, UploadExecutor, UploadTask};
pub use memory::{BucketEvent, MemoryBucket, StoredObject};
pub use policy::{AccessPolicy, CorsRule, ObjectAcl};
#[cfg(feature = "s3")]
pub use s3::{S3Bucket, S3Config};
pub use traits::{BucketTrait, ByteProgress};
