//! Optional YAML configuration file.
//!
//! Everything in here can also be set on the command line, which takes precedence.
//!
//! ```yaml
//! access:
//!   acl: public-read
//!   cors:
//!     allowed_origins: ["https://example.org"]
//!     max_age_seconds: 86400
//! retry:
//!   retries: 5
//!   base_delay_ms: 100
//! storage:
//!   region: eu-central-1
//!   endpoint_url: http://localhost:9000
//! ```

use anyhow::{Context, Result};
use mbtiles2s3_bucket::{CorsRule, ObjectAcl};
use serde::Deserialize;
use std::{fs::File, io::BufReader, io::Read, path::Path};

#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
	/// ACL and CORS settings
	#[serde(default)]
	pub access: AccessConfig,

	/// Backoff for retryable upload errors
	#[serde(default)]
	pub retry: RetryConfig,

	/// Where the bucket lives
	#[serde(default)]
	pub storage: StorageConfig,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
	pub acl: Option<ObjectAcl>,
	pub cors: Option<CorsRule>,
	/// Do not touch the CORS configuration of the bucket.
	#[serde(default)]
	pub disable_cors: bool,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
	pub retries: Option<u32>,
	pub base_delay_ms: Option<u64>,
	pub max_delay_ms: Option<u64>,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
	pub region: Option<String>,
	pub endpoint_url: Option<String>,
}

impl ConfigFile {
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("opening config file {path:?}"))?;
		ConfigFile::from_reader(BufReader::new(file)).with_context(|| format!("parsing config file {path:?}"))
	}
}
