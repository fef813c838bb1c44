//! Access settings applied to the bucket and to every uploaded object.

use anyhow::{Result, bail};
use serde::Deserialize;
use std::{
	fmt::{self, Display},
	str::FromStr,
};

/// Canned ACL set on each uploaded object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectAcl {
	Private,
	#[default]
	PublicRead,
	PublicReadWrite,
	AuthenticatedRead,
	BucketOwnerRead,
	BucketOwnerFullControl,
}

impl ObjectAcl {
	pub fn as_str(self) -> &'static str {
		match self {
			ObjectAcl::Private => "private",
			ObjectAcl::PublicRead => "public-read",
			ObjectAcl::PublicReadWrite => "public-read-write",
			ObjectAcl::AuthenticatedRead => "authenticated-read",
			ObjectAcl::BucketOwnerRead => "bucket-owner-read",
			ObjectAcl::BucketOwnerFullControl => "bucket-owner-full-control",
		}
	}

	/// The canned ACL for the bucket itself.
	///
	/// The `bucket-owner-*` ACLs only exist for objects, the bucket stays private then.
	pub fn bucket_acl(self) -> &'static str {
		match self {
			ObjectAcl::BucketOwnerRead | ObjectAcl::BucketOwnerFullControl => "private",
			other => other.as_str(),
		}
	}
}

impl FromStr for ObjectAcl {
	type Err = anyhow::Error;

	fn from_str(value: &str) -> Result<ObjectAcl> {
		Ok(match value.trim().to_ascii_lowercase().as_str() {
			"private" => ObjectAcl::Private,
			"public-read" => ObjectAcl::PublicRead,
			"public-read-write" => ObjectAcl::PublicReadWrite,
			"authenticated-read" => ObjectAcl::AuthenticatedRead,
			"bucket-owner-read" => ObjectAcl::BucketOwnerRead,
			"bucket-owner-full-control" => ObjectAcl::BucketOwnerFullControl,
			_ => bail!(
				"unknown ACL '{value}', expected one of: private, public-read, public-read-write, authenticated-read, bucket-owner-read, bucket-owner-full-control"
			),
		})
	}
}

impl Display for ObjectAcl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One CORS rule for the bucket. The default allows `GET` from any origin with any header.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsRule {
	pub allowed_methods: Vec<String>,
	pub allowed_origins: Vec<String>,
	pub allowed_headers: Vec<String>,
	pub max_age_seconds: Option<u32>,
}

impl Default for CorsRule {
	fn default() -> Self {
		CorsRule {
			allowed_methods: vec!["GET".to_string()],
			allowed_origins: vec!["*".to_string()],
			allowed_headers: vec!["*".to_string()],
			max_age_seconds: None,
		}
	}
}

/// ACL for bucket and objects plus an optional CORS rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPolicy {
	pub acl: ObjectAcl,
	pub cors: Option<CorsRule>,
}

impl Default for AccessPolicy {
	fn default() -> Self {
		AccessPolicy {
			acl: ObjectAcl::PublicRead,
			cors: Some(CorsRule::default()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("private", ObjectAcl::Private, "private")]
	#[case("public-read", ObjectAcl::PublicRead, "public-read")]
	#[case(" Public-Read-Write ", ObjectAcl::PublicReadWrite, "public-read-write")]
	#[case("bucket-owner-full-control", ObjectAcl::BucketOwnerFullControl, "private")]
	fn parse_acl(#[case] input: &str, #[case] acl: ObjectAcl, #[case] bucket_acl: &str) -> Result<()> {
		let parsed: ObjectAcl = input.parse()?;
		assert_eq!(parsed, acl);
		assert_eq!(parsed.bucket_acl(), bucket_acl);
		assert_eq!(parsed.to_string().parse::<ObjectAcl>()?, acl);
		Ok(())
	}

	#[test]
	fn unknown_acl() {
		assert!("world-writable".parse::<ObjectAcl>().is_err());
	}

	#[test]
	fn default_policy_is_public_with_cors() {
		let policy = AccessPolicy::default();
		assert_eq!(policy.acl, ObjectAcl::PublicRead);
		let cors = policy.cors.unwrap();
		assert_eq!(cors.allowed_methods, ["GET"]);
		assert_eq!(cors.allowed_origins, ["*"]);
		assert_eq!(cors.allowed_headers, ["*"]);
	}

	#[test]
	fn deserialize_partial_cors_rule() -> Result<()> {
		let rule: CorsRule = serde_yaml_ng::from_str("allowed_origins: [\"https://example.org\"]\nmax_age_seconds: 600")?;
		assert_eq!(rule.allowed_methods, ["GET"]);
		assert_eq!(rule.allowed_origins, ["https://example.org"]);
		assert_eq!(rule.max_age_seconds, Some(600));
		Ok(())
	}
}
