//! Validated, immutable settings of one export.

use super::ConfigFile;
use anyhow::{Context, Result, ensure};
use mbtiles2s3_bucket::{AccessPolicy, CorsRule, ObjectAcl, RetryPolicy};
use mbtiles2s3_core::PathPrefix;
use regex::Regex;
use std::{path::Path, time::Duration};

pub const DEFAULT_CONCURRENCY: usize = 32;
pub const DEFAULT_GRID_CALLBACK: &str = "grid";

#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
	pub tileset: String,
	pub prefix: PathPrefix,
	/// JSONP callback for metadata and grids; empty means plain JSON.
	pub grid_callback: String,
	pub concurrency: usize,
	pub upload_archive: bool,
	pub upload_image_tiles: bool,
	pub upload_grid_tiles: bool,
	pub remove_first: bool,
	/// Write rows as XYZ instead of the TMS rows stored in MBTiles.
	pub flip_y: bool,
	pub retry: RetryPolicy,
	pub access: AccessPolicy,
}

impl ExportOptions {
	pub fn builder(tileset: &str) -> ExportOptionsBuilder {
		ExportOptionsBuilder::new(tileset)
	}
}

/// Collects settings and checks them in [`ExportOptionsBuilder::build`].
#[derive(Clone, Debug)]
pub struct ExportOptionsBuilder {
	options: ExportOptions,
}

impl ExportOptionsBuilder {
	pub fn new(tileset: &str) -> Self {
		ExportOptionsBuilder {
			options: ExportOptions {
				tileset: tileset.trim().to_string(),
				prefix: PathPrefix::default(),
				grid_callback: DEFAULT_GRID_CALLBACK.to_string(),
				concurrency: DEFAULT_CONCURRENCY,
				upload_archive: true,
				upload_image_tiles: true,
				upload_grid_tiles: true,
				remove_first: false,
				flip_y: false,
				retry: RetryPolicy::default(),
				access: AccessPolicy::default(),
			},
		}
	}

	/// Starts with the file stem of `source` as tileset name.
	pub fn for_source(source: &Path) -> Result<Self> {
		let stem = source
			.file_stem()
			.and_then(|s| s.to_str())
			.with_context(|| format!("cannot derive a tileset name from {source:?}"))?;
		Ok(ExportOptionsBuilder::new(stem))
	}

	pub fn tileset(mut self, tileset: &str) -> Self {
		self.options.tileset = tileset.trim().to_string();
		self
	}

	pub fn prefix(mut self, raw: &str) -> Self {
		self.options.prefix = PathPrefix::parse(raw);
		self
	}

	pub fn grid_callback(mut self, callback: &str) -> Self {
		self.options.grid_callback = callback.trim().to_string();
		self
	}

	pub fn concurrency(mut self, concurrency: usize) -> Self {
		self.options.concurrency = concurrency;
		self
	}

	pub fn upload_archive(mut self, enabled: bool) -> Self {
		self.options.upload_archive = enabled;
		self
	}

	pub fn upload_image_tiles(mut self, enabled: bool) -> Self {
		self.options.upload_image_tiles = enabled;
		self
	}

	pub fn upload_grid_tiles(mut self, enabled: bool) -> Self {
		self.options.upload_grid_tiles = enabled;
		self
	}

	pub fn remove_first(mut self, enabled: bool) -> Self {
		self.options.remove_first = enabled;
		self
	}

	pub fn flip_y(mut self, enabled: bool) -> Self {
		self.options.flip_y = enabled;
		self
	}

	pub fn retries(mut self, retries: u32) -> Self {
		self.options.retry = self.options.retry.with_retries(retries);
		self
	}

	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.options.retry = retry;
		self
	}

	pub fn acl(mut self, acl: ObjectAcl) -> Self {
		self.options.access.acl = acl;
		self
	}

	pub fn cors(mut self, cors: Option<CorsRule>) -> Self {
		self.options.access.cors = cors;
		self
	}

	/// Applies the `access` and `retry` sections of a config file.
	pub fn config_file(mut self, config: &ConfigFile) -> Self {
		if let Some(acl) = config.access.acl {
			self.options.access.acl = acl;
		}
		if config.access.disable_cors {
			self.options.access.cors = None;
		} else if let Some(cors) = &config.access.cors {
			self.options.access.cors = Some(cors.clone());
		}

		let retry = &mut self.options.retry;
		if let Some(retries) = config.retry.retries {
			retry.retries = retries;
		}
		if let Some(ms) = config.retry.base_delay_ms {
			retry.base_delay = Duration::from_millis(ms);
		}
		if let Some(ms) = config.retry.max_delay_ms {
			retry.max_delay = Duration::from_millis(ms);
		}
		self
	}

	pub fn build(self) -> Result<ExportOptions> {
		let options = self.options;

		ensure!(!options.tileset.is_empty(), "tileset name must not be empty");
		ensure!(
			!options.tileset.contains('/'),
			"tileset name '{}' must not contain '/'",
			options.tileset
		);
		ensure!(
			options.grid_callback.is_empty() || Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")?.is_match(&options.grid_callback),
			"invalid grid callback '{}': use letters, digits and '_' only, not starting with a digit",
			options.grid_callback
		);
		ensure!(options.concurrency > 0, "concurrency must be at least 1");
		ensure!(
			options.retry.base_delay <= options.retry.max_delay,
			"retry base delay must not exceed the maximum delay"
		);

		Ok(options)
	}
}
