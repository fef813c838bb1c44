use anyhow::{Context, Result, bail, ensure};
use mbtiles2s3::{
	config::{ConfigFile, DEFAULT_CONCURRENCY, DEFAULT_GRID_CALLBACK, ExportOptions, ExportOptionsBuilder},
	export::Exporter,
};
use mbtiles2s3_bucket::{ObjectAcl, S3Bucket, S3Config};
use mbtiles2s3_container::MBTilesStore;
use std::{path::PathBuf, sync::Arc};

/// Environment variables that have to be set before anything is sent to S3.
const CREDENTIALS: [&str; 2] = ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"];

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Arguments {
	/// MBTiles file to export
	#[arg()]
	source: PathBuf,

	/// S3 bucket to export into; created if it does not exist
	#[arg()]
	bucket: String,

	/// path inside the bucket to put the tileset into
	#[arg(long, short, default_value = "", display_order = 1)]
	path: String,

	/// name of the tileset; defaults to the file name of the source without extension
	#[arg(long, short, value_name = "NAME", display_order = 1)]
	tileset_name: Option<String>,

	/// JSONP callback for metadata and grids, use "" for plain JSON
	#[arg(long, short, default_value = DEFAULT_GRID_CALLBACK, display_order = 1)]
	grid_callback: String,

	/// number of uploads running at the same time
	#[arg(long, short, value_name = "int", default_value_t = DEFAULT_CONCURRENCY, display_order = 2)]
	concurrency: usize,

	/// remove a previous export of the tileset first
	#[arg(long, short, display_order = 2)]
	remove_first: bool,

	/// how often a failed upload is retried
	#[arg(long, value_name = "int", display_order = 2)]
	retries: Option<u32>,

	/// do not upload the MBTiles file itself
	#[arg(long, display_order = 3)]
	dont_upload_mbtiles: bool,

	/// do not upload image tiles
	#[arg(long, display_order = 3)]
	dont_upload_image_tiles: bool,

	/// do not upload grid tiles
	#[arg(long, display_order = 3)]
	dont_upload_grid_tiles: bool,

	/// write tile rows as XYZ instead of TMS
	#[arg(long, display_order = 3)]
	flip_y: bool,

	/// canned ACL of the bucket and its objects, e.g. public-read or private
	#[arg(long, value_name = "ACL", display_order = 4)]
	acl: Option<ObjectAcl>,

	/// leave the CORS configuration of the bucket untouched
	#[arg(long, display_order = 4)]
	no_cors: bool,

	/// YAML file with access, retry and storage settings
	#[arg(long, value_name = "FILE", display_order = 4)]
	config: Option<PathBuf>,

	/// AWS region of the bucket
	#[arg(long, display_order = 5)]
	region: Option<String>,

	/// custom S3 endpoint, e.g. a MinIO server
	#[arg(long, value_name = "URL", display_order = 5)]
	endpoint_url: Option<String>,

	/// exit with an error if any object failed to upload
	#[arg(long, display_order = 6)]
	strict: bool,
}

#[tokio::main]
pub async fn run(arguments: &Arguments) -> Result<()> {
	let config = match &arguments.config {
		Some(path) => ConfigFile::from_path(path)?,
		None => ConfigFile::default(),
	};
	let options = export_options(arguments, &config)?;

	ensure!(
		arguments.source.is_file(),
		"MBTiles file {:?} does not exist",
		arguments.source
	);
	// a broken source must fail before the bucket is touched
	MBTilesStore::open(&arguments.source)?;
	check_credentials()?;

	let bucket = S3Bucket::connect(S3Config {
		bucket: arguments.bucket.clone(),
		region: arguments.region.clone().or_else(|| config.storage.region.clone()),
		endpoint_url: arguments
			.endpoint_url
			.clone()
			.or_else(|| config.storage.endpoint_url.clone()),
		policy: options.access.clone(),
	})
	.await
	.context("connecting to S3")?;

	eprintln!(
		"export {:?} as '{}' to bucket '{}'",
		arguments.source, options.tileset, arguments.bucket
	);

	let mut exporter = Exporter::new(options, Arc::new(bucket));
	let report = exporter.run(&arguments.source).await?;
	eprint!("{report}");

	if arguments.strict && report.failed() > 0 {
		bail!("{} objects failed to upload", report.failed());
	}
	Ok(())
}

fn export_options(arguments: &Arguments, config: &ConfigFile) -> Result<ExportOptions> {
	let builder = match &arguments.tileset_name {
		Some(name) => ExportOptionsBuilder::new(name),
		None => ExportOptionsBuilder::for_source(&arguments.source)?,
	};
	let mut builder = builder
		.config_file(config)
		.prefix(&arguments.path)
		.grid_callback(&arguments.grid_callback)
		.concurrency(arguments.concurrency)
		.remove_first(arguments.remove_first)
		.upload_archive(!arguments.dont_upload_mbtiles)
		.upload_image_tiles(!arguments.dont_upload_image_tiles)
		.upload_grid_tiles(!arguments.dont_upload_grid_tiles)
		.flip_y(arguments.flip_y);

	if let Some(acl) = arguments.acl {
		builder = builder.acl(acl);
	}
	if arguments.no_cors {
		builder = builder.cors(None);
	}
	if let Some(retries) = arguments.retries {
		builder = builder.retries(retries);
	}
	builder.build()
}

fn check_credentials() -> Result<()> {
	let missing: Vec<&str> = CREDENTIALS
		.into_iter()
		.filter(|name| std::env::var_os(name).is_none_or(|value| value.is_empty()))
		.collect();
	if !missing.is_empty() {
		bail!("AWS credentials missing, set {}", missing.join(" and "));
	}
	Ok(())
}
