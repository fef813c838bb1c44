//! The export itself.
//!
//! [`Exporter::run`] walks through the phases one after another:
//!
//! 1. prepare the bucket (create it, apply ACL and CORS)
//! 2. open the MBTiles file
//! 3. optionally remove a previous export of the same tileset
//! 4. upload the metadata document twice (`{tileset}.json`, `{tileset}/metadata.json`)
//! 5. upload image tiles
//! 6. upload grid tiles
//! 7. upload the MBTiles file
//!
//! Every phase finishes all of its uploads before the next one starts. Failed items are
//! counted in the [`ExportReport`]; fatal errors move the exporter to
//! [`ExportState::Aborted`] and end the run.

mod producer;
mod report;
mod state;

pub use report::ExportReport;
pub use state::ExportState;

use crate::config::ExportOptions;
use anyhow::{Context, Result, ensure};
use futures::stream;
use mbtiles2s3_bucket::{BucketTrait, PhaseSummary, UploadExecutor, UploadTask};
use mbtiles2s3_container::{GridTileRow, MBTilesStore};
use mbtiles2s3_core::{
	KeyBuilder, ObjectKind, TileCoord,
	compression::{ENCODING_GZIP, is_gzip},
	grid::assemble_grid,
	json::wrap_jsonp,
	progress::get_progress_bar,
};
use producer::produce;
use serde_json::Value;
use std::{path::Path, sync::Arc};

const DELETE_BATCH: usize = 1000;

pub struct Exporter {
	options: ExportOptions,
	bucket: Arc<dyn BucketTrait>,
	executor: UploadExecutor,
	state: ExportState,
	report: ExportReport,
}

impl Exporter {
	pub fn new(options: ExportOptions, bucket: Arc<dyn BucketTrait>) -> Exporter {
		let executor = UploadExecutor::new(Arc::clone(&bucket), options.concurrency).with_retry(options.retry);
		Exporter {
			options,
			bucket,
			executor,
			state: ExportState::Idle,
			report: ExportReport::default(),
		}
	}

	pub fn options(&self) -> &ExportOptions {
		&self.options
	}

	pub fn state(&self) -> ExportState {
		self.state
	}

	/// The report so far; complete once the exporter is `Done` or `Aborted`.
	pub fn report(&self) -> &ExportReport {
		&self.report
	}

	/// Exports the MBTiles file at `source`. An exporter runs only once.
	pub async fn run(&mut self, source: &Path) -> Result<ExportReport> {
		ensure!(self.state == ExportState::Idle, "exporter has already run ({})", self.state);
		log::debug!("export {source:?} as '{}' into bucket '{}'", self.options.tileset, self.bucket.name());

		match self.run_phases(source).await {
			Ok(()) => Ok(self.report.clone()),
			Err(error) => {
				let reached = self.state;
				self.advance(ExportState::Aborted);
				Err(error.context(format!(
					"export of '{}' aborted after state '{reached}'",
					self.options.tileset
				)))
			}
		}
	}

	fn advance(&mut self, next: ExportState) {
		debug_assert!(next > self.state, "state must move forward: {} -> {next}", self.state);
		log::debug!("state {} -> {next}", self.state);
		self.state = next;
		self.report.state = next;
	}

	fn channel_capacity(&self) -> usize {
		self.options.concurrency.saturating_mul(2)
	}

	async fn run_phases(&mut self, source: &Path) -> Result<()> {
		self.prepare_bucket().await?;
		self.advance(ExportState::BucketReady);

		log::info!("connecting to MBTiles {source:?}");
		let store = Arc::new(MBTilesStore::open(source)?);
		self.advance(ExportState::StoreOpen);

		let keys = KeyBuilder::new(&self.options.tileset, self.options.prefix.clone())?
			.with_image_format(store.image_format()?)
			.with_jsonp(!self.options.grid_callback.is_empty());

		if self.options.remove_first {
			self.remove_prior(&keys).await?;
		}
		self.advance(ExportState::RemovedPrior);

		self.upload_metadata(&store, &keys).await?;
		self.advance(ExportState::MetadataUploaded);

		if self.options.upload_image_tiles {
			self.report.image_tiles = Some(self.upload_image_tiles(&store, &keys).await?);
		} else {
			log::info!("skipping image tiles");
		}
		self.advance(ExportState::ImagesUploaded);

		if self.options.upload_grid_tiles {
			self.report.grid_tiles = Some(self.upload_grid_tiles(&store, &keys).await?);
		} else {
			log::info!("skipping grid tiles");
		}
		self.advance(ExportState::GridsUploaded);

		if self.options.upload_archive {
			self.report.archive = Some(self.upload_archive(&store, &keys).await?);
		} else {
			log::info!("skipping MBTiles file");
		}
		self.advance(ExportState::ArchiveUploaded);

		self.advance(ExportState::Done);
		Ok(())
	}

	async fn prepare_bucket(&self) -> Result<()> {
		log::info!("preparing bucket '{}'", self.bucket.name());
		let bucket = &self.bucket;
		self
			.options
			.retry
			.run("preparing bucket", || bucket.prepare())
			.await
			.with_context(|| format!("preparing bucket '{}'", bucket.name()))
	}

	async fn remove_prior(&mut self, keys: &KeyBuilder) -> Result<()> {
		let bucket = &self.bucket;
		let retry = self.options.retry;
		let prefix = keys.removal_prefix();

		let mut doomed = retry
			.run("listing previous export", || bucket.list(&prefix))
			.await
			.with_context(|| format!("listing '{prefix}'"))?;
		// only count the sibling objects that really exist
		for key in keys.removal_keys() {
			let found = retry
				.run("looking up previous export", || bucket.list(&key))
				.await
				.with_context(|| format!("looking up '{key}'"))?;
			if found.contains(&key) {
				doomed.push(key);
			}
		}

		let progress = get_progress_bar(
			&format!("- Removing old export, {}", keys.tileset()),
			doomed.len() as u64,
		);
		for batch in doomed.chunks(DELETE_BATCH) {
			retry
				.run("removing previous export", || bucket.delete(batch))
				.await
				.context("removing previous export")?;
			progress.inc(batch.len() as u64);
		}
		progress.finish();

		self.report.removed = Some(doomed.len() as u64);
		Ok(())
	}

	async fn upload_metadata(&mut self, store: &MBTilesStore, keys: &KeyBuilder) -> Result<()> {
		let metadata = store.read_metadata().context("reading metadata")?;
		let document = Value::Object(metadata.into_iter().collect());
		let (body, content_type) = wrap_jsonp(&document, &self.options.grid_callback);

		let tasks = [ObjectKind::MetadataRoot, ObjectKind::MetadataNested]
			.map(|kind| Ok::<_, anyhow::Error>(UploadTask::blob(keys.key(&kind), body.clone(), content_type)));

		let progress = get_progress_bar("- Uploading metadata", tasks.len() as u64);
		let summary = self.executor.run(stream::iter(tasks), Some(&progress)).await?;
		progress.finish();

		self.report.metadata = Some(summary);
		Ok(())
	}

	async fn upload_image_tiles(&self, store: &Arc<MBTilesStore>, keys: &KeyBuilder) -> Result<PhaseSummary> {
		let count = store.count_image_tiles()?;
		let progress = get_progress_bar(&format!("- Uploading {count} image tiles"), count);

		let (tasks, producer) = {
			let store = Arc::clone(store);
			let keys = keys.clone();
			let exporter = self.row_mapper();
			produce(self.channel_capacity(), move |emit| {
				store.for_each_image_tile(|row| {
					emit(row.and_then(|row| {
						let kind = ObjectKind::ImageTile(exporter.coord(row.coord)?);
						let gzipped = is_gzip(&row.data);
						let task = UploadTask::blob(keys.key(&kind), row.data, keys.content_type(&kind));
						Ok(if gzipped { task.with_content_encoding(ENCODING_GZIP) } else { task })
					}))
				})
			})
		};

		let summary = self.executor.run(tasks, Some(&progress)).await;
		let scanned = producer.await.context("image tile reader stopped unexpectedly")?;
		let summary = summary?;
		scanned.context("reading image tiles")?;
		progress.finish();

		Ok(summary)
	}

	async fn upload_grid_tiles(&self, store: &Arc<MBTilesStore>, keys: &KeyBuilder) -> Result<PhaseSummary> {
		let count = store.count_grid_tiles();
		if count == 0 {
			log::info!("no grid tiles found");
			return Ok(PhaseSummary::default());
		}
		let progress = get_progress_bar(&format!("- Uploading {count} grid tiles"), count);

		let (tasks, producer) = {
			let store = Arc::clone(store);
			let keys = keys.clone();
			let callback = self.options.grid_callback.clone();
			let exporter = self.row_mapper();
			produce(self.channel_capacity(), move |emit| {
				store.for_each_grid_tile(|row| {
					emit(row.and_then(|GridTileRow { coord, grid, overlay }| {
						let (body, content_type) =
							assemble_grid(&grid, overlay, &callback).with_context(|| format!("assembling grid tile {coord:?}"))?;
						let kind = ObjectKind::GridTile(exporter.coord(coord)?);
						Ok(UploadTask::blob(keys.key(&kind), body, content_type))
					}))
				})
			})
		};

		let summary = self.executor.run(tasks, Some(&progress)).await;
		let scanned = producer.await.context("grid tile reader stopped unexpectedly")?;
		let summary = summary?;
		if let Err(error) = scanned {
			log::warn!("grid tiles could not be read completely: {error:#}");
		}
		progress.finish();

		Ok(summary)
	}

	async fn upload_archive(&self, store: &MBTilesStore, keys: &KeyBuilder) -> Result<PhaseSummary> {
		let total = store.file_size()?;
		let progress = get_progress_bar("- Uploading MBTiles file", total);

		let bar = progress.clone();
		let task = UploadTask::file(
			keys.key(&ObjectKind::Archive),
			store.path().to_path_buf(),
			keys.content_type(&ObjectKind::Archive),
			Some(Arc::new(move |sent, _total| bar.set_position(sent))),
		);
		let summary = self.executor.run(stream::iter([Ok::<_, anyhow::Error>(task)]), None).await?;
		progress.finish();

		Ok(summary)
	}

	fn row_mapper(&self) -> RowMapper {
		RowMapper {
			flip_y: self.options.flip_y,
		}
	}
}

/// The part of the options the row producers need on their thread.
#[derive(Clone, Copy)]
struct RowMapper {
	flip_y: bool,
}

impl RowMapper {
	fn coord(self, mut coord: TileCoord) -> Result<TileCoord> {
		if self.flip_y {
			coord.flip_y()?;
		}
		Ok(coord)
	}
}

impl std::fmt::Debug for Exporter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Exporter")
			.field("tileset", &self.options.tileset)
			.field("bucket", &self.bucket.name())
			.field("state", &self.state)
			.finish()
	}
}
