use std::fmt::{self, Display};

/// Progress of an [`Exporter`](super::Exporter).
///
/// States only ever move forward. A skipped phase still passes its state, so `Done` always
/// follows `ArchiveUploaded`. `Aborted` can be entered from any state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportState {
	Idle,
	BucketReady,
	StoreOpen,
	RemovedPrior,
	MetadataUploaded,
	ImagesUploaded,
	GridsUploaded,
	ArchiveUploaded,
	Done,
	Aborted,
}

impl ExportState {
	pub fn is_finished(self) -> bool {
		matches!(self, ExportState::Done | ExportState::Aborted)
	}
}

impl Display for ExportState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ExportState::Idle => "idle",
			ExportState::BucketReady => "bucket ready",
			ExportState::StoreOpen => "store open",
			ExportState::RemovedPrior => "previous export removed",
			ExportState::MetadataUploaded => "metadata uploaded",
			ExportState::ImagesUploaded => "image tiles uploaded",
			ExportState::GridsUploaded => "grid tiles uploaded",
			ExportState::ArchiveUploaded => "archive uploaded",
			ExportState::Done => "done",
			ExportState::Aborted => "aborted",
		})
	}
}
