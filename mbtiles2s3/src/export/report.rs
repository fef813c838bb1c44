use super::ExportState;
use mbtiles2s3_bucket::PhaseSummary;
use std::fmt::{self, Display};

/// What an export did, phase by phase. Skipped phases are `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
	pub state: ExportState,
	/// Keys handed to the bucket for deletion before uploading.
	pub removed: Option<u64>,
	pub metadata: Option<PhaseSummary>,
	pub image_tiles: Option<PhaseSummary>,
	pub grid_tiles: Option<PhaseSummary>,
	pub archive: Option<PhaseSummary>,
}

impl Default for ExportReport {
	fn default() -> Self {
		ExportReport {
			state: ExportState::Idle,
			removed: None,
			metadata: None,
			image_tiles: None,
			grid_tiles: None,
			archive: None,
		}
	}
}

impl ExportReport {
	fn phases(&self) -> [(&'static str, Option<PhaseSummary>); 4] {
		[
			("metadata", self.metadata),
			("image tiles", self.image_tiles),
			("grid tiles", self.grid_tiles),
			("archive", self.archive),
		]
	}

	pub fn uploaded(&self) -> u64 {
		self.phases().iter().filter_map(|(_, s)| *s).map(|s| s.uploaded).sum()
	}

	pub fn failed(&self) -> u64 {
		self.phases().iter().filter_map(|(_, s)| *s).map(|s| s.failed).sum()
	}
}

impl Display for ExportReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "export {}", self.state)?;
		if let Some(removed) = self.removed {
			writeln!(f, "  removed:     {removed} objects")?;
		}
		for (name, summary) in self.phases() {
			match summary {
				Some(s) => writeln!(f, "  {:<12} {} uploaded, {} failed", format!("{name}:"), s.uploaded, s.failed)?,
				None => writeln!(f, "  {:<12} skipped", format!("{name}:"))?,
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn totals_and_display() {
		let report = ExportReport {
			state: ExportState::Done,
			removed: Some(3),
			metadata: Some(PhaseSummary { uploaded: 2, failed: 0 }),
			image_tiles: Some(PhaseSummary { uploaded: 10, failed: 1 }),
			grid_tiles: Some(PhaseSummary { uploaded: 4, failed: 2 }),
			archive: None,
		};
		assert_eq!(report.uploaded(), 16);
		assert_eq!(report.failed(), 3);
		assert_eq!(
			report.to_string(),
			"export done
  removed:     3 objects
  metadata:    2 uploaded, 0 failed
  image tiles: 10 uploaded, 1 failed
  grid tiles:  4 uploaded, 2 failed
  archive:     skipped
"
		);
	}
}
