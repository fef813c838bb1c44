//! Terminal progress reporting for the export phases.
//!
//! Every phase of an export owns one [`ProgressBar`]. Handles are cheap to clone and can be
//! advanced from many upload workers at once; the position is kept in an atomic counter and the
//! terminal line is redrawn at most twice per second.
//!
//! # Examples
//!
//! ```rust
//! use mbtiles2s3_core::progress::*;
//!
//! let progress = get_progress_bar("Uploading 10 image tiles", 10);
//! progress.inc(3);
//! progress.set_position(7);
//! progress.finish();
//! ```

mod progress_bar;

pub use progress_bar::ProgressBar;

/// Creates a progress bar with a message and a maximum value.
#[must_use]
pub fn get_progress_bar(message: &str, max_value: u64) -> ProgressBar {
	ProgressBar::new(message, max_value)
}
