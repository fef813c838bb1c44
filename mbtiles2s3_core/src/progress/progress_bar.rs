//! Lightweight terminal progress bar.
//!
//! Renders `{message}▕{bar}▏{pos}/{len} ({percent}%) {speed} {eta}` to stderr, with
//! sub-character precision in the bar. Output is suppressed in tests.

use std::sync::{
	Arc, Mutex,
	atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

struct DrawState {
	message: String,
	start: Instant,
	next_draw: Instant,
}

struct Inner {
	position: AtomicU64,
	len: AtomicU64,
	finished: AtomicBool,
	display: Mutex<DrawState>,
}

/// A progress bar handle, cloneable and safe to advance from concurrent workers.
#[derive(Clone)]
pub struct ProgressBar {
	inner: Arc<Inner>,
}

impl ProgressBar {
	/// Initialize the bar with a message and maximum value.
	pub fn new(message: &str, max_value: u64) -> ProgressBar {
		let now = Instant::now();
		let progress = ProgressBar {
			inner: Arc::new(Inner {
				position: AtomicU64::new(0),
				len: AtomicU64::new(max_value),
				finished: AtomicBool::new(false),
				display: Mutex::new(DrawState {
					message: message.to_string(),
					start: now,
					next_draw: now,
				}),
			}),
		};
		progress.redraw(true);
		progress
	}

	pub fn position(&self) -> u64 {
		self.inner.position.load(Ordering::Acquire)
	}

	pub fn max_value(&self) -> u64 {
		self.inner.len.load(Ordering::Acquire)
	}

	/// Set the absolute position, clamped to the maximum value.
	pub fn set_position(&self, value: u64) {
		self.inner.position.store(value.min(self.max_value()), Ordering::Release);
		self.redraw(false);
	}

	/// Update the maximum value.
	pub fn set_max_value(&self, value: u64) {
		self.inner.len.store(value, Ordering::Release);
		let _ = self
			.inner
			.position
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |pos| Some(pos.min(value)));
		self.redraw(false);
	}

	/// Increment by `value`, clamped to the maximum value.
	pub fn inc(&self, value: u64) {
		let len = self.max_value();
		let _ = self
			.inner
			.position
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |pos| Some(pos.saturating_add(value).min(len)));
		self.redraw(false);
	}

	/// Finish the bar: set position to the maximum and end the line.
	pub fn finish(&self) {
		self.inner.position.store(self.max_value(), Ordering::Release);
		if !self.inner.finished.swap(true, Ordering::AcqRel) {
			self.redraw(true);
			write_stderr("\n");
		}
	}

	fn redraw(&self, force: bool) {
		// Workers must never wait for the terminal; whoever holds the lock is drawing anyway.
		let Ok(mut display) = self.inner.display.try_lock() else {
			return;
		};
		let now = Instant::now();
		if !force && now < display.next_draw {
			return;
		}
		display.next_draw = now + Duration::from_millis(500);

		let len = self.max_value();
		let pos = self.position();
		let line = render_line(&display.message, pos, len, display.start.elapsed(), terminal_width());
		write_stderr(&format!("\r\x1b[2K{line}"));
	}
}

#[allow(unused_variables)]
fn write_stderr(text: &str) {
	#[cfg(not(any(test, feature = "test")))]
	{
		use std::io::Write;
		let mut output = std::io::stderr();
		let _ = write!(output, "{text}");
		let _ = output.flush();
	}
}

fn render_line(message: &str, pos: u64, len: u64, elapsed: Duration, width: usize) -> String {
	let len = len.max(1);
	let pos = pos.min(len);
	let seconds = elapsed.as_secs_f64();
	let per_sec = if seconds > 0.0 { pos as f64 / seconds } else { 0.0 };
	let eta_secs = if pos > 0 {
		(seconds * ((len - pos) as f64 / pos as f64)).max(0.0)
	} else {
		0.0
	};

	let percent = (pos as f64 * 100.0 / len as f64).floor() as u64;
	let per_sec_str = format_rate(per_sec);
	let eta_str = format_eta(Duration::from_secs_f64(eta_secs));

	let get_line = |bar_str: &str| format!("{message}▕{bar_str}▏{pos}/{len} ({percent:>3}%) {per_sec_str:>5} {eta_str:>5}");

	let bar_width = width.saturating_sub(get_line("").chars().count()).max(10);
	get_line(&make_bar(pos, len, bar_width))
}

fn terminal_width() -> usize {
	if let Some((width, _)) = terminal_size::terminal_size() {
		return (width.0 as usize).max(10);
	}
	80
}

fn make_bar(pos: u64, len: u64, width: usize) -> String {
	let width = width.max(1);
	let frac = (pos as f64 / len.max(1) as f64).clamp(0.0, 1.0);
	let exact = frac * (width as f64);
	let whole = exact.floor() as usize;
	let rem = exact - whole as f64;

	// thickest first
	let partials = ["█", "▉", "▊", "▋", "▌", "▍", "▎", "▏"];

	let mut s = "█".repeat(whole.min(width));
	if whole < width {
		let idx = (rem * 8.0).floor() as usize;
		if idx > 0 {
			s.push_str(partials[8 - idx.min(7)]);
		} else {
			s.push(' ');
		}
		s.push_str(&" ".repeat(width - whole - 1));
	}
	s
}

fn format_rate(per_sec: f64) -> String {
	if per_sec.is_finite() {
		human_number(per_sec) + "/s"
	} else {
		"--/s".to_string()
	}
}

fn human_number(v: f64) -> String {
	let abs = v.abs();
	if abs >= 1_000_000_000.0 {
		format!("{:.1}G", v / 1_000_000_000.0)
	} else if abs >= 1_000_000.0 {
		format!("{:.1}M", v / 1_000_000.0)
	} else if abs >= 1_000.0 {
		format!("{:.1}k", v / 1_000.0)
	} else {
		format!("{v:.0}")
	}
}

fn format_eta(d: Duration) -> String {
	let total = d.as_secs();
	let days = total / 86_400;
	let hours = (total % 86_400) / 3_600;
	let minutes = (total % 3_600) / 60;
	let seconds = total % 60;

	if total < 60 {
		format!("{seconds}s")
	} else if total < 3_600 {
		format!("{minutes:02}:{seconds:02}")
	} else if total < 86_400 {
		format!("{hours}:{minutes:02}:{seconds:02}")
	} else {
		format!("{days}d{hours:02}h")
	}
}
