use std::time::Duration;

use tokio::time::Instant;

/// Trailing-edge debounce state machine.
///
/// Each pushed value replaces the pending one and restarts the quiet window;
/// the pending value is released once `interval` passes without a push. A zero
/// interval passes values straight through.
#[derive(Debug)]
pub struct Debounce<T> {
	interval: Duration,
	pending: Option<(T, Instant)>,
}

impl<T> Debounce<T> {
	pub fn new(interval: Duration) -> Self {
		Self { interval, pending: None }
	}

	/// Offers a value at `now`. Returns it immediately when debouncing is off.
	pub fn push(&mut self, value: T, now: Instant) -> Option<T> {
		if self.interval.is_zero() {
			return Some(value);
		}
		self.pending = Some((value, now + self.interval));
		None
	}

	/// When the pending value becomes due.
	pub fn deadline(&self) -> Option<Instant> {
		self.pending.as_ref().map(|(_, due)| *due)
	}

	/// Releases the pending value if its window elapsed by `now`.
	pub fn fire(&mut self, now: Instant) -> Option<T> {
		match self.pending.take() {
			Some((value, due)) if due <= now => Some(value),
			other => {
				self.pending = other;
				None
			}
		}
	}

	pub fn is_idle(&self) -> bool {
		self.pending.is_none()
	}
}
