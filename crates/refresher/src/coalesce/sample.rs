use std::time::Duration;

use tokio::time::Instant;

/// Periodic sampling (throttle) state machine.
///
/// Ticks fall on a fixed grid `origin + k * period`. At each tick the most
/// recent value offered since the previous tick is released; ticks with no
/// new value release nothing. The grid does not move when a value is
/// released. A zero period passes values straight through.
#[derive(Debug)]
pub struct Sample<T> {
	period: Duration,
	next_tick: Instant,
	latest: Option<T>,
}

impl<T> Sample<T> {
	/// Creates a sampler whose first tick is one period after `origin`.
	pub fn new(period: Duration, origin: Instant) -> Self {
		Self {
			period,
			next_tick: origin + period,
			latest: None,
		}
	}

	/// Offers a value at `now`. Returns it immediately when sampling is off.
	pub fn offer(&mut self, value: T, now: Instant) -> Option<T> {
		if self.period.is_zero() {
			return Some(value);
		}
		if self.latest.is_none() {
			// Ticks that passed while empty released nothing; skip to the
			// first tick still ahead.
			self.next_tick = self.tick_after(now);
		}
		self.latest = Some(value);
		None
	}

	/// Next tick that will release a value, if one is held.
	pub fn deadline(&self) -> Option<Instant> {
		self.latest.as_ref().map(|_| self.next_tick)
	}

	/// Releases the held value if a tick was reached by `now`.
	pub fn fire(&mut self, now: Instant) -> Option<T> {
		if now < self.next_tick {
			return None;
		}
		let value = self.latest.take()?;
		self.next_tick = self.tick_after(now);
		Some(value)
	}

	/// First grid point strictly after `now`.
	fn tick_after(&self, now: Instant) -> Instant {
		if now < self.next_tick {
			return self.next_tick;
		}
		let behind = now.duration_since(self.next_tick).as_nanos();
		let skipped = behind / self.period.as_nanos() + 1;
		let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);
		match self.period.checked_mul(skipped) {
			Some(offset) => self.next_tick + offset,
			None => now + self.period,
		}
	}
}
