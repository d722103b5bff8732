//! Trigger coalescing: debounce followed by periodic sampling.

mod debounce;
mod sample;

use std::time::Duration;

pub use debounce::Debounce;
use loom_worker::{SlotReceiver, SlotSender};
pub use sample::Sample;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Two-stage rate limiter between trigger producers and the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coalescer {
	debounce: Duration,
	throttle: Duration,
}

impl Coalescer {
	pub fn new(debounce: Duration, throttle: Duration) -> Self {
		Self { debounce, throttle }
	}

	/// Moves values from `input` to `output` until cancelled or `input`
	/// closes. `output` is closed on return.
	///
	/// The sampling grid is anchored at the moment this starts running.
	pub async fn run<T>(self, input: SlotReceiver<T>, output: SlotSender<T>, cancel: CancellationToken)
	where
		T: Send,
	{
		let mut debounce = Debounce::new(self.debounce);
		let mut sample = Sample::new(self.throttle, Instant::now());

		loop {
			let debounce_due = debounce.deadline();
			let sample_due = sample.deadline();
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				_ = sleep_until(debounce_due) => {
					let now = Instant::now();
					if let Some(value) = debounce.fire(now)
						&& let Some(value) = sample.offer(value, now)
					{
						output.push(value);
					}
				}
				_ = sleep_until(sample_due) => {
					if let Some(value) = sample.fire(Instant::now()) {
						output.push(value);
					}
				}
				value = input.recv() => {
					let Some(value) = value else {
						break;
					};
					let now = Instant::now();
					if let Some(value) = debounce.push(value, now)
						&& let Some(value) = sample.offer(value, now)
					{
						output.push(value);
					}
				}
			}
		}
		output.close();
		tracing::trace!(pending = !debounce.is_idle(), "refresher.coalescer.stop");
	}
}

async fn sleep_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex};

	use loom_worker::LatestSlot;

	use super::*;

	type Emitted = Arc<Mutex<Vec<(Instant, u32)>>>;

	struct Harness {
		input: SlotSender<u32>,
		emitted: Emitted,
		cancel: CancellationToken,
		origin: Instant,
	}

	impl Harness {
		/// Runs `coalescer` and records every emitted value with its time.
		fn start(coalescer: Coalescer) -> Self {
			let input = LatestSlot::new();
			let output = LatestSlot::new();
			let cancel = CancellationToken::new();
			let emitted = Emitted::default();

			tokio::spawn(coalescer.run(input.receiver(), output.sender(), cancel.clone()));
			let rx = output.receiver();
			let sink = Arc::clone(&emitted);
			tokio::spawn(async move {
				while let Some(value) = rx.recv().await {
					sink.lock().unwrap().push((Instant::now(), value));
				}
			});

			Self {
				input: input.sender(),
				emitted,
				cancel,
				origin: Instant::now(),
			}
		}

		fn emitted(&self) -> Vec<(Duration, u32)> {
			self.emitted.lock().unwrap().iter().map(|(at, v)| (*at - self.origin, *v)).collect()
		}
	}

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn debounce_collapses_burst_into_one_signal() {
		let harness = Harness::start(Coalescer::new(ms(50), Duration::ZERO));
		tokio::task::yield_now().await;

		harness.input.push(1);
		tokio::time::sleep(ms(20)).await;
		harness.input.push(2);
		tokio::time::sleep(ms(20)).await;
		harness.input.push(3);
		tokio::time::sleep(ms(200)).await;

		assert_eq!(harness.emitted(), vec![(ms(90), 3)]);
		harness.cancel.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn throttle_limits_rate_to_one_per_period() {
		let harness = Harness::start(Coalescer::new(Duration::ZERO, ms(100)));
		tokio::task::yield_now().await;

		for n in 0..50 {
			harness.input.push(n);
			tokio::time::sleep(ms(10)).await;
		}
		tokio::time::sleep(ms(200)).await;

		let emitted = harness.emitted();
		assert!(!emitted.is_empty());
		assert!(emitted.len() <= 5, "emitted {emitted:?}");
		for pair in emitted.windows(2) {
			assert!(pair[1].0 - pair[0].0 >= ms(100), "emitted {emitted:?}");
		}
		assert_eq!(emitted.last().map(|(_, v)| *v), Some(49));
		harness.cancel.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn passthrough_forwards_immediately() {
		let harness = Harness::start(Coalescer::new(Duration::ZERO, Duration::ZERO));
		tokio::task::yield_now().await;

		harness.input.push(42);
		tokio::time::sleep(ms(1)).await;

		assert_eq!(harness.emitted(), vec![(Duration::ZERO, 42)]);
		harness.cancel.cancel();
	}
}
