use std::future::Future;
use std::time::Duration;

use loom_worker::WorkerScope;
use tokio::sync::watch;

use crate::config::DEFAULT_STOP_TIMEOUT;

/// When the refresh pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "snake_case"))]
pub enum SharingPolicy {
	/// Runs from construction until teardown.
	Eager,
	/// Runs while at least one [`StateObserver`](crate::StateObserver) is
	/// alive, and for `stop_timeout` after the last one goes away.
	///
	/// The published value survives idling; a restart re-runs the producer.
	WhileObserved {
		#[cfg_attr(feature = "serde", serde(rename = "stop_timeout_ms", with = "crate::config::millis"))]
		stop_timeout: Duration,
	},
}

impl Default for SharingPolicy {
	fn default() -> Self {
		Self::WhileObserved {
			stop_timeout: DEFAULT_STOP_TIMEOUT,
		}
	}
}

/// Starts and stops `pipeline` sessions according to `policy`.
///
/// Each session gets a child of `scope`; it is cancelled and awaited before
/// the next session starts. Returns once `scope` is cancelled or the observer
/// count holder is dropped.
pub(crate) async fn run_gate<F, Fut>(policy: SharingPolicy, mut observers: watch::Receiver<usize>, scope: WorkerScope, mut pipeline: F)
where
	F: FnMut(WorkerScope) -> Fut,
	Fut: Future<Output = ()>,
{
	let stop_timeout = match policy {
		SharingPolicy::Eager => {
			run_session(&scope, &mut pipeline).await;
			return;
		}
		SharingPolicy::WhileObserved { stop_timeout } => stop_timeout,
	};

	loop {
		tokio::select! {
			biased;
			_ = scope.cancelled() => return,
			observed = wait_until(&mut observers, |count| count > 0) => if !observed {
				return;
			},
		}

		let session = scope.child();
		tracing::debug!(policy = "while_observed", "refresher.pipeline.start");
		let run = pipeline(session.clone());
		tokio::pin!(run);

		let finished = loop {
			tokio::select! {
				biased;
				_ = &mut run => break true,
				observed = wait_until(&mut observers, |count| count == 0) => if !observed {
					break false;
				},
			}
			tracing::trace!(?stop_timeout, "refresher.pipeline.unobserved");
			tokio::select! {
				biased;
				_ = &mut run => break true,
				observed = wait_until(&mut observers, |count| count > 0) => if !observed {
					break false;
				},
				_ = tokio::time::sleep(stop_timeout) => break false,
			}
		};

		session.cancel();
		if !finished {
			run.await;
		}
		tracing::debug!(cancelled = scope.is_cancelled(), "refresher.pipeline.stop");
		if scope.is_cancelled() {
			return;
		}
	}
}

async fn run_session<F, Fut>(scope: &WorkerScope, pipeline: &mut F)
where
	F: FnMut(WorkerScope) -> Fut,
	Fut: Future<Output = ()>,
{
	let session = scope.child();
	tracing::debug!(policy = "eager", "refresher.pipeline.start");
	pipeline(session.clone()).await;
	session.cancel();
	tracing::debug!(policy = "eager", "refresher.pipeline.stop");
}

/// Waits until the observer count satisfies `ready`. Returns false once the
/// count holder is gone.
async fn wait_until(observers: &mut watch::Receiver<usize>, mut ready: impl FnMut(usize) -> bool) -> bool {
	// `wait_for` still succeeds on a closed channel whose last value matches.
	if observers.has_changed().is_err() {
		return false;
	}
	observers.wait_for(|count| ready(*count)).await.is_ok()
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	struct Sessions {
		started: AtomicUsize,
		stopped: AtomicUsize,
	}

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	/// Spawns a gate whose sessions only count starts and stops.
	fn spawn_gate(policy: SharingPolicy, observers: watch::Receiver<usize>, scope: &WorkerScope) -> Arc<Sessions> {
		let sessions = Arc::new(Sessions {
			started: AtomicUsize::new(0),
			stopped: AtomicUsize::new(0),
		});
		let counter = Arc::clone(&sessions);
		tokio::spawn(run_gate(policy, observers, scope.clone(), move |session: WorkerScope| {
			let counter = Arc::clone(&counter);
			counter.started.fetch_add(1, Ordering::SeqCst);
			async move {
				session.cancelled().await;
				counter.stopped.fetch_add(1, Ordering::SeqCst);
			}
		}));
		sessions
	}

	fn counts(sessions: &Sessions) -> (usize, usize) {
		(sessions.started.load(Ordering::SeqCst), sessions.stopped.load(Ordering::SeqCst))
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn eager_runs_until_scope_cancelled() {
		let scope = WorkerScope::current();
		let (_tx, rx) = watch::channel(0);
		let sessions = spawn_gate(SharingPolicy::Eager, rx, &scope);

		tokio::time::sleep(ms(10)).await;
		assert_eq!(counts(&sessions), (1, 0));

		scope.cancel();
		tokio::time::sleep(ms(10)).await;
		assert_eq!(counts(&sessions), (1, 1));
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn while_observed_waits_for_first_observer() {
		let scope = WorkerScope::current();
		let (tx, rx) = watch::channel(0);
		let sessions = spawn_gate(SharingPolicy::WhileObserved { stop_timeout: ms(100) }, rx, &scope);

		tokio::time::sleep(ms(10)).await;
		assert_eq!(counts(&sessions), (0, 0));

		tx.send_replace(1);
		tokio::time::sleep(ms(10)).await;
		assert_eq!(counts(&sessions), (1, 0));
		scope.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn grace_period_keeps_session_alive() {
		let scope = WorkerScope::current();
		let (tx, rx) = watch::channel(1);
		let sessions = spawn_gate(SharingPolicy::WhileObserved { stop_timeout: ms(100) }, rx, &scope);
		tokio::time::sleep(ms(10)).await;

		tx.send_replace(0);
		tokio::time::sleep(ms(50)).await;
		tx.send_replace(1);
		tokio::time::sleep(ms(200)).await;
		assert_eq!(counts(&sessions), (1, 0));

		tx.send_replace(0);
		tokio::time::sleep(ms(150)).await;
		assert_eq!(counts(&sessions), (1, 1));

		tx.send_replace(1);
		tokio::time::sleep(ms(10)).await;
		assert_eq!(counts(&sessions), (2, 1));
		scope.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn dropping_count_holder_ends_gate() {
		let scope = WorkerScope::current();
		let (tx, rx) = watch::channel(1);
		let sessions = spawn_gate(SharingPolicy::WhileObserved { stop_timeout: ms(100) }, rx, &scope);
		tokio::time::sleep(ms(10)).await;

		drop(tx);
		tokio::time::sleep(ms(10)).await;
		assert_eq!(counts(&sessions), (1, 1));
		assert!(!scope.is_cancelled());
	}
}
