use std::sync::Arc;

use loom_worker::{GenerationClock, GenerationToken, SlotReceiver, WorkerScope, join_error_panic_message};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::merge::{MergeOutcome, merge};
use crate::produce::{ProduceContext, ProducerFn};
use crate::{LifecycleState, Mutator, RefreshFailure, TriggerSignal};

type InvocationOutput<T> = Result<Option<anyhow::Result<T>>, JoinError>;

/// One running producer invocation.
///
/// Dropping it cancels the generation token and aborts the task.
struct Invocation<T> {
	token: GenerationToken,
	task: JoinHandle<Option<anyhow::Result<T>>>,
}

impl<T> Drop for Invocation<T> {
	fn drop(&mut self) {
		self.token.cancel();
		self.task.abort();
	}
}

/// Single actor owning the lifecycle transitions of one pipeline session.
///
/// All state writes of a session happen on the task running
/// [`run`](Self::run), so transitions and mutator merges never interleave.
pub(crate) struct Executor<T> {
	name: Arc<str>,
	scope: WorkerScope,
	producer: ProducerFn<T>,
	state: Arc<watch::Sender<LifecycleState<T>>>,
	clock: GenerationClock,
	inflight: Option<Invocation<T>>,
}

impl<T> Executor<T>
where
	T: PartialEq + Send + Sync + 'static,
{
	pub(crate) fn new(
		name: Arc<str>,
		scope: WorkerScope,
		producer: ProducerFn<T>,
		state: Arc<watch::Sender<LifecycleState<T>>>,
		clock: GenerationClock,
	) -> Self {
		Self {
			name,
			scope,
			producer,
			state,
			clock,
			inflight: None,
		}
	}

	/// Runs until the session scope is cancelled or `signals` closes.
	///
	/// An initial automatic signal is executed right away.
	pub(crate) async fn run(mut self, signals: SlotReceiver<TriggerSignal>, mutators: SlotReceiver<Mutator<T>>) {
		let scope = self.scope.clone();
		self.start(TriggerSignal::Automatic);

		loop {
			tokio::select! {
				biased;
				_ = scope.cancelled() => break,
				signal = signals.recv() => match signal {
					Some(signal) => self.start(signal),
					None => break,
				},
				(generation, output) = join_inflight(&mut self.inflight), if self.inflight.is_some() => {
					self.settle(generation, output);
				}
				mutator = mutators.recv() => match mutator {
					Some(mutator) => self.apply(mutator),
					None => break,
				},
			}
		}

		self.inflight = None;
	}

	/// Supersedes the in-flight invocation and starts a new one.
	fn start(&mut self, signal: TriggerSignal) {
		if let Some(previous) = self.inflight.take() {
			tracing::trace!(name = &*self.name, generation = previous.token.generation(), "refresher.invocation.superseded");
		}

		let token = self.clock.issue(self.scope.token());
		tracing::debug!(
			name = &*self.name,
			generation = token.generation(),
			from_user = signal.is_user_initiated(),
			signal = signal.as_str(),
			"refresher.invocation.start"
		);

		self.state.send_if_modified(|state| {
			if state.is_loading() {
				return false;
			}
			*state = LifecycleState::Loading;
			true
		});

		let ctx = ProduceContext::new(signal, token.clone());
		let task = self.scope.spawn("refresher.invocation", (self.producer)(ctx));
		self.inflight = Some(Invocation { token, task });
	}

	/// Publishes the outcome of a finished invocation.
	///
	/// Only the current invocation can get here: `start` drops (cancels and
	/// aborts) its predecessor before spawning, so no stale generation ever
	/// completes.
	fn settle(&mut self, generation: u64, output: InvocationOutput<T>) {
		self.inflight = None;

		let next = match output {
			Ok(Some(Ok(value))) => LifecycleState::Loaded(value),
			Ok(Some(Err(err))) => {
				tracing::warn!(name = &*self.name, generation, error = %format!("{err:#}"), "refresher.invocation.failed");
				LifecycleState::Failed(RefreshFailure::from(err))
			}
			// Scope torn down while the producer ran.
			Ok(None) => return,
			Err(err) => match join_error_panic_message(err) {
				Some(message) => {
					tracing::warn!(name = &*self.name, generation, panic = %message, "refresher.invocation.failed");
					LifecycleState::Failed(RefreshFailure::Panicked(message))
				}
				None => return,
			},
		};
		tracing::trace!(name = &*self.name, generation, phase = next.phase(), "refresher.invocation.settled");
		self.state.send_replace(next);
	}

	fn apply(&self, mutator: Mutator<T>) {
		match merge(&self.state, mutator) {
			MergeOutcome::Applied => tracing::trace!(name = &*self.name, "refresher.mutator.applied"),
			MergeOutcome::Unchanged => tracing::trace!(name = &*self.name, "refresher.mutator.unchanged"),
			MergeOutcome::NotLoaded => tracing::trace!(name = &*self.name, "refresher.mutator.dropped"),
			MergeOutcome::Panicked => {}
		}
	}
}

async fn join_inflight<T>(inflight: &mut Option<Invocation<T>>) -> (u64, InvocationOutput<T>) {
	match inflight {
		Some(invocation) => {
			let output = (&mut invocation.task).await;
			(invocation.token.generation(), output)
		}
		None => std::future::pending().await,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use loom_worker::LatestSlot;
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::produce::{Superseded, boxed};

	struct Rig {
		scope: WorkerScope,
		state: watch::Receiver<LifecycleState<u32>>,
		signals: loom_worker::SlotSender<TriggerSignal>,
		mutators: loom_worker::SlotSender<Mutator<u32>>,
	}

	fn rig(producer: ProducerFn<u32>) -> Rig {
		let scope = WorkerScope::current();
		let (tx, state) = watch::channel(LifecycleState::Uninitialized);
		let signals = LatestSlot::new();
		let mutators = LatestSlot::new();
		let executor = Executor::new("test".into(), scope.clone(), producer, Arc::new(tx), GenerationClock::new());
		tokio::spawn(executor.run(signals.receiver(), mutators.receiver()));
		Rig {
			scope,
			state,
			signals: signals.sender(),
			mutators: mutators.sender(),
		}
	}

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn initial_signal_loads_value() {
		let mut rig = rig(boxed(|_ctx| async { Ok(5) }));

		let state = rig.state.wait_for(LifecycleState::is_loaded).await.unwrap().clone();
		assert_eq!(state, LifecycleState::Loaded(5));
		rig.scope.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn newer_signal_supersedes_inflight() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&calls);
		let mut rig = rig(boxed(move |ctx: ProduceContext| {
			let call = counter.fetch_add(1, Ordering::SeqCst) as u32;
			async move {
				if call == 0 {
					tokio::time::sleep(ms(100)).await;
				} else {
					tokio::time::sleep(ms(10)).await;
				}
				ctx.checkpoint()?;
				Ok(call)
			}
		}));

		tokio::time::sleep(ms(5)).await;
		rig.signals.push(TriggerSignal::UserInitiated);
		tokio::time::sleep(ms(200)).await;

		assert_eq!(*rig.state.borrow_and_update(), LifecycleState::Loaded(1));
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		rig.scope.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn superseded_error_from_live_token_is_a_failure() {
		let mut rig = rig(boxed(|_ctx| async { Err::<u32, anyhow::Error>(Superseded.into()) }));

		let state = rig.state.wait_for(LifecycleState::is_failed).await.unwrap().clone();
		assert!(state.failure().unwrap().downcast_ref::<Superseded>().is_some());
		rig.scope.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn mutator_applies_to_loaded_state() {
		let mut rig = rig(boxed(|_ctx| async { Ok(5) }));
		rig.state.wait_for(LifecycleState::is_loaded).await.unwrap();

		rig.mutators.push(Box::new(|v: &u32| v + 1));
		rig.state.changed().await.unwrap();
		assert_eq!(*rig.state.borrow(), LifecycleState::Loaded(6));
		rig.scope.cancel();
	}

	#[tokio::test(flavor = "current_thread", start_paused = true)]
	async fn cancelled_scope_aborts_producer() {
		let finished = Arc::new(AtomicUsize::new(0));
		let flag = Arc::clone(&finished);
		let rig = rig(boxed(move |_ctx| {
			let flag = Arc::clone(&flag);
			async move {
				tokio::time::sleep(ms(50)).await;
				flag.fetch_add(1, Ordering::SeqCst);
				Ok(1)
			}
		}));

		tokio::time::sleep(ms(10)).await;
		rig.scope.cancel();
		tokio::time::sleep(ms(100)).await;

		assert_eq!(finished.load(Ordering::SeqCst), 0);
		assert_eq!(*rig.state.borrow(), LifecycleState::Loading);
	}
}
