use std::future::Future;
use std::sync::Arc;

use loom_worker::{GenerationClock, LatestSlot, SlotPush, SlotSender, TaskJoin, WorkerScope};
use tokio::sync::watch;

use crate::coalesce::Coalescer;
use crate::error::{RefresherError, Result};
use crate::executor::Executor;
use crate::observer::{ObserverLease, StateObserver};
use crate::produce::{self, ProduceContext};
use crate::sharing::run_gate;
use crate::{LifecycleState, Mutator, RefresherConfig, TriggerSignal};

struct RefresherInner<T> {
	name: Arc<str>,
	signals: SlotSender<TriggerSignal>,
	mutators: SlotSender<Mutator<T>>,
	state: watch::Receiver<LifecycleState<T>>,
	observers: Arc<watch::Sender<usize>>,
	scope: WorkerScope,
	join: TaskJoin<()>,
}

impl<T> Drop for RefresherInner<T> {
	fn drop(&mut self) {
		self.scope.cancel();
		self.signals.close();
		self.mutators.close();
	}
}

/// Observable, refreshable result of an async producer.
///
/// Handles are cheap to clone and share one pipeline. The pipeline is torn
/// down when the owning scope is cancelled, on [`shutdown`](Self::shutdown),
/// or when the last handle is dropped.
pub struct Refresher<T> {
	inner: Arc<RefresherInner<T>>,
}

impl<T> Clone for Refresher<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Refresher<T>
where
	T: Clone + PartialEq + Send + Sync + 'static,
{
	/// Creates a refresher whose tasks run on a child of `scope`.
	pub fn new<F, Fut>(scope: &WorkerScope, config: RefresherConfig, producer: F) -> Self
	where
		F: Fn(ProduceContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
	{
		let name: Arc<str> = Arc::from(config.label());
		let scope = scope.child();
		let producer = produce::boxed(producer);
		let (state_tx, state) = watch::channel(LifecycleState::Uninitialized);
		let state_tx = Arc::new(state_tx);
		let observers = Arc::new(watch::Sender::new(0usize));
		let signals = LatestSlot::new();
		let mutators = LatestSlot::new();
		let coalescer = Coalescer::new(config.debounce_interval(), config.throttle_period());
		let clock = GenerationClock::new();

		let pipeline = {
			let name = Arc::clone(&name);
			let signals = signals.receiver();
			let mutators = mutators.receiver();
			move |session: WorkerScope| {
				// Each session opens with its own invocation, which subsumes
				// anything queued while idle.
				let stale_signal = signals.clear();
				let stale_mutator = mutators.clear();
				if stale_signal || stale_mutator {
					tracing::trace!(name = &*name, stale_signal, stale_mutator, "refresher.signal.dropped");
				}

				let coalesced = LatestSlot::new();
				let executor = Executor::new(
					Arc::clone(&name),
					session.clone(),
					Arc::clone(&producer),
					Arc::clone(&state_tx),
					clock.clone(),
				);
				let signals = signals.clone();
				let mutators = mutators.clone();
				async move {
					tokio::join!(
						coalescer.run(signals, coalesced.sender(), session.token().clone()),
						executor.run(coalesced.receiver(), mutators),
					);
				}
			}
		};

		let gate = run_gate(config.sharing_policy(), observers.subscribe(), scope.clone(), pipeline);
		let join = TaskJoin::new(scope.handle().spawn(gate));
		tracing::debug!(name = &*name, policy = ?config.sharing_policy(), "refresher.created");

		Self {
			inner: Arc::new(RefresherInner {
				name,
				signals: signals.sender(),
				mutators: mutators.sender(),
				state,
				observers,
				scope,
				join,
			}),
		}
	}

	/// Creates a refresher with the default configuration on the current
	/// runtime.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime. See
	/// [`try_spawn`](Self::try_spawn).
	pub fn spawn<F, Fut>(producer: F) -> Self
	where
		F: Fn(ProduceContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
	{
		Self::new(&WorkerScope::current(), RefresherConfig::default(), producer)
	}

	/// Fallible form of [`spawn`](Self::spawn) taking an explicit config.
	pub fn try_spawn<F, Fut>(config: RefresherConfig, producer: F) -> Result<Self>
	where
		F: Fn(ProduceContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
	{
		let scope = WorkerScope::try_current().map_err(|_| RefresherError::NoRuntime)?;
		Ok(Self::new(&scope, config, producer))
	}

	/// Snapshot of the published state. Does not keep the pipeline alive.
	pub fn state(&self) -> LifecycleState<T> {
		self.inner.state.borrow().clone()
	}

	/// Subscribes to state changes, replaying the current state first.
	pub fn observe(&self) -> StateObserver<T> {
		StateObserver::new(self.inner.state.clone(), ObserverLease::acquire(&self.inner.observers))
	}

	/// Requests a new producer invocation. Never blocks.
	///
	/// Bursts are coalesced; an unconsumed request is replaced by this one.
	pub fn refresh(&self, from_user: bool) {
		let signal = TriggerSignal::from_user(from_user);
		match self.inner.signals.push(signal) {
			SlotPush::Stored => {}
			SlotPush::Replaced => tracing::trace!(name = &*self.inner.name, signal = signal.as_str(), "refresher.signal.dropped"),
			SlotPush::Closed => tracing::trace!(name = &*self.inner.name, "refresher.signal.closed"),
		}
	}

	/// Applies `modifier` to the loaded value without re-running the
	/// producer. Never blocks.
	///
	/// The modifier is dropped if the state is not `Loaded` when it is
	/// merged. Only the latest unconsumed modifier is kept.
	pub fn update<F>(&self, modifier: F)
	where
		F: FnOnce(&T) -> T + Send + 'static,
	{
		if self.inner.mutators.push(Box::new(modifier)) == SlotPush::Replaced {
			tracing::trace!(name = &*self.inner.name, "refresher.mutator.replaced");
		}
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	/// Number of live [`StateObserver`]s.
	pub fn observer_count(&self) -> usize {
		*self.inner.observers.borrow()
	}

	pub fn is_closed(&self) -> bool {
		self.inner.scope.is_cancelled()
	}

	/// Tears the pipeline down and waits for its tasks to finish.
	///
	/// The last published state stays readable; observers see
	/// [`RefresherError::Closed`] once they have read it.
	pub async fn shutdown(&self) {
		self.inner.scope.cancel();
		self.inner.signals.close();
		self.inner.mutators.close();
		self.inner.join.join().await;
		tracing::debug!(name = &*self.inner.name, "refresher.shutdown");
	}
}

impl<T> std::fmt::Debug for Refresher<T>
where
	T: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Refresher")
			.field("name", &self.inner.name)
			.field("state", &*self.inner.state.borrow())
			.field("observers", &*self.inner.observers.borrow())
			.finish_non_exhaustive()
	}
}
