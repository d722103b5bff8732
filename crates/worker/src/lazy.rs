//! Lazily-initialized async values.
//!
//! [`LazyCell`] runs its initializer on the caller's task, at most once at a
//! time, and retries after a failure. [`LazyTask`] starts its initializer on a
//! [`WorkerScope`] the first time it is touched and hands every caller the
//! same [`Deferred`] result.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::{SharedError, WorkerScope};

type BoxInit<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// Snapshot of a [`LazyCell`].
#[derive(Debug, Clone, PartialEq)]
pub enum LazyState<T> {
	Uninitialized,
	Initialized(T),
	/// The latest initialization attempt failed; the next access retries.
	Failed(SharedError),
}

/// Async value computed on first access and cached once it succeeds.
///
/// Concurrent first accesses run the initializer once: the initializing
/// caller holds an async gate, and everyone queued behind it re-checks the
/// state before running the initializer themselves.
pub struct LazyCell<T> {
	state: RwLock<LazyState<T>>,
	gate: tokio::sync::Mutex<()>,
	init: Box<dyn Fn() -> BoxInit<T> + Send + Sync>,
}

impl<T> LazyCell<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub fn new<F, Fut>(init: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
	{
		Self {
			state: RwLock::new(LazyState::Uninitialized),
			gate: tokio::sync::Mutex::new(()),
			init: Box::new(move || -> BoxInit<T> { Box::pin(init()) }),
		}
	}

	pub fn is_initialized(&self) -> bool {
		matches!(&*self.state.read(), LazyState::Initialized(_))
	}

	/// Returns the value if initialization already succeeded.
	pub fn get(&self) -> Option<T> {
		match &*self.state.read() {
			LazyState::Initialized(value) => Some(value.clone()),
			LazyState::Uninitialized | LazyState::Failed(_) => None,
		}
	}

	pub fn state(&self) -> LazyState<T> {
		self.state.read().clone()
	}

	/// Returns the value, running the initializer if needed.
	pub async fn get_or_init(&self) -> Result<T, SharedError> {
		if let Some(value) = self.get() {
			return Ok(value);
		}

		let _gate = self.gate.lock().await;
		if let Some(value) = self.get() {
			return Ok(value);
		}

		match (self.init)().await {
			Ok(value) => {
				*self.state.write() = LazyState::Initialized(value.clone());
				Ok(value)
			}
			Err(err) => {
				let err = SharedError::new(err);
				tracing::debug!(error = %err, "worker.lazy.init_failed");
				*self.state.write() = LazyState::Failed(err.clone());
				Err(err)
			}
		}
	}
}

/// Handle to the single result of a [`LazyTask`].
#[derive(Clone)]
pub struct Deferred<T> {
	rx: watch::Receiver<Option<Result<T, SharedError>>>,
}

impl<T> Deferred<T>
where
	T: Clone,
{
	pub fn is_completed(&self) -> bool {
		self.rx.borrow().is_some()
	}

	/// Waits for the task's result.
	pub async fn wait(&self) -> Result<T, SharedError> {
		let mut rx = self.rx.clone();
		let Ok(result) = rx.wait_for(Option::is_some).await else {
			return Err(SharedError::msg("lazy task ended without a result"));
		};
		match &*result {
			Some(outcome) => outcome.clone(),
			None => Err(SharedError::msg("lazy task ended without a result")),
		}
	}
}

/// Async value whose initializer is spawned on first access.
pub struct LazyTask<T> {
	scope: WorkerScope,
	init: Mutex<Option<BoxInit<T>>>,
	deferred: OnceLock<Deferred<T>>,
}

impl<T> LazyTask<T>
where
	T: Clone + Send + Sync + 'static,
{
	/// Creates the task; nothing runs until [`deferred`](Self::deferred) is
	/// first called.
	pub fn new<Fut>(scope: &WorkerScope, init: Fut) -> Self
	where
		Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
	{
		let init: BoxInit<T> = Box::pin(init);
		Self {
			scope: scope.clone(),
			init: Mutex::new(Some(init)),
			deferred: OnceLock::new(),
		}
	}

	/// Returns true once the initializer has been spawned.
	pub fn is_started(&self) -> bool {
		self.deferred.get().is_some()
	}

	/// Starts the initializer if needed and returns the shared result handle.
	pub fn deferred(&self) -> Deferred<T> {
		self.deferred.get_or_init(|| self.start()).clone()
	}

	fn start(&self) -> Deferred<T> {
		let (tx, rx) = watch::channel(None);
		if let Some(init) = self.init.lock().take() {
			let _ = self.scope.spawn("worker.lazy_task", async move {
				let outcome = init.await.map_err(SharedError::new);
				let _ = tx.send(Some(outcome));
			});
		}
		Deferred { rx }
	}
}
