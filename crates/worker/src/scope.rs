use std::future::Future;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Concurrency scope owning a tree of spawned tasks.
///
/// A scope pairs the caller's tokio runtime handle with a cancellation token.
/// The scope never creates its own thread pool; the caller decides where work
/// runs. Cancelling a scope cancels every [`child`](Self::child) scope, and
/// tasks spawned through [`spawn`](Self::spawn) are dropped at their next
/// await point.
#[derive(Debug, Clone)]
pub struct WorkerScope {
	handle: Handle,
	cancel: CancellationToken,
}

impl WorkerScope {
	/// Creates a root scope on the given runtime.
	pub fn new(handle: Handle) -> Self {
		Self {
			handle,
			cancel: CancellationToken::new(),
		}
	}

	/// Creates a root scope on the runtime of the calling context.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime, like [`tokio::spawn`].
	pub fn current() -> Self {
		Self::new(Handle::current())
	}

	/// Fallible form of [`current`](Self::current).
	pub fn try_current() -> Result<Self, TryCurrentError> {
		Handle::try_current().map(Self::new)
	}

	/// Derives a child scope on the same runtime.
	///
	/// The child is cancelled with its parent but can be cancelled on its own.
	pub fn child(&self) -> Self {
		Self {
			handle: self.handle.clone(),
			cancel: self.cancel.child_token(),
		}
	}

	/// Returns the runtime handle tasks are spawned on.
	pub fn handle(&self) -> &Handle {
		&self.handle
	}

	/// Returns the scope's cancellation token.
	pub fn token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Tears the scope down.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns true once the scope (or an ancestor) was torn down.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Resolves when the scope is torn down.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Spawns `fut` bound to this scope.
	///
	/// The task output is `None` when the scope was torn down before `fut`
	/// completed.
	pub fn spawn<F>(&self, task: &'static str, fut: F) -> JoinHandle<Option<F::Output>>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		tracing::trace!(task, "worker.spawn");
		let cancel = self.cancel.clone();
		self.handle.spawn(async move {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => None,
				out = fut => Some(out),
			}
		})
	}
}
