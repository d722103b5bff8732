use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Join coordination for a task that several handles may want to await.
///
/// The handle stays inside the lock while it is awaited, so a joiner that is
/// dropped mid-wait leaves it in place for the next caller. Concurrent
/// callers queue on the lock. Task output is discarded.
pub struct TaskJoin<R> {
	handle: Mutex<Option<JoinHandle<R>>>,
}

impl<R> TaskJoin<R> {
	pub fn new(handle: JoinHandle<R>) -> Self {
		Self {
			handle: Mutex::new(Some(handle)),
		}
	}

	/// Waits until the task has finished. Safe to call from many callers and
	/// cancel-safe.
	pub async fn join(&self) {
		let mut slot = self.handle.lock().await;
		if let Some(handle) = slot.as_mut() {
			let _ = handle.await;
			// A finished handle must not be polled again.
			*slot = None;
		}
	}
}
