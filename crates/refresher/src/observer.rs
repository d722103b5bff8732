use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{RefresherError, Result};
use crate::LifecycleState;

/// Counted registration keeping a shared pipeline alive.
pub(crate) struct ObserverLease {
	count: Arc<watch::Sender<usize>>,
}

impl ObserverLease {
	pub(crate) fn acquire(count: &Arc<watch::Sender<usize>>) -> Self {
		count.send_modify(|n| *n += 1);
		Self { count: Arc::clone(count) }
	}
}

impl Clone for ObserverLease {
	fn clone(&self) -> Self {
		Self::acquire(&self.count)
	}
}

impl Drop for ObserverLease {
	fn drop(&mut self) {
		self.count.send_modify(|n| *n = n.saturating_sub(1));
	}
}

/// Live subscription to a refresher's state.
///
/// Observers replay the latest state: the first [`changed`](Self::changed)
/// returns the current state without waiting. Intermediate states published
/// between two reads are conflated. While any observer is alive a
/// [`SharingPolicy::WhileObserved`](crate::SharingPolicy::WhileObserved)
/// pipeline keeps running.
#[derive(Clone)]
pub struct StateObserver<T> {
	rx: watch::Receiver<LifecycleState<T>>,
	replayed: bool,
	_lease: ObserverLease,
}

impl<T> StateObserver<T>
where
	T: Clone,
{
	pub(crate) fn new(mut rx: watch::Receiver<LifecycleState<T>>, lease: ObserverLease) -> Self {
		rx.mark_unchanged();
		Self {
			rx,
			replayed: false,
			_lease: lease,
		}
	}

	/// Current state, without marking it as seen.
	pub fn current(&self) -> LifecycleState<T> {
		self.rx.borrow().clone()
	}

	/// Waits for a state this observer has not seen yet.
	///
	/// Returns [`RefresherError::Closed`] once the refresher is gone and every
	/// published state was seen.
	pub async fn changed(&mut self) -> Result<LifecycleState<T>> {
		if !self.replayed {
			self.replayed = true;
			return Ok(self.rx.borrow_and_update().clone());
		}
		self.rx.changed().await.map_err(|_| RefresherError::Closed)?;
		Ok(self.rx.borrow_and_update().clone())
	}

	/// Waits until the state satisfies `ready`, checking the current state
	/// first.
	pub async fn wait_for(&mut self, ready: impl FnMut(&LifecycleState<T>) -> bool) -> Result<LifecycleState<T>> {
		self.replayed = true;
		let state = self.rx.wait_for(ready).await.map_err(|_| RefresherError::Closed)?;
		Ok(state.clone())
	}

	/// True when a state was published since the last read.
	pub fn has_changed(&self) -> Result<bool> {
		self.rx.has_changed().map_err(|_| RefresherError::Closed)
	}
}

impl<T> std::fmt::Debug for StateObserver<T>
where
	T: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StateObserver").field("state", &*self.rx.borrow()).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn leases_track_observer_count() {
		let count = Arc::new(watch::Sender::new(0));
		let (_tx, rx) = watch::channel(LifecycleState::<u8>::Uninitialized);

		let first = StateObserver::new(rx.clone(), ObserverLease::acquire(&count));
		let second = first.clone();
		assert_eq!(*count.borrow(), 2);

		drop(first);
		assert_eq!(*count.borrow(), 1);
		drop(second);
		assert_eq!(*count.borrow(), 0);
	}

	#[tokio::test(flavor = "current_thread")]
	async fn first_changed_replays_current_state() {
		let count = Arc::new(watch::Sender::new(0));
		let (tx, rx) = watch::channel(LifecycleState::Loaded(3u8));
		let mut observer = StateObserver::new(rx, ObserverLease::acquire(&count));

		assert_eq!(observer.changed().await.unwrap(), LifecycleState::Loaded(3));
		assert!(!observer.has_changed().unwrap());

		tx.send_replace(LifecycleState::Loading);
		assert_eq!(observer.changed().await.unwrap(), LifecycleState::Loading);

		drop(tx);
		assert_eq!(observer.changed().await, Err(RefresherError::Closed));
	}
}
