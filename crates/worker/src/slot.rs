use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Outcome of pushing into a [`LatestSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPush {
	/// The slot was empty.
	Stored,
	/// An unconsumed value was overwritten.
	Replaced,
	/// The slot is closed; the value was dropped.
	Closed,
}

struct SlotState<T> {
	value: Option<T>,
	closed: bool,
}

struct SlotInner<T> {
	state: Mutex<SlotState<T>>,
	notify: Notify,
}

/// Bounded mailbox of capacity one with latest-wins overflow.
///
/// Pushing never blocks and never queues more than one value: a push that
/// finds an unconsumed value replaces it.
pub struct LatestSlot<T> {
	inner: Arc<SlotInner<T>>,
}

/// Multi-producer push handle of a [`LatestSlot`].
pub struct SlotSender<T> {
	inner: Arc<SlotInner<T>>,
}

/// Receive handle of a [`LatestSlot`].
pub struct SlotReceiver<T> {
	inner: Arc<SlotInner<T>>,
}

impl<T> Clone for SlotSender<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Clone for SlotReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Default for LatestSlot<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> LatestSlot<T> {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(SlotInner {
				state: Mutex::new(SlotState { value: None, closed: false }),
				notify: Notify::new(),
			}),
		}
	}

	pub fn sender(&self) -> SlotSender<T> {
		SlotSender {
			inner: Arc::clone(&self.inner),
		}
	}

	pub fn receiver(&self) -> SlotReceiver<T> {
		SlotReceiver {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> SlotSender<T> {
	/// Stores `value`, overwriting any unconsumed value.
	pub fn push(&self, value: T) -> SlotPush {
		let mut state = self.inner.state.lock();
		if state.closed {
			return SlotPush::Closed;
		}
		let replaced = state.value.replace(value).is_some();
		drop(state);
		self.inner.notify.notify_one();
		if replaced { SlotPush::Replaced } else { SlotPush::Stored }
	}

	/// Closes the slot. A pending value can still be received once.
	pub fn close(&self) {
		self.inner.state.lock().closed = true;
		self.inner.notify.notify_waiters();
		self.inner.notify.notify_one();
	}
}

impl<T> SlotReceiver<T> {
	/// Waits for the next value. Returns `None` once the slot is closed and
	/// empty.
	pub async fn recv(&self) -> Option<T> {
		loop {
			{
				let mut state = self.inner.state.lock();
				if let Some(value) = state.value.take() {
					return Some(value);
				}
				if state.closed {
					return None;
				}
			}
			// `notify_one` stores a permit, so a push landing between the
			// unlock above and this await is not lost.
			self.inner.notify.notified().await;
		}
	}

	/// Takes the pending value without waiting.
	pub fn take(&self) -> Option<T> {
		self.inner.state.lock().value.take()
	}

	/// Discards the pending value, returning whether one was present.
	pub fn clear(&self) -> bool {
		self.take().is_some()
	}
}
