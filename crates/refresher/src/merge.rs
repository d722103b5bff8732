use std::panic::{AssertUnwindSafe, catch_unwind};

use loom_worker::panic_payload_message;
use tokio::sync::watch;

use crate::LifecycleState;

/// Pure transform of a loaded value.
pub type Mutator<T> = Box<dyn FnOnce(&T) -> T + Send>;

/// Result of merging one mutator into the published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeOutcome {
	/// A different value was published.
	Applied,
	/// The mutator returned an equal value; nothing was published.
	Unchanged,
	/// The state was not `Loaded`; the mutator was discarded.
	NotLoaded,
	/// The mutator panicked; the state was left as is.
	Panicked,
}

/// Applies `mutator` to the currently published state.
///
/// Runs inside the holder's write lock so it cannot interleave with a state
/// transition published by the executor. Observers are notified only for
/// [`MergeOutcome::Applied`].
pub(crate) fn merge<T>(state: &watch::Sender<LifecycleState<T>>, mutator: Mutator<T>) -> MergeOutcome
where
	T: PartialEq,
{
	let mut outcome = MergeOutcome::NotLoaded;
	state.send_if_modified(|current| match current {
		LifecycleState::Loaded(value) => match catch_unwind(AssertUnwindSafe(|| mutator(&*value))) {
			Ok(next) if next == *value => {
				outcome = MergeOutcome::Unchanged;
				false
			}
			Ok(next) => {
				*value = next;
				outcome = MergeOutcome::Applied;
				true
			}
			Err(payload) => {
				tracing::warn!(panic = %panic_payload_message(payload.as_ref()), "refresher.mutator.panicked");
				outcome = MergeOutcome::Panicked;
				false
			}
		},
		LifecycleState::Uninitialized | LifecycleState::Loading | LifecycleState::Failed(_) => false,
	});
	outcome
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::RefreshFailure;

	fn holder(state: LifecycleState<i32>) -> (watch::Sender<LifecycleState<i32>>, watch::Receiver<LifecycleState<i32>>) {
		let (tx, mut rx) = watch::channel(state);
		rx.mark_unchanged();
		(tx, rx)
	}

	#[test]
	fn loaded_value_is_transformed() {
		let (tx, rx) = holder(LifecycleState::Loaded(5));
		assert_eq!(merge(&tx, Box::new(|v: &i32| v + 1)), MergeOutcome::Applied);
		assert!(rx.has_changed().unwrap());
		assert_eq!(*rx.borrow(), LifecycleState::Loaded(6));
	}

	#[test]
	fn equal_result_does_not_notify() {
		let (tx, rx) = holder(LifecycleState::Loaded(5));
		assert_eq!(merge(&tx, Box::new(|v: &i32| *v)), MergeOutcome::Unchanged);
		assert!(!rx.has_changed().unwrap());
	}

	#[test]
	fn non_loaded_states_are_left_alone() {
		let states = [
			LifecycleState::Uninitialized,
			LifecycleState::Loading,
			LifecycleState::Failed(RefreshFailure::Panicked("boom".into())),
		];
		for state in states {
			let (tx, rx) = holder(state.clone());
			assert_eq!(merge(&tx, Box::new(|v: &i32| v + 1)), MergeOutcome::NotLoaded);
			assert!(!rx.has_changed().unwrap());
			assert_eq!(*rx.borrow(), state);
		}
	}

	#[test]
	fn panicking_mutator_keeps_state() {
		let (tx, rx) = holder(LifecycleState::Loaded(1));
		let outcome = merge(&tx, Box::new(|_: &i32| -> i32 { panic!("bad edit") }));
		assert_eq!(outcome, MergeOutcome::Panicked);
		assert_eq!(*rx.borrow(), LifecycleState::Loaded(1));
	}
}
