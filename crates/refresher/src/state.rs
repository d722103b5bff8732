use loom_worker::SharedError;
use thiserror::Error;

/// Published lifecycle of a refresher's value.
///
/// `Uninitialized` is only ever the initial state. Every accepted trigger
/// publishes `Loading` followed by exactly one of `Loaded` or `Failed`, unless
/// a newer trigger supersedes it first.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LifecycleState<T> {
	/// No refresh has run yet.
	#[default]
	Uninitialized,
	/// An invocation is in flight.
	Loading,
	/// Result of the latest successful invocation, possibly edited by mutators.
	Loaded(T),
	/// The latest invocation failed.
	Failed(RefreshFailure),
}

impl<T> LifecycleState<T> {
	pub fn is_uninitialized(&self) -> bool {
		matches!(self, Self::Uninitialized)
	}

	pub fn is_loading(&self) -> bool {
		matches!(self, Self::Loading)
	}

	pub fn is_loaded(&self) -> bool {
		matches!(self, Self::Loaded(_))
	}

	pub fn is_failed(&self) -> bool {
		matches!(self, Self::Failed(_))
	}

	/// Returns the loaded value, if any.
	pub fn value(&self) -> Option<&T> {
		match self {
			Self::Loaded(value) => Some(value),
			Self::Uninitialized | Self::Loading | Self::Failed(_) => None,
		}
	}

	/// Returns the failure, if any.
	pub fn failure(&self) -> Option<&RefreshFailure> {
		match self {
			Self::Failed(failure) => Some(failure),
			Self::Uninitialized | Self::Loading | Self::Loaded(_) => None,
		}
	}

	/// Maps the loaded value, keeping every other phase as is.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LifecycleState<U> {
		match self {
			Self::Uninitialized => LifecycleState::Uninitialized,
			Self::Loading => LifecycleState::Loading,
			Self::Loaded(value) => LifecycleState::Loaded(f(value)),
			Self::Failed(failure) => LifecycleState::Failed(failure),
		}
	}

	pub(crate) const fn phase(&self) -> &'static str {
		match self {
			Self::Uninitialized => "uninitialized",
			Self::Loading => "loading",
			Self::Loaded(_) => "loaded",
			Self::Failed(_) => "failed",
		}
	}
}

/// Error carried by [`LifecycleState::Failed`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefreshFailure {
	/// The producer returned an error.
	#[error(transparent)]
	Producer(SharedError),
	/// The producer panicked.
	#[error("producer panicked: {0}")]
	Panicked(String),
}

impl RefreshFailure {
	/// Returns the producer's error, if the producer returned one.
	pub fn error(&self) -> Option<&anyhow::Error> {
		match self {
			Self::Producer(err) => Some(err.inner()),
			Self::Panicked(_) => None,
		}
	}

	/// Attempts to view the producer's root error as `E`.
	pub fn downcast_ref<E>(&self) -> Option<&E>
	where
		E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
	{
		match self {
			Self::Producer(err) => err.downcast_ref::<E>(),
			Self::Panicked(_) => None,
		}
	}
}

impl From<anyhow::Error> for RefreshFailure {
	fn from(err: anyhow::Error) -> Self {
		Self::Producer(SharedError::new(err))
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn default_is_uninitialized() {
		let state = LifecycleState::<u8>::default();
		assert!(state.is_uninitialized());
		assert_eq!(state.value(), None);
	}

	#[test]
	fn map_only_touches_loaded_value() {
		assert_eq!(LifecycleState::Loaded(2).map(|v| v * 10), LifecycleState::Loaded(20));
		assert_eq!(LifecycleState::<u8>::Loading.map(|v| v * 10), LifecycleState::Loading);
	}

	#[derive(Debug, thiserror::Error)]
	#[error("rate limited")]
	struct RateLimited;

	#[test]
	fn failure_keeps_producer_error() {
		let failure = RefreshFailure::from(anyhow::Error::new(RateLimited).context("fetching prices"));
		assert_eq!(failure.to_string(), "fetching prices");
		assert!(failure.downcast_ref::<RateLimited>().is_some());
		assert_eq!(format!("{:#}", failure.error().unwrap()), "fetching prices: rate limited");
	}

	#[test]
	fn failures_compare_by_identity() {
		let failure = RefreshFailure::from(anyhow::anyhow!("boom"));
		let copy = failure.clone();
		assert_eq!(failure, copy);
		assert_ne!(failure, RefreshFailure::from(anyhow::anyhow!("boom")));
		assert_eq!(RefreshFailure::Panicked("x".into()), RefreshFailure::Panicked("x".into()));
	}
}
