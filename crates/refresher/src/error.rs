use thiserror::Error;

/// Errors surfaced by the refresher's own API.
///
/// Producer failures are never returned here; they are published as
/// [`LifecycleState::Failed`](crate::LifecycleState::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefresherError {
	/// The refresher was shut down or dropped.
	#[error("refresher is closed")]
	Closed,
	/// Construction was attempted outside a tokio runtime.
	#[error("no tokio runtime is available to run the refresher")]
	NoRuntime,
}

pub type Result<T> = std::result::Result<T, RefresherError>;
