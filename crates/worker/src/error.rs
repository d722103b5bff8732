use std::fmt;
use std::sync::Arc;

/// Cloneable handle to an [`anyhow::Error`].
///
/// Lets one failure be replayed to many observers. Equality is identity: two
/// handles are equal when they share the same underlying error.
#[derive(Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
	pub fn new(err: anyhow::Error) -> Self {
		Self(Arc::new(err))
	}

	/// Builds an error from a plain message.
	pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
		Self::new(anyhow::Error::msg(message))
	}

	pub fn inner(&self) -> &anyhow::Error {
		&self.0
	}

	/// Attempts to view the root error as `E`.
	pub fn downcast_ref<E>(&self) -> Option<&E>
	where
		E: fmt::Display + fmt::Debug + Send + Sync + 'static,
	{
		self.0.downcast_ref::<E>()
	}
}

impl From<anyhow::Error> for SharedError {
	fn from(err: anyhow::Error) -> Self {
		Self::new(err)
	}
}

impl PartialEq for SharedError {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for SharedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.0, f)
	}
}

impl fmt::Display for SharedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&*self.0, f)
	}
}

impl std::error::Error for SharedError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		self.0.source()
	}
}
