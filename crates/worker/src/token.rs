use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation clock shared by everything that tags work with a
/// generation.
///
/// Generation `0` means "nothing issued yet"; [`advance`](Self::advance)
/// hands out `1, 2, 3, …`.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	current: Arc<AtomicU64>,
}

impl GenerationClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Moves the clock forward and returns the new generation.
	pub fn advance(&self) -> u64 {
		self.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}

	/// Advances the clock and issues a token whose cancellation is tied to
	/// `parent`.
	pub fn issue(&self, parent: &CancellationToken) -> GenerationToken {
		GenerationToken::new(self.advance(), parent.child_token())
	}
}

/// Generation-scoped cancellation token.
#[derive(Debug, Clone)]
pub struct GenerationToken {
	generation: u64,
	cancel: CancellationToken,
}

impl GenerationToken {
	pub fn new(generation: u64, cancel: CancellationToken) -> Self {
		Self { generation, cancel }
	}

	pub const fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Resolves when this generation is cancelled.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Child cancellation token for handing to I/O that should stop with this
	/// generation.
	pub fn child_token(&self) -> CancellationToken {
		self.cancel.child_token()
	}
}
