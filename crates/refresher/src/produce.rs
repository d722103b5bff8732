use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use loom_worker::GenerationToken;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::TriggerSignal;

/// Returned by [`ProduceContext::checkpoint`] once a newer trigger took over.
///
/// A producer that propagates this error is not reported as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invocation superseded by a newer trigger")]
pub struct Superseded;

/// Per-invocation context handed to the producer.
#[derive(Debug, Clone)]
pub struct ProduceContext {
	signal: TriggerSignal,
	token: GenerationToken,
}

impl ProduceContext {
	pub(crate) fn new(signal: TriggerSignal, token: GenerationToken) -> Self {
		Self { signal, token }
	}

	/// True when the refresh was requested by a user gesture.
	pub fn from_user(&self) -> bool {
		self.signal.is_user_initiated()
	}

	pub fn signal(&self) -> TriggerSignal {
		self.signal
	}

	/// Generation of this invocation. Later invocations have larger values.
	pub fn generation(&self) -> u64 {
		self.token.generation()
	}

	/// True once a newer trigger started another invocation or the refresher
	/// was torn down.
	pub fn is_superseded(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Resolves once this invocation is superseded.
	pub async fn superseded(&self) {
		self.token.cancelled().await;
	}

	/// Cooperative cancellation point.
	///
	/// ```ignore
	/// let page = client.fetch(cursor).await?;
	/// ctx.checkpoint()?;
	/// ```
	pub fn checkpoint(&self) -> Result<(), Superseded> {
		if self.is_superseded() { Err(Superseded) } else { Ok(()) }
	}

	/// Child token for I/O that should stop with this invocation.
	pub fn token(&self) -> CancellationToken {
		self.token.child_token()
	}
}

pub(crate) type ProduceFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// Type-erased producer shared by every pipeline session.
pub(crate) type ProducerFn<T> = Arc<dyn Fn(ProduceContext) -> ProduceFuture<T> + Send + Sync>;

pub(crate) fn boxed<T, F, Fut>(producer: F) -> ProducerFn<T>
where
	F: Fn(ProduceContext) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
	Arc::new(move |ctx| -> ProduceFuture<T> { Box::pin(producer(ctx)) })
}
