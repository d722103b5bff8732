//! Shared async runtime primitives for refresher-style state holders.
//!
//! * [`WorkerScope`]: a runtime handle paired with a cancellation token; every
//!   task spawned through it stops when the scope is torn down.
//! * [`GenerationClock`] / [`GenerationToken`]: monotonic generations with a
//!   per-generation cancellation token.
//! * [`LatestSlot`]: single-value mailbox where a newer value overwrites an
//!   unconsumed older one.
//! * [`TaskJoin`]: multi-caller join coordination for one spawned task.
//! * [`LazyCell`] / [`LazyTask`]: lazily-initialized async values.

mod error;
mod join;
pub mod lazy;
mod panic;
mod scope;
mod slot;
mod token;

pub use error::SharedError;
pub use join::TaskJoin;
pub use lazy::{Deferred, LazyCell, LazyState, LazyTask};
pub use panic::{join_error_panic_message, panic_payload_message};
pub use scope::WorkerScope;
pub use slot::{LatestSlot, SlotPush, SlotReceiver, SlotSender};
pub use token::{GenerationClock, GenerationToken};
