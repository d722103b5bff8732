//! Latest-wins async state refresher.
//!
//! # Purpose
//!
//! - Wrap a caller-supplied async producer and publish its result as an observable [`LifecycleState`].
//! - Re-run the producer on demand, coalescing trigger bursts through a debounce stage and a periodic sampling stage.
//! - Let callers edit the loaded value locally through mutators without re-running the producer.
//! - Exclude retry/backoff, persistence and transport concerns; those belong to the producer.
//!
//! # Mental model
//!
//! - [`Refresher::refresh`] pushes a [`TriggerSignal`] into a single-slot latest-wins mailbox.
//! - The [`Coalescer`] debounces, then samples on a fixed grid, and forwards surviving signals to the executor.
//! - The executor is one task per pipeline session. Each signal supersedes the in-flight invocation (its generation token is cancelled and its task aborted), publishes `Loading`, and starts a fresh invocation tagged with a new generation.
//! - A superseded invocation is aborted before its successor is spawned, so an older invocation can never overwrite a newer one.
//! - [`Refresher::update`] pushes a [`Mutator`] into a second single-slot mailbox; the executor merges it against the published state under the holder's write lock.
//! - A [`SharingPolicy`] gate decides when the pipeline runs: always ([`SharingPolicy::Eager`]) or only while [`StateObserver`]s exist, with a grace period.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`Refresher`] | Cloneable handle to one pipeline | MUST tear the pipeline down when the last handle drops | `Refresher::new` |
//! | [`LifecycleState`] | Published state | MUST only transition `Loading -> Loaded/Failed` per accepted signal | `Executor::start`, `Executor::settle`, `merge` |
//! | [`StateObserver`] | Replay-latest subscription | MUST hold an observer lease for its lifetime | `Refresher::observe` |
//! | [`ProduceContext`] | Per-invocation context | MUST report superseded once a newer invocation starts | `Executor::start` |
//! | [`RefresherConfig`] | Construction-time settings | Durations are fixed for the refresher's lifetime | `RefresherConfig::*` |
//! | [`Coalescer`] | Debounce + sampling stage | MUST hold at most one pending signal | `Coalescer::run` |
//!
//! # Invariants
//!
//! 1. At most one invocation result is ever published per generation, and never one from a superseded generation.
//!    - Enforced in: `Executor::start`, `Invocation::drop`
//!    - Tested by: `executor::tests::newer_signal_supersedes_inflight`, `latest_trigger_wins`
//!    - Failure symptom: a slow stale fetch overwrites fresh data.
//!
//! 2. A mutator only transforms `Loaded` values and publishes only when the value changes.
//!    - Enforced in: `merge`
//!    - Tested by: `merge::tests::*`, `update_applies_to_loaded_value`, `update_while_loading_is_dropped`
//!    - Failure symptom: edits resurrect a failed state or spam observers with identical values.
//!
//! 3. Producer errors and panics are published as `Failed` and never escape to the caller or stop the pipeline.
//!    - Enforced in: `Executor::settle`
//!    - Tested by: `producer_error_is_published_and_recoverable`, `failed_user_refresh_is_followed_by_a_clean_reload`, `producer_panic_becomes_failure`
//!    - Failure symptom: one failing refresh leaves the refresher permanently dead.
//!
//! 4. Superseded invocations are not reported as failures.
//!    - Enforced in: `Invocation::drop`
//!    - Tested by: `cooperative_cancellation_is_not_a_failure`
//!    - Failure symptom: rapid refreshes flash an error state.
//!
//! 5. A `WhileObserved` pipeline keeps running through its grace period and restarts with a fresh invocation afterwards.
//!    - Enforced in: `run_gate`
//!    - Tested by: `sharing::tests::grace_period_keeps_session_alive`, `pipeline_restarts_after_grace_period`
//!    - Failure symptom: screen rotations re-fetch, or unobserved refreshers poll forever.

// Dev-dependencies only some test builds reach.
#[cfg(test)]
use {serde_json as _, tracing_subscriber as _};

mod coalesce;
mod config;
mod error;
mod executor;
mod merge;
mod observer;
mod produce;
mod refresher;
mod sharing;
mod signal;
mod state;

pub use coalesce::{Coalescer, Debounce, Sample};
pub use config::{DEFAULT_DEBOUNCE, DEFAULT_STOP_TIMEOUT, DEFAULT_THROTTLE, RefresherConfig};
pub use error::{RefresherError, Result};
pub use merge::Mutator;
pub use observer::StateObserver;
pub use produce::{ProduceContext, Superseded};
pub use refresher::Refresher;
pub use sharing::SharingPolicy;
pub use signal::TriggerSignal;
pub use state::{LifecycleState, RefreshFailure};
