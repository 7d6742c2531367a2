//! Deduplicated, bounded, cancellable background fetching.
//!
//! [`FetchCoordinator`] guarantees at most one in-flight task per key, runs
//! tasks on a fixed-size worker pool in FIFO order, and routes each outcome
//! to every attached listener through a [`CallbackExecutor`].

mod coordinator;
pub mod executor;
mod limiter;
mod subscription;

pub use coordinator::{
    FetchConfig, FetchCoordinator, FetchFuture, FetchOutcome, FetchStats, Listener,
};
pub use executor::{CallbackExecutor, CallbackQueue, ChannelExecutor, InlineExecutor};
pub use limiter::{WorkerLimiter, WorkerPermit};
pub use subscription::Subscription;
