//! In-memory stand-ins for the chain node, the clock and the store.
//!
//! Each one implements the same trait as its production counterpart and
//! exposes knobs for the failure modes a cycle has to survive: unreachable
//! endpoints, per-id timeouts, dropped connections, rejected writes.

pub mod chain;
pub mod clock;
pub mod store;

pub use chain::{NullChain, NullChainReader};
pub use clock::NullClock;
pub use store::NullReferendumStore;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
