//! Cooperative cancellation for long-running solves.
//!
//! The solver is single-threaded, but every source-bridge call it makes may
//! block on the network. A [`CancelToken`] is checked between outer-loop
//! iterations and immediately after each bridge or analyzer call, so an
//! external timeout can abort a solve cleanly. In-flight bridge calls are
//! surrendered to their own cancellation contract; partial work is discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Raised when a solve is aborted from the outside. Distinct from every
/// solve failure: it never drives backtracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("solve cancelled")]
pub struct Cancelled;

/// A cheaply clonable cancellation flag shared between a solve and its
/// caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Requests cancellation. Idempotent; safe from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once [`CancelToken::cancel`] has been called.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
