//! Cooperative cancellation for long-running migration operations.
//!
//! The engine never interrupts an in-flight SQL call; instead it checks the
//! token between script lines, statements, phases and versions, and reports
//! [Error::Cancelled](crate::Error::Cancelled) at the next checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Error;

/// A cancellation signal shared between the caller and a running migration.
///
/// Cloning is cheap; all clones observe the same signal. A default token is
/// never cancelled, which is what tests and fire-and-forget callers want.
///
/// # Example
/// ```
/// use migradir::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.check().is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [Error::Cancelled] if the signal has been raised.
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
