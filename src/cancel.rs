//! Cooperative cancellation for long-running inspection phases.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Returned by any phase that observed a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("inspection cancelled")]
pub struct Cancelled;

/// Shared flag checked by discovery, graph building and every analyzer loop.
///
/// Clones share the same flag, so a handle can be given to another thread
/// (or a signal handler) and cancelled from there.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fails with [`Cancelled`] once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_passes_check() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn clones_observe_cancellation() {
        let token = CancelToken::new();
        let handle = token.clone();
        handle.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
    }
}
