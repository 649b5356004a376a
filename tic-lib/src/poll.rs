//! Cancellation and deadlines for the polling loops.

use crate::error::{Result, TicError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Sleep between two iterations of a polling loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shared flag that asks a running poll to stop.
///
/// Clones observe the same flag, so one clone can be handed to a signal
/// handler while the session polls with another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Stop conditions checked once per polling iteration.
///
/// The default has neither a token nor a deadline and polls until the
/// controller answers the way the loop is waiting for.
#[derive(Debug, Clone, Default)]
pub struct PollOptions {
    pub token: Option<CancelToken>,
    pub deadline: Option<Instant>,
}

impl PollOptions {
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(TicError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(TicError::DeadlineExceeded);
        }
        Ok(())
    }
}
