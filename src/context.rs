//! Execution context carried through every engine call.
//!
//! A context is a shared cancellation flag plus an optional deadline. Clones
//! share the flag, so cancelling the root context (e.g. from a Ctrl+C
//! handler) is observed by every operation running under it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct ExecContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    /// Budget the deadline was derived from
    timeout: Option<Duration>,
}

impl ExecContext {
    /// A context with no deadline that is never cancelled unless asked to.
    pub fn background() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
            timeout: None,
        }
    }

    /// Derive a context that shares cancellation with `self` and expires
    /// after `timeout`. An earlier deadline on `self` is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let (deadline, timeout) = match self.deadline {
            Some(existing) if existing < candidate => (existing, self.timeout),
            _ => (candidate, Some(timeout)),
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
            timeout,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The timeout that produced the current deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the context is cancelled or past its deadline.
    pub fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Handle for a signal handler to flip the cancellation flag.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::background()
    }
}
