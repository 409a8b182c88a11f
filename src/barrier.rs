//! Completion tracking for background operations.
//!
//! Every streaming operation takes an [`OpTicket`] from the engine's
//! [`OpBarrier`] before its background unit starts. Dropping the ticket ends
//! the operation, so the count is decremented on every exit path, panics
//! included. [`OpBarrier::wait_all`] blocks until the count reaches zero.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Default)]
struct Inner {
    outstanding: Mutex<usize>,
    drained: Condvar,
}

/// Counter of in-flight background operations.
///
/// Cloning yields another handle to the same counter.
#[derive(Debug, Clone, Default)]
pub struct OpBarrier {
    inner: Arc<Inner>,
}

impl OpBarrier {
    /// Create a barrier with nothing outstanding.
    pub fn new() -> Self {
        Self::default()
    }

    fn count(&self) -> MutexGuard<'_, usize> {
        self.inner
            .outstanding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register one operation. The returned ticket ends it when dropped.
    pub fn begin(&self) -> OpTicket {
        *self.count() += 1;
        OpTicket {
            barrier: self.clone(),
            ended: false,
        }
    }

    /// Deregister one operation.
    ///
    /// Prefer dropping the [`OpTicket`]; calling this with nothing
    /// outstanding is ignored.
    pub fn end(&self) {
        let mut count = self.count();
        if *count == 0 {
            warn!("barrier end() without a matching begin()");
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.inner.drained.notify_all();
        }
    }

    /// Number of operations still running.
    pub fn outstanding(&self) -> usize {
        *self.count()
    }

    /// Block until every begun operation has ended.
    ///
    /// Returns immediately when nothing is outstanding.
    pub fn wait_all(&self) {
        let count = self.count();
        let _drained = self
            .inner
            .drained
            .wait_while(count, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`wait_all`](Self::wait_all) with an upper bound.
    ///
    /// Returns `true` if the count reached zero within `timeout`.
    pub fn wait_all_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count();
        while *count > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            count = self
                .inner
                .drained
                .wait_timeout(count, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Proof that an operation is registered with an [`OpBarrier`].
#[derive(Debug)]
#[must_use = "the operation ends as soon as the ticket is dropped"]
pub struct OpTicket {
    barrier: OpBarrier,
    ended: bool,
}

impl OpTicket {
    /// End the operation now instead of at drop.
    pub fn finish(mut self) {
        self.end_once();
    }

    fn end_once(&mut self) {
        if !self.ended {
            self.ended = true;
            self.barrier.end();
        }
    }
}

impl Drop for OpTicket {
    fn drop(&mut self) {
        self.end_once();
    }
}
