//! Global admission control.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Caps simultaneous invocations across all threads.
///
/// Admission never waits: past the cap, [`try_admit`](Self::try_admit)
/// returns `None` and the caller rejects the request.
#[derive(Clone, Debug)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
}

impl AdmissionLimiter {
    /// Limiter admitting at most `max` (at least 1) concurrent holders.
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Limiter that never rejects.
    pub fn unbounded() -> Self {
        Self::new(Semaphore::MAX_PERMITS)
    }

    /// Take a slot if one is free.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Some(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }

    /// Slots currently held.
    pub fn active(&self) -> usize {
        self.max - self.semaphore.available_permits()
    }

    /// Configured cap.
    pub fn max(&self) -> usize {
        self.max
    }
}

/// One held admission slot, released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}
