//! In-flight guard for refresh cycles
//!
//! At most one holder at a time. A scheduler tick uses [`CycleGuard::try_acquire`]
//! and skips when busy; a forced cycle (manual refresh, mode entry) takes the
//! guard over with [`CycleGuard::force_acquire`]. Each holder carries a
//! ticket, so a superseded holder finishing late does not release the guard
//! out from under its successor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const FREE: u64 = 0;

#[derive(Debug, Default)]
struct GuardInner {
    owner: AtomicU64,
    next_ticket: AtomicU64,
}

impl GuardInner {
    fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct CycleGuard {
    inner: Arc<GuardInner>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard if nobody holds it
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        let ticket = self.inner.ticket();
        self.inner
            .owner
            .compare_exchange(FREE, ticket, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                inner: self.inner.clone(),
                ticket,
            })
    }

    /// Take the guard regardless of the current holder
    pub fn force_acquire(&self) -> InFlightGuard {
        let ticket = self.inner.ticket();
        self.inner.owner.store(ticket, Ordering::Release);
        InFlightGuard {
            inner: self.inner.clone(),
            ticket,
        }
    }

    pub fn is_held(&self) -> bool {
        self.inner.owner.load(Ordering::Acquire) != FREE
    }
}

/// Releases the guard on drop, if still the owner
#[derive(Debug)]
pub struct InFlightGuard {
    inner: Arc<GuardInner>,
    ticket: u64,
}

impl InFlightGuard {
    /// False once a forced cycle has taken the guard over
    pub fn is_owner(&self) -> bool {
        self.inner.owner.load(Ordering::Acquire) == self.ticket
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let _ = self.inner.owner.compare_exchange(
            self.ticket,
            FREE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let guard = CycleGuard::new();

        let held = guard.try_acquire().unwrap();
        assert!(guard.is_held());
        assert!(guard.try_acquire().is_none());

        drop(held);
        assert!(!guard.is_held());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_superseded_holder_does_not_release() {
        let guard = CycleGuard::new();

        let stale = guard.try_acquire().unwrap();
        let forced = guard.force_acquire();

        assert!(!stale.is_owner());
        assert!(forced.is_owner());

        drop(stale);
        assert!(guard.is_held());
        assert!(guard.try_acquire().is_none());

        drop(forced);
        assert!(!guard.is_held());
    }
}
