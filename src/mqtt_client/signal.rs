use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

enum Slot<T> {
    Pending,
    Resolved(T),
    Taken,
}

/// A single-fire slot: many writers, one bounded read.
///
/// The first `resolve` wins. Later calls, including ones made after the
/// value was taken, are no-ops and report `false`.
pub struct Latch<T> {
    slot: Mutex<Slot<T>>,
    resolved: Condvar,
}

impl<T> Latch<T> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(Slot::Pending), resolved: Condvar::new() }
    }

    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Resolved(value);
        self.resolved.notify_all();
        true
    }

    /// Blocks until resolved or `timeout` elapses. Closes the latch either way.
    pub fn wait(&self, timeout: Duration) -> Option<T> {
        let slot = self.lock();
        let (mut slot, _) = self
            .resolved
            .wait_timeout_while(slot, timeout, |slot| matches!(slot, Slot::Pending))
            .unwrap_or_else(PoisonError::into_inner);

        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Resolved(value) => Some(value),
            Slot::Pending | Slot::Taken => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Self::new()
    }
}
