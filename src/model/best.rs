//! # Shared best solution
//!
//! Process-wide holder of the best assignment found by any search thread.
//! Fast reads of the best value and unassigned count go through atomics;
//! the snapshot itself lives behind a `Mutex`, which is the source of
//! truth when installing.
//!
//! Solutions are compared lexicographically: fewer unassigned variables
//! first, then lower total value.

use super::assignment::Assignment;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A saved best assignment together with its bookkeeping.
#[derive(Debug, Clone)]
pub struct BestSnapshot<T> {
    /// Total value of the saved assignment.
    pub value: f64,
    /// Iteration of the owning thread when it was saved.
    pub iteration: u64,
    /// The saved assignment; its index identifies the thread that found it.
    pub assignment: Assignment<T>,
}

impl<T: Clone> BestSnapshot<T> {
    /// Index of the thread that found this solution.
    pub fn index(&self) -> usize {
        self.assignment.index()
    }

    pub fn nr_assigned(&self) -> usize {
        self.assignment.nr_assigned()
    }

    pub fn nr_unassigned(&self) -> usize {
        self.assignment.nr_unassigned()
    }
}

/// Concurrent holder of the best solution.
///
/// The value is kept as `f64` bits in an `AtomicU64` with `NaN` meaning
/// "nothing saved yet". Atomic reads use `Ordering::Relaxed`; they are a
/// hint used to skip locking for obviously worse candidates.
#[derive(Debug)]
pub struct BestSolution<T> {
    value: AtomicU64,
    unassigned: AtomicUsize,
    snapshot: Mutex<Option<BestSnapshot<T>>>,
}

impl<T: Clone> Default for BestSolution<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// True if a solution with `unassigned`/`value` beats the given best.
pub(crate) fn is_better(unassigned: usize, value: f64, best_unassigned: usize, best_value: f64) -> bool {
    unassigned < best_unassigned || (unassigned == best_unassigned && value < best_value)
}

impl<T: Clone> BestSolution<T> {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(f64::NAN.to_bits()),
            unassigned: AtomicUsize::new(usize::MAX),
            snapshot: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<BestSnapshot<T>>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best value, if a solution was saved.
    pub fn value(&self) -> Option<f64> {
        let v = f64::from_bits(self.value.load(Ordering::Relaxed));
        (!v.is_nan()).then_some(v)
    }

    /// Unassigned variables of the best solution, if one was saved.
    pub fn nr_unassigned(&self) -> Option<usize> {
        match self.unassigned.load(Ordering::Relaxed) {
            usize::MAX => None,
            n => Some(n),
        }
    }

    /// Cheap pre-check whether a candidate would be installed.
    pub fn is_improvement(&self, nr_unassigned: usize, value: f64) -> bool {
        match (self.nr_unassigned(), self.value()) {
            (Some(u), Some(v)) => is_better(nr_unassigned, value, u, v),
            _ => true,
        }
    }

    /// Installs `assignment` if it is strictly better than the current best.
    /// Returns `true` if it was installed.
    pub fn try_install(&self, assignment: &Assignment<T>, value: f64, iteration: u64) -> bool {
        let unassigned = assignment.nr_unassigned();
        if !self.is_improvement(unassigned, value) {
            return false;
        }
        let mut guard = self.lock();
        // Another thread may have installed a better one while we waited.
        if let Some(best) = guard.as_ref() {
            if !is_better(unassigned, value, best.nr_unassigned(), best.value) {
                return false;
            }
        }
        *guard = Some(BestSnapshot {
            value,
            iteration,
            assignment: assignment.clone(),
        });
        self.value.store(value.to_bits(), Ordering::Relaxed);
        self.unassigned.store(unassigned, Ordering::Relaxed);
        true
    }

    /// Forgets the saved solution.
    pub fn clear(&self) {
        let mut guard = self.lock();
        *guard = None;
        self.value.store(f64::NAN.to_bits(), Ordering::Relaxed);
        self.unassigned.store(usize::MAX, Ordering::Relaxed);
    }

    /// Cloned snapshot of the best solution.
    pub fn snapshot(&self) -> Option<BestSnapshot<T>> {
        self.lock().clone()
    }

    /// Runs `f` on the best snapshot without cloning it.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&BestSnapshot<T>) -> R) -> Option<R> {
        self.lock().as_ref().map(f)
    }
}
