//! Phase sequencing and wrappers around neighbour selections.
//!
//! - [`MetaHeuristicSearch`]: configurable construction → repair →
//!   hill climbing → improvement program with per-thread diversification
//! - [`SimpleSearch`]: fixed construction → hill climbing → great deluge
//!   or simulated annealing program
//! - [`ParallelConstruction`]: lets lagging threads copy values from the
//!   best solution found by another thread
//! - [`MaxIdleSelection`]: stops a selection once the best solution has
//!   not improved for a number of iterations

mod max_idle;
mod meta;
mod parallel;
mod simple;

pub use max_idle::MaxIdleSelection;
pub use meta::MetaHeuristicSearch;
pub use parallel::{ConstructionState, ParallelConstruction};
pub use simple::SimpleSearch;

use crate::model::{ContextKey, Model, Solution};
use std::marker::PhantomData;

/// Position of a thread in a phase program. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Building an initial assignment.
    Construction,
    /// Completing an assignment that still has unassigned variables.
    Incomplete,
    /// Descending to a local optimum.
    HillClimbing,
    /// Escaping local optima.
    Improvement,
}

/// Small copyable per-thread state kept in each solution's context store.
pub(crate) struct Slot<T> {
    key: ContextKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Copy + Send + 'static> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            key: ContextKey::next(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn get<M: Model>(&self, solution: &mut Solution<M>) -> Option<T> {
        solution.context_mut::<T>(self.key).map(|value| *value)
    }

    pub(crate) fn set<M: Model>(&self, solution: &mut Solution<M>, value: T) {
        match solution.context_mut::<T>(self.key) {
            Some(slot) => *slot = value,
            None => solution.put_context(self.key, Box::new(value)),
        }
    }
}
