//! Idle-iteration cut-off around another selection.

use super::Slot;
use crate::model::{Model, Neighbour, Solution, SolutionListener};
use crate::search::{HillClimberSelection, NeighbourSelection};
use std::sync::Arc;

/// Delegates to an inner selection until the thread has gone more than
/// `max_idle` solution iterations without saving a new best solution.
pub struct MaxIdleSelection<M: Model> {
    inner: Arc<dyn NeighbourSelection<M>>,
    max_idle: u64,
    last_best: Slot<u64>,
}

impl<M: Model> MaxIdleSelection<M> {
    pub fn new(inner: Arc<dyn NeighbourSelection<M>>, max_idle: u64) -> Self {
        Self {
            inner,
            max_idle,
            last_best: Slot::new(),
        }
    }

    pub fn max_idle(&self) -> u64 {
        self.max_idle
    }

    pub fn inner(&self) -> &Arc<dyn NeighbourSelection<M>> {
        &self.inner
    }

    /// Solution iteration of the last best saved by this thread.
    pub fn last_best(&self, solution: &mut Solution<M>) -> Option<u64> {
        self.last_best.get(solution)
    }
}

impl<M: Model> SolutionListener<M> for MaxIdleSelection<M> {
    fn solution_updated(&self, solution: &mut Solution<M>) {
        self.inner.solution_updated(solution);
    }

    fn best_saved(&self, solution: &mut Solution<M>) {
        let iteration = solution.iteration();
        self.last_best.set(solution, iteration);
        self.inner.best_saved(solution);
    }

    fn best_cleared(&self, solution: &mut Solution<M>) {
        self.inner.best_cleared(solution);
    }

    fn best_restored(&self, solution: &mut Solution<M>) {
        self.inner.best_restored(solution);
    }
}

impl<M: Model> NeighbourSelection<M> for MaxIdleSelection<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        let iteration = solution.iteration();
        let last = match self.last_best.get(solution) {
            Some(last) => last,
            None => {
                self.last_best.set(solution, iteration);
                iteration
            }
        };
        if iteration.saturating_sub(last) > self.max_idle {
            return None;
        }
        self.inner.select_neighbour(solution)
    }

    fn hill_climber_selection(&self) -> Option<&dyn HillClimberSelection> {
        self.inner.hill_climber_selection()
    }
}
