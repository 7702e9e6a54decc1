//! Construction that catches up with the best thread.

use super::Slot;
use crate::model::{Model, Move, Neighbour, SimpleNeighbour, Solution, SolutionListener};
use crate::properties::Properties;
use crate::search::{HillClimberSelection, NeighbourSelection};
use rand::Rng;
use std::sync::Arc;

/// Per-thread bookkeeping of [`ParallelConstruction`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstructionState {
    /// Consecutive checks during which this thread lagged behind.
    pub idle: u64,
    /// Thread that found the best solution, if any.
    pub best_index: Option<usize>,
    /// Assigned variables of the best solution.
    pub best_assigned: usize,
    /// Value of the best solution.
    pub best_value: f64,
}

/// Wraps a construction selection for multi-threaded runs.
///
/// When the best solution comes from another thread and this thread has
/// had fewer assigned variables for `max_idle` consecutive checks, a
/// random unassigned variable is set to its value in the best solution
/// before the inner selection runs. Conflicts created by that value are
/// resolved the usual way (the conflicting variables are unassigned).
/// This is the one selection that changes the assignment while proposing.
pub struct ParallelConstruction<M: Model> {
    inner: Arc<dyn NeighbourSelection<M>>,
    max_idle: u64,
    state: Slot<ConstructionState>,
}

impl<M: Model> ParallelConstruction<M> {
    pub fn new(inner: Arc<dyn NeighbourSelection<M>>, max_idle: u64) -> Self {
        Self {
            inner,
            max_idle: max_idle.max(1),
            state: Slot::new(),
        }
    }

    /// Reads `ParallelConstruction.MaxIdle` (default 100).
    pub fn from_properties(props: &Properties, inner: Arc<dyn NeighbourSelection<M>>) -> Self {
        Self::new(inner, props.get_u64("ParallelConstruction.MaxIdle", 100))
    }

    pub fn max_idle(&self) -> u64 {
        self.max_idle
    }

    pub fn inner(&self) -> &Arc<dyn NeighbourSelection<M>> {
        &self.inner
    }

    /// This thread's bookkeeping, once it has been created.
    pub fn state(&self, solution: &mut Solution<M>) -> Option<ConstructionState> {
        self.state.get(solution)
    }

    /// Picks up a best solution saved by another thread.
    ///
    /// Index, size and value come from one snapshot, so a concurrent save
    /// cannot mix fields of two different best solutions.
    fn refresh(&self, state: &mut ConstructionState, solution: &Solution<M>) {
        let Some((index, assigned, value)) = solution
            .best()
            .with_snapshot(|best| (best.index(), best.nr_assigned(), best.value))
        else {
            return;
        };
        if state.best_index.is_some() && assigned == state.best_assigned {
            return;
        }
        state.best_index = Some(index);
        state.best_assigned = assigned;
        state.best_value = value;
    }

    /// Sets one random unassigned variable to its best-known value.
    fn seed_from_best(&self, solution: &mut Solution<M>) {
        let candidates: Vec<usize> = solution
            .best()
            .with_snapshot(|best| {
                solution
                    .assignment()
                    .unassigned()
                    .filter(|v| best.assignment.value(*v).is_some())
                    .collect()
            })
            .unwrap_or_default();
        if candidates.is_empty() {
            return;
        }
        let variable = candidates[solution.rng().random_range(0..candidates.len())];
        let Some(value) = solution
            .best()
            .with_snapshot(|best| best.assignment.value(variable).cloned())
            .flatten()
        else {
            return;
        };
        tracing::trace!(thread = solution.index(), variable, "copying value from best solution");
        let model = Arc::clone(solution.model());
        let mv = SimpleNeighbour::new(variable, Some(value));
        <SimpleNeighbour<M::Value> as Move<M>>::assign(&mv, &model, solution.assignment_mut());
    }
}

impl<M: Model> SolutionListener<M> for ParallelConstruction<M> {
    fn solution_updated(&self, solution: &mut Solution<M>) {
        self.inner.solution_updated(solution);
    }

    fn best_saved(&self, solution: &mut Solution<M>) {
        let state = ConstructionState {
            idle: 0,
            best_index: Some(solution.index()),
            best_assigned: solution.assignment().nr_assigned(),
            best_value: solution.total_value(),
        };
        self.state.set(solution, state);
        self.inner.best_saved(solution);
    }

    fn best_cleared(&self, solution: &mut Solution<M>) {
        self.inner.best_cleared(solution);
    }

    fn best_restored(&self, solution: &mut Solution<M>) {
        self.inner.best_restored(solution);
    }
}

impl<M: Model> NeighbourSelection<M> for ParallelConstruction<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn select_neighbour(&self, solution: &mut Solution<M>) -> Option<Neighbour<M>> {
        let mut state = self.state.get(solution).unwrap_or_default();
        self.refresh(&mut state, solution);
        let lagging = state.best_index.is_some_and(|owner| owner != solution.index())
            && solution.assignment().nr_assigned() < state.best_assigned;
        if lagging {
            state.idle += 1;
        } else {
            state.idle = 0;
        }
        self.state.set(solution, state);
        if lagging && state.idle >= self.max_idle {
            self.seed_from_best(solution);
        }
        self.inner.select_neighbour(solution)
    }

    fn hill_climber_selection(&self) -> Option<&dyn HillClimberSelection> {
        self.inner.hill_climber_selection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BestSolution;
    use crate::testing::{Scripted, ToyModel};

    /// Thread 2 saves a complete best `[3, 4, 5]`; thread 1 starts empty.
    fn setup() -> (Solution<ToyModel>, Solution<ToyModel>) {
        let model = Arc::new(ToyModel::new(vec![3, 4, 5]));
        let best = Arc::new(BestSolution::new());
        let mut other = Solution::new(Arc::clone(&model), 2).with_best(Arc::clone(&best));
        for (v, x) in [3, 4, 5].into_iter().enumerate() {
            other.assignment_mut().assign(v, x);
        }
        assert!(other.save_best());
        let me = Solution::new(model, 1).with_best(best).with_seed(3);
        (me, other)
    }

    #[test]
    fn test_lagging_thread_copies_best_values() {
        let (mut me, _other) = setup();
        let pc = ParallelConstruction::<ToyModel>::new(Scripted::constant(0.0), 2);
        assert!(pc.select_neighbour(&mut me).is_some());
        assert_eq!(me.assignment().nr_assigned(), 0);
        assert_eq!(pc.state(&mut me).map(|s| s.idle), Some(1));

        assert!(pc.select_neighbour(&mut me).is_some());
        assert_eq!(me.assignment().nr_assigned(), 1);
        assert!(pc.select_neighbour(&mut me).is_some());
        assert_eq!(me.assignment().nr_assigned(), 2);
        for (v, x) in me.assignment().assigned() {
            assert_eq!(*x, [3, 4, 5][v]);
        }
    }

    #[test]
    fn test_parity_resets_idle() {
        let (mut me, _other) = setup();
        let pc = ParallelConstruction::<ToyModel>::new(Scripted::constant(0.0), 100);
        assert!(pc.select_neighbour(&mut me).is_some());
        assert_eq!(pc.state(&mut me).map(|s| s.idle), Some(1));
        for v in 0..3 {
            me.assignment_mut().assign(v, 0);
        }
        assert!(pc.select_neighbour(&mut me).is_some());
        let state = pc.state(&mut me).unwrap();
        assert_eq!(state.idle, 0);
        assert_eq!(state.best_index, Some(2));
        assert_eq!(state.best_assigned, 3);
    }

    #[test]
    fn test_best_saved_resets_idle() {
        let (mut me, _other) = setup();
        let pc = Arc::new(ParallelConstruction::<ToyModel>::new(Scripted::constant(0.0), 100));
        me.add_listener(pc.clone());
        for _ in 0..3 {
            assert!(pc.select_neighbour(&mut me).is_some());
        }
        assert_eq!(pc.state(&mut me).map(|s| s.idle), Some(3));

        // an equal value is never installed; start from an empty best
        me.best().clear();
        for (v, x) in [3, 4, 5].into_iter().enumerate() {
            me.assignment_mut().assign(v, x);
        }
        assert!(me.save_best());
        let state = pc.state(&mut me).unwrap();
        assert_eq!(state.idle, 0);
        assert_eq!(state.best_index, Some(1));
    }

    #[test]
    fn test_refresh_takes_fields_from_current_best() {
        let (me, _other) = setup();
        let pc = ParallelConstruction::<ToyModel>::new(Scripted::constant(0.0), 100);
        let mut state = ConstructionState::default();
        pc.refresh(&mut state, &me);
        assert_eq!(state.best_index, Some(2));
        assert_eq!(state.best_assigned, 3);
        assert_eq!(state.best_value, 0.0);

        // a third thread installs a smaller, worse-valued best
        me.best().clear();
        let mut third = Solution::new(Arc::clone(me.model()), 3).with_best(Arc::clone(me.best()));
        third.assignment_mut().assign(0, 0);
        third.assignment_mut().assign(1, 4);
        assert!(third.save_best());
        pc.refresh(&mut state, &me);
        assert_eq!(state.best_index, Some(3));
        assert_eq!(state.best_assigned, 2);
        assert_eq!(state.best_value, 9.0);
        assert_eq!(state.idle, 0);
    }

    #[test]
    fn test_own_best_never_lags() {
        let model = Arc::new(ToyModel::new(vec![1, 1]));
        let mut me = Solution::new(model, 1);
        me.assignment_mut().assign(0, 1);
        me.assignment_mut().assign(1, 1);
        assert!(me.save_best());
        me.assignment_mut().unassign(0);
        let pc = ParallelConstruction::<ToyModel>::new(Scripted::constant(0.0), 1);
        for _ in 0..3 {
            assert!(pc.select_neighbour(&mut me).is_some());
        }
        assert_eq!(me.assignment().nr_assigned(), 1);
        assert_eq!(pc.state(&mut me).map(|s| s.idle), Some(0));
    }
}
