//! Moves and their uniform `Neighbour` wrapper.
//!
//! A neighbour is either *eager* (its marginal cost is known up front and
//! nothing has been applied yet) or *lazy* (the cost is only known after
//! the move is applied, so acceptance is decided by a callback after the
//! fact and the move is undone when rejected).

use super::assignment::Assignment;
use super::solution::Solution;
use super::types::Model;
use std::fmt;
use std::sync::Arc;

/// A change whose cost is known before it is applied.
pub trait Move<M: Model>: Send + fmt::Debug {
    /// Applies the change to the assignment.
    fn assign(&self, model: &M, assignment: &mut Assignment<M::Value>);
}

/// A change whose cost is only known once it has been applied.
pub trait LazyMove<M: Model>: Send + fmt::Debug {
    /// Applies the change, remembering whatever `undo` needs.
    fn assign(&mut self, model: &M, assignment: &mut Assignment<M::Value>);

    /// Reverts the last `assign`.
    fn undo(&mut self, model: &M, assignment: &mut Assignment<M::Value>);
}

/// Late acceptance decision for lazy moves.
///
/// Called with the lazy move already applied to the solution's assignment;
/// `value` is the resulting change of the total value.
pub trait LazyAcceptance<M: Model>: Send + Sync {
    fn accept(&self, solution: &mut Solution<M>, value: f64) -> bool;
}

/// A proposed change, eager or lazy.
pub enum Neighbour<M: Model> {
    /// Not yet applied; `value` is its marginal cost.
    Eager { mv: Box<dyn Move<M>>, value: f64 },
    /// Applied by [`Neighbour::assign`], then confirmed by `criterion`.
    Lazy {
        mv: Box<dyn LazyMove<M>>,
        criterion: Option<Arc<dyn LazyAcceptance<M>>>,
    },
}

impl<M: Model> fmt::Debug for Neighbour<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Neighbour::Eager { mv, value } => write!(f, "Eager({mv:?}, value={value})"),
            Neighbour::Lazy { mv, criterion } => {
                write!(f, "Lazy({mv:?}, criterion={})", criterion.is_some())
            }
        }
    }
}

impl<M: Model> Neighbour<M> {
    pub fn eager(mv: impl Move<M> + 'static, value: f64) -> Self {
        Neighbour::Eager {
            mv: Box::new(mv),
            value,
        }
    }

    pub fn lazy(mv: impl LazyMove<M> + 'static) -> Self {
        Neighbour::Lazy {
            mv: Box::new(mv),
            criterion: None,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Neighbour::Lazy { .. })
    }

    /// Marginal cost of an eager neighbour; `None` for lazy ones.
    pub fn value(&self) -> Option<f64> {
        match self {
            Neighbour::Eager { value, .. } => Some(*value),
            Neighbour::Lazy { .. } => None,
        }
    }

    /// Registers the late acceptance criterion of a lazy neighbour.
    pub fn set_acceptance(&mut self, acceptance: Arc<dyn LazyAcceptance<M>>) {
        if let Neighbour::Lazy { criterion, .. } = self {
            *criterion = Some(acceptance);
        }
    }

    /// Applies the neighbour to the solution's assignment.
    ///
    /// Returns `false` only for lazy neighbours rejected by their criterion
    /// (which are undone before returning). Lazy neighbours without a
    /// criterion are kept only when they do not worsen the solution.
    pub fn assign(self, solution: &mut Solution<M>) -> bool {
        let model = Arc::clone(solution.model());
        match self {
            Neighbour::Eager { mv, .. } => {
                mv.assign(&model, solution.assignment_mut());
                true
            }
            Neighbour::Lazy { mut mv, criterion } => {
                let before = model.total_value(solution.assignment());
                mv.assign(&model, solution.assignment_mut());
                let value = model.total_value(solution.assignment()) - before;
                let accepted = match criterion {
                    Some(c) => c.accept(solution, value),
                    None => value <= 0.0,
                };
                if !accepted {
                    mv.undo(&model, solution.assignment_mut());
                }
                accepted
            }
        }
    }
}

/// Assigns one variable (or unassigns it when `value` is `None`),
/// unassigning whatever conflicts with the new value.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleNeighbour<T> {
    pub variable: usize,
    pub value: Option<T>,
}

impl<T> SimpleNeighbour<T> {
    pub fn new(variable: usize, value: Option<T>) -> Self {
        Self { variable, value }
    }
}

fn assign_with_conflicts<M: Model>(
    model: &M,
    assignment: &mut Assignment<M::Value>,
    variable: usize,
    value: Option<&M::Value>,
    mut undo: Option<&mut Vec<(usize, Option<M::Value>)>>,
) {
    if let Some(value) = value {
        for conflict in model.conflicts(assignment, variable, value) {
            let old = assignment.unassign(conflict);
            if let Some(log) = undo.as_deref_mut() {
                log.push((conflict, old));
            }
        }
    }
    let old = assignment.set(variable, value.cloned());
    if let Some(log) = undo {
        log.push((variable, old));
    }
}

impl<M: Model> Move<M> for SimpleNeighbour<M::Value> {
    fn assign(&self, model: &M, assignment: &mut Assignment<M::Value>) {
        assign_with_conflicts(model, assignment, self.variable, self.value.as_ref(), None);
    }
}

/// Lazy counterpart of [`SimpleNeighbour`].
#[derive(Debug, Clone)]
pub struct LazySimpleNeighbour<T> {
    pub variable: usize,
    pub value: Option<T>,
    undo: Vec<(usize, Option<T>)>,
}

impl<T> LazySimpleNeighbour<T> {
    pub fn new(variable: usize, value: Option<T>) -> Self {
        Self {
            variable,
            value,
            undo: Vec::new(),
        }
    }
}

impl<M: Model> LazyMove<M> for LazySimpleNeighbour<M::Value> {
    fn assign(&mut self, model: &M, assignment: &mut Assignment<M::Value>) {
        self.undo.clear();
        assign_with_conflicts(
            model,
            assignment,
            self.variable,
            self.value.as_ref(),
            Some(&mut self.undo),
        );
    }

    fn undo(&mut self, _model: &M, assignment: &mut Assignment<M::Value>) {
        for (variable, old) in self.undo.drain(..).rev() {
            assignment.set(variable, old);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToyModel;

    #[test]
    fn test_eager_assign() {
        let mut solution = ToyModel::solution(vec![1, 2, 3], 1);
        let n = Neighbour::eager(SimpleNeighbour::new(0, Some(1)), -1.0);
        assert_eq!(n.value(), Some(-1.0));
        assert!(n.assign(&mut solution));
        assert_eq!(solution.assignment().value(0), Some(&1));
    }

    #[test]
    fn test_lazy_without_criterion_rejects_worsening() {
        let mut solution = ToyModel::solution(vec![0, 0], 1);
        solution.assignment_mut().assign(0, 0);
        let n = Neighbour::lazy(LazySimpleNeighbour::new(0, Some(3)));
        assert!(n.is_lazy());
        assert!(!n.assign(&mut solution));
        assert_eq!(solution.assignment().value(0), Some(&0));
    }

    #[test]
    fn test_lazy_undo_restores_conflicts() {
        let mut solution = ToyModel::new(vec![0, 0, 0])
            .with_conflict_on_equal()
            .into_solution(1);
        solution.assignment_mut().assign(0, 1);
        solution.assignment_mut().assign(1, 2);
        // Assigning 2 to variable 0 conflicts with variable 1 (same value).
        let mut mv = LazySimpleNeighbour::new(0, Some(2));
        let model = Arc::clone(solution.model());
        LazyMove::assign(&mut mv, &*model, solution.assignment_mut());
        assert_eq!(solution.assignment().value(1), None);
        LazyMove::undo(&mut mv, &*model, solution.assignment_mut());
        assert_eq!(solution.assignment().value(0), Some(&1));
        assert_eq!(solution.assignment().value(1), Some(&2));
    }
}
