//! Test fixtures shared by the unit tests.

use crate::model::{Assignment, Model, Move, Neighbour, Solution, SolutionListener};
use crate::search::NeighbourSelection;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Variables `0..n` with domain `0..10`; cost is the squared distance of
/// every assigned value from its target.
#[derive(Debug, Clone)]
pub(crate) struct ToyModel {
    targets: Vec<i32>,
    domain: Vec<i32>,
    conflict_on_equal: bool,
}

impl ToyModel {
    pub(crate) fn new(targets: Vec<i32>) -> Self {
        Self {
            targets,
            domain: (0..10).collect(),
            conflict_on_equal: false,
        }
    }

    /// Two variables holding the same value conflict.
    pub(crate) fn with_conflict_on_equal(mut self) -> Self {
        self.conflict_on_equal = true;
        self
    }

    pub(crate) fn into_solution(self, index: usize) -> Solution<ToyModel> {
        Solution::new(Arc::new(self), index).with_seed(7)
    }

    pub(crate) fn solution(targets: Vec<i32>, index: usize) -> Solution<ToyModel> {
        Self::new(targets).into_solution(index)
    }

    /// Solution with every variable assigned to `value`.
    pub(crate) fn filled(targets: Vec<i32>, value: i32, index: usize) -> Solution<ToyModel> {
        let mut s = Self::solution(targets, index);
        for v in 0..s.model().nr_variables() {
            s.assignment_mut().assign(v, value);
        }
        s
    }
}

impl Model for ToyModel {
    type Value = i32;

    fn nr_variables(&self) -> usize {
        self.targets.len()
    }

    fn values(&self, _variable: usize) -> &[i32] {
        &self.domain
    }

    fn total_value(&self, assignment: &Assignment<i32>) -> f64 {
        assignment
            .assigned()
            .map(|(v, x)| {
                let d = (x - self.targets[v]) as f64;
                d * d
            })
            .sum()
    }

    fn conflicts(&self, assignment: &Assignment<i32>, variable: usize, value: &i32) -> Vec<usize> {
        if !self.conflict_on_equal {
            return Vec::new();
        }
        assignment
            .assigned()
            .filter(|(v, x)| *v != variable && *x == value)
            .map(|(v, _)| v)
            .collect()
    }
}

/// A move that changes nothing.
#[derive(Debug)]
pub(crate) struct NoopMove;

impl Move<ToyModel> for NoopMove {
    fn assign(&self, _model: &ToyModel, _assignment: &mut Assignment<i32>) {}
}

/// Generator replaying scripted costs, then repeating `then` forever.
pub(crate) struct Scripted {
    script: Mutex<VecDeque<f64>>,
    then: f64,
    pub(crate) calls: AtomicUsize,
}

impl Scripted {
    pub(crate) fn new(script: Vec<f64>, then: f64) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            then,
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn constant(cost: f64) -> Arc<Self> {
        Self::new(Vec::new(), cost)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SolutionListener<ToyModel> for Scripted {}

impl NeighbourSelection<ToyModel> for Scripted {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn select_neighbour(&self, _solution: &mut Solution<ToyModel>) -> Option<Neighbour<ToyModel>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let cost = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.then);
        Some(Neighbour::eager(NoopMove, cost))
    }
}

/// Counts `best_restored` events.
#[derive(Default)]
pub(crate) struct RestoreCounter(AtomicUsize);

impl RestoreCounter {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

impl SolutionListener<ToyModel> for RestoreCounter {
    fn best_restored(&self, _solution: &mut Solution<ToyModel>) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}
